use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use xxhash_rust::xxh3::xxh3_64;

pub mod fetch;
pub mod normalize;
pub mod render;

/// Donor keys in preferred display order; keys present in a snapshot but not
/// listed here render after these, in document order.
pub const DONOR_ORDER: &[&str] = &[
    "EU", "USA", "China", "Russia", "Germany", "UK", "Japan", "France", "Canada", "Sweden",
    "Norway", "Netherlands",
];

/// Recipients kept per donor after ranking.
pub const TOP_N: usize = 10;

/// Stable page/DOM identity for one donor. The sanitized slug keeps ids
/// readable; the hash suffix keeps them distinct when different keys sanitize
/// to the same slug ("EU 1" vs "EU/1").
pub fn page_id(donor_key: &str) -> String {
    let mut slug = String::with_capacity(donor_key.len());
    for c in donor_key.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    let hash = xxh3_64(donor_key.as_bytes()) as u32;
    if slug.is_empty() {
        format!("map-{:08x}", hash)
    } else {
        format!("map-{}-{:08x}", slug, hash)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

/// Canonical per-recipient aggregate for one donor. Identity is the recipient
/// name, case-sensitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientFlow {
    pub recipient: String,
    pub commitments: f64,
    pub disbursements: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso3: Option<String>,
}

impl RecipientFlow {
    /// Combined funding, the ranking key.
    pub fn total(&self) -> f64 {
        self.commitments + self.disbursements
    }
}

/// Ranked view of one donor: at most `TOP_N` recipients, descending by
/// combined funding, ties in first-sight order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonorView {
    pub donor_key: String,
    pub items: Vec<RecipientFlow>,
    pub has_data: bool,
}

/// Snapshot document as fetched. Read leniently: `donors` missing or not an
/// object becomes an empty map, unknown top-level fields are ignored, and a
/// non-object document yields all defaults. Only unparseable JSON is a load
/// failure, and that is raised earlier, at read time.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub year: Option<i64>,
    pub updated: Option<String>,
    pub donors: Map<String, Value>,
}

impl Snapshot {
    pub fn from_value(doc: &Value) -> Snapshot {
        Snapshot {
            year: doc.get("year").and_then(Value::as_i64),
            updated: doc.get("updated").and_then(Value::as_str).map(String::from),
            donors: doc
                .get("donors")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

/// Artifact written by the normalize stage: every donor view in display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    pub donors: Vec<DonorView>,
}
