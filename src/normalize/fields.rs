use serde_json::Value;

use crate::Position;

/// Candidate keys per logical field, in priority order. Each generation of
/// the upstream exporter named these differently; the first present, non-null
/// candidate wins.
pub const RECIPIENT_KEYS: &[&str] = &[
    "recipient",
    "destination",
    "location",
    "country",
    "name",
    "recipient_name",
    "to",
];
pub const AMOUNT_KEYS: &[&str] = &[
    "amount_usd",
    "amountUSD",
    "amount",
    "value",
    "total_usd",
    "total",
    "usd",
    "funding",
];
pub const LAT_KEYS: &[&str] = &["lat", "latitude", "y"];
pub const LON_KEYS: &[&str] = &["lon", "lng", "longitude", "x"];
pub const ISO3_KEYS: &[&str] = &["iso3", "country_iso3"];

pub const UNKNOWN_RECIPIENT: &str = "Unknown";

/// One raw item reduced to its logical fields. Pure: the same item always
/// yields the same fields, so tests can be table-driven.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFields {
    pub recipient: String,
    pub amount: f64,
    pub position: Option<Position>,
    pub iso3: Option<String>,
}

pub fn normalize_item(item: &Value) -> ItemFields {
    ItemFields {
        recipient: resolve_text(item, RECIPIENT_KEYS, UNKNOWN_RECIPIENT),
        amount: resolve_amount(item, AMOUNT_KEYS),
        position: resolve_position(item),
        iso3: resolve_iso3(item),
    }
}

/// The value of the first candidate key that is present and non-null.
/// Non-object records are treated as empty.
pub fn resolve<'v>(record: &'v Value, keys: &[&str]) -> Option<&'v Value> {
    let map = record.as_object()?;
    keys.iter().find_map(|key| map.get(*key).filter(|v| !v.is_null()))
}

/// Text for the first present candidate: strings pass through verbatim,
/// numbers and booleans render as their JSON text, structured values are
/// unusable as names and fall back.
pub fn resolve_text(record: &Value, keys: &[&str], fallback: &str) -> String {
    match resolve(record, keys) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => fallback.to_string(),
    }
}

/// Amount for the first present candidate, coerced finite-or-zero. The
/// winning candidate is picked before coercion, so an unusable value in a
/// higher-priority key shadows a usable one further down, matching the
/// original feed consumers. Negative amounts clamp to zero so per-recipient
/// sums stay non-negative.
pub fn resolve_amount(record: &Value, keys: &[&str]) -> f64 {
    resolve(record, keys)
        .and_then(as_finite_f64)
        .unwrap_or(0.0)
        .max(0.0)
}

/// A renderable position exists only when both coordinates resolve to finite
/// numbers; otherwise the item still counts toward aggregates, it just never
/// reaches marker placement.
pub fn resolve_position(record: &Value) -> Option<Position> {
    let lat = resolve(record, LAT_KEYS).and_then(as_finite_f64)?;
    let lon = resolve(record, LON_KEYS).and_then(as_finite_f64)?;
    Some(Position { lat, lon })
}

pub fn resolve_iso3(record: &Value) -> Option<String> {
    match resolve(record, ISO3_KEYS) {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

/// Finite-number-or-nothing coercion shared by amounts and coordinates. JSON
/// numbers pass through when finite; strings count when their trimmed text
/// parses as a finite float; everything else is unusable.
fn as_finite_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}
