use anyhow::{Context, Result};
use clap::Args;
use flate2::read::GzDecoder;
use glob::glob;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{DonorView, NormalizedSnapshot, RecipientFlow, Snapshot, DONOR_ORDER, TOP_N};

mod fields;
pub use fields::{
    normalize_item, resolve, resolve_amount, resolve_iso3, resolve_position, resolve_text,
    ItemFields, AMOUNT_KEYS, ISO3_KEYS, LAT_KEYS, LON_KEYS, RECIPIENT_KEYS, UNKNOWN_RECIPIENT,
};

#[derive(Args)]
pub struct NormalizeArgs {
    /// Snapshot file, or directory containing top10*.json[.gz] files
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output directory for normalized artifacts
    #[arg(short, long)]
    pub output: PathBuf,
}

/// A donor node classified once at ingestion; downstream code never branches
/// on the raw shape again.
#[derive(Debug, Clone, PartialEq)]
pub enum DonorNode<'a> {
    /// Pre-split schema: a bare sequence of amount-bearing items.
    Legacy(&'a [Value]),
    /// Split schema: named commitments/disbursements sequences, either of
    /// which may be missing or malformed (degrades to empty).
    Current {
        commitments: &'a [Value],
        disbursements: &'a [Value],
    },
    /// Neither array nor object. Yields an empty view, never an error.
    Unusable,
}

impl<'a> DonorNode<'a> {
    pub fn classify(raw: &'a Value) -> DonorNode<'a> {
        match raw {
            Value::Array(items) => DonorNode::Legacy(items.as_slice()),
            Value::Object(map) => DonorNode::Current {
                commitments: sequence(map.get("commitments")),
                disbursements: sequence(map.get("disbursements")),
            },
            _ => DonorNode::Unusable,
        }
    }
}

fn sequence(field: Option<&Value>) -> &[Value] {
    match field {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[],
    }
}

enum FlowKind {
    Commitment,
    Disbursement,
}

/// Running per-donor accumulation keyed by recipient name. The vec preserves
/// first-sight order so ranking ties break deterministically.
#[derive(Default)]
struct FlowTable {
    order: Vec<RecipientFlow>,
    index: HashMap<String, usize>,
}

impl FlowTable {
    fn slot(&mut self, recipient: String) -> &mut RecipientFlow {
        if let Some(&i) = self.index.get(&recipient) {
            return &mut self.order[i];
        }
        let i = self.order.len();
        self.index.insert(recipient.clone(), i);
        self.order.push(RecipientFlow {
            recipient,
            commitments: 0.0,
            disbursements: 0.0,
            position: None,
            iso3: None,
        });
        &mut self.order[i]
    }

    fn add(&mut self, fields: ItemFields, kind: FlowKind) {
        let ItemFields {
            recipient,
            amount,
            position,
            iso3,
        } = fields;
        let flow = self.slot(recipient);
        match kind {
            FlowKind::Commitment => flow.commitments += amount,
            FlowKind::Disbursement => flow.disbursements += amount,
        }
        // First valid position wins; later conflicting positions are ignored.
        if flow.position.is_none() {
            flow.position = position;
        }
        if flow.iso3.is_none() {
            flow.iso3 = iso3;
        }
    }

    fn into_view(self, donor_key: &str) -> DonorView {
        let mut items = self.order;
        // Vec::sort_by is stable: equal totals keep first-sight order.
        items.sort_by(|a, b| b.total().total_cmp(&a.total()));
        items.truncate(TOP_N);
        DonorView {
            donor_key: donor_key.to_string(),
            has_data: !items.is_empty(),
            items,
        }
    }
}

/// Merge one donor's raw node, whatever its shape, into a ranked view of at
/// most `TOP_N` recipients. Malformed nodes degrade to an empty view; they
/// never fail the snapshot.
pub fn reconcile_donor(donor_key: &str, raw: &Value) -> DonorView {
    let mut table = FlowTable::default();

    match DonorNode::classify(raw) {
        // Legacy feeds predate the commitments/disbursements split and report
        // realized funding, so their amounts land under disbursements.
        DonorNode::Legacy(items) => {
            for item in items {
                table.add(normalize_item(item), FlowKind::Disbursement);
            }
        }
        DonorNode::Current {
            commitments,
            disbursements,
        } => {
            for item in commitments {
                table.add(normalize_item(item), FlowKind::Commitment);
            }
            for item in disbursements {
                table.add(normalize_item(item), FlowKind::Disbursement);
            }
        }
        DonorNode::Unusable => {
            warn!("Donor {} has an unusable node shape, emitting empty view", donor_key);
        }
    }

    table.into_view(donor_key)
}

/// Preferred donors first (those actually present), then every remaining key
/// in document order. Deterministic for a given document.
pub fn donor_display_order(donors: &Map<String, Value>, preferred: &[&str]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut order = Vec::with_capacity(donors.len());

    for key in preferred {
        if donors.contains_key(*key) && seen.insert(key) {
            order.push((*key).to_string());
        }
    }
    for key in donors.keys() {
        if seen.insert(key.as_str()) {
            order.push(key.clone());
        }
    }

    order
}

/// Every donor present in the document, reconciled independently, in display
/// order.
pub fn reconcile_snapshot(snapshot: &Snapshot) -> Vec<DonorView> {
    let mut views = Vec::with_capacity(snapshot.donors.len());
    for key in donor_display_order(&snapshot.donors, DONOR_ORDER) {
        if let Some(raw) = snapshot.donors.get(&key) {
            views.push(reconcile_donor(&key, raw));
        }
    }
    views
}

/// Snapshot files under a directory, any exporter generation, compressed or
/// not. Normalized artifacts living next to their inputs are skipped.
pub fn find_snapshot_files<P: AsRef<Path>>(directory: P) -> Result<Vec<PathBuf>> {
    let pattern = directory.as_ref().join("**/top10*.json*");
    let pattern_str = pattern.to_string_lossy();
    let mut files: Vec<PathBuf> = glob(&pattern_str)?
        .filter_map(Result::ok)
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| !name.contains(".normalized."))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Inputs for a stage: the file itself, or every snapshot under a directory.
pub fn snapshot_inputs(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_dir() {
        find_snapshot_files(input)
    } else {
        Ok(vec![input.to_path_buf()])
    }
}

/// Read one snapshot document, transparently decompressing `.gz` files.
/// Unparseable JSON is the single hard load failure for a document.
pub fn read_snapshot<P: AsRef<Path>>(path: P) -> Result<Value> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

    let doc = if path.extension().map(|ext| ext == "gz").unwrap_or(false) {
        serde_json::from_reader(BufReader::new(GzDecoder::new(file)))
    } else {
        serde_json::from_reader(BufReader::new(file))
    };

    doc.with_context(|| format!("Failed to parse {} as JSON", path.display()))
}

/// File stem with `.json`/`.json.gz` stripped, used to name derived outputs.
pub fn snapshot_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("snapshot"));
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    let name = name.strip_suffix(".json").unwrap_or(name);
    name.to_string()
}

pub fn run(args: NormalizeArgs) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fts_top10=info".parse().unwrap()),
        )
        .try_init()
        .ok();

    fs::create_dir_all(&args.output)?;

    let files = snapshot_inputs(&args.input)?;
    if files.is_empty() {
        info!("No snapshot files found under {}", args.input.display());
        return Ok(());
    }
    info!("Normalizing {} snapshot files", files.len());

    for path in &files {
        let doc = read_snapshot(path)?;
        let snapshot = Snapshot::from_value(&doc);
        let artifact = NormalizedSnapshot {
            year: snapshot.year,
            updated: snapshot.updated.clone(),
            donors: reconcile_snapshot(&snapshot),
        };

        let out_path = args
            .output
            .join(format!("{}.normalized.json", snapshot_stem(path)));
        let file = File::create(&out_path)
            .with_context(|| format!("Failed to create {}", out_path.display()))?;
        serde_json::to_writer_pretty(file, &artifact)?;

        let reported = artifact.donors.iter().filter(|view| view.has_data).count();
        info!(
            "Wrote {} ({} of {} donors reported data)",
            out_path.display(),
            reported,
            artifact.donors.len()
        );
    }

    Ok(())
}
