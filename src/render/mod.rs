use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::normalize::{read_snapshot, reconcile_snapshot, snapshot_inputs, snapshot_stem};
use crate::Snapshot;

mod html;
mod present;
pub use html::{escape_html, render_document};
pub use present::{
    fmt_usd, marker_radius, DonorPage, PageItem, PageMeta, MAX_RADIUS, MIN_RADIUS,
    NO_DATA_MESSAGE,
};

#[derive(Args)]
pub struct RenderArgs {
    /// Snapshot file, or directory containing top10*.json[.gz] files
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output directory for rendered pages
    #[arg(short, long)]
    pub output: PathBuf,

    /// Number of threads (0 = auto)
    #[arg(short, long, default_value = "0")]
    pub threads: usize,
}

/// Render one snapshot document to a self-contained HTML page next to its
/// siblings in the output directory.
pub fn render_snapshot_file(path: &Path, output_dir: &Path) -> Result<PathBuf> {
    let doc = read_snapshot(path)?;
    let snapshot = Snapshot::from_value(&doc);

    let views = reconcile_snapshot(&snapshot);
    let pages: Vec<DonorPage> = views.iter().map(DonorPage::build).collect();
    let meta = PageMeta {
        year: snapshot.year,
        updated: snapshot.updated.clone(),
    };

    let html = render_document(&meta, &pages);
    let out_path = output_dir.join(format!("{}.html", snapshot_stem(path)));
    let file = File::create(&out_path)
        .with_context(|| format!("Failed to create {}", out_path.display()))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(html.as_bytes())?;
    writer.flush()?;

    Ok(out_path)
}

pub fn run(args: RenderArgs) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fts_top10=info".parse().unwrap()),
        )
        .try_init()
        .ok();

    fs::create_dir_all(&args.output)?;

    let num_threads = if args.threads > 0 {
        args.threads
    } else {
        num_cpus::get()
    };
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
        .ok();
    info!("Using {} threads", num_threads);

    let files = snapshot_inputs(&args.input)?;
    if files.is_empty() {
        info!("No snapshot files found under {}", args.input.display());
        return Ok(());
    }
    info!("Rendering {} snapshot files", files.len());

    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    // An unreadable snapshot is a hard load failure: the stage stops with one
    // message. Per-donor degradation already happened inside reconciliation.
    let written: Vec<PathBuf> = files
        .par_iter()
        .map(|path| {
            let result = render_snapshot_file(path, &args.output);
            progress.inc(1);
            result
        })
        .collect::<Result<Vec<_>>>()?;
    progress.finish();

    for path in &written {
        info!("Wrote {}", path.display());
    }
    info!(
        "Rendered {} pages to {}",
        written.len(),
        args.output.display()
    );

    Ok(())
}
