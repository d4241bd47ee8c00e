use anyhow::{Context, Result};
use clap::Args;
use std::fs::{self, File};
use std::path::PathBuf;
use tracing::info;

use crate::Snapshot;

mod client;
pub use client::SnapshotClient;

#[derive(Args)]
pub struct FetchArgs {
    /// Snapshot document URL
    #[arg(short, long)]
    pub url: String,

    /// Output directory for the fetched snapshot
    #[arg(short, long)]
    pub output: PathBuf,

    /// Request timeout in seconds
    #[arg(short, long, default_value = "30")]
    pub timeout: u64,
}

pub fn run(args: FetchArgs) -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_async(args))
}

pub async fn run_async(args: FetchArgs) -> Result<()> {
    fs::create_dir_all(&args.output).context("Failed to create output directory")?;

    let client = SnapshotClient::new(args.timeout);
    let doc = client
        .fetch_document(&args.url)
        .await
        .with_context(|| format!("Failed to load snapshot from {}", args.url))?;

    // The exporter names its artifact after the reporting year.
    let snapshot = Snapshot::from_value(&doc);
    let name = match snapshot.year {
        Some(year) => format!("top10_{}.json", year),
        None => String::from("top10.json"),
    };

    let out_path = args.output.join(name);
    let file = File::create(&out_path)
        .with_context(|| format!("Failed to create {}", out_path.display()))?;
    serde_json::to_writer_pretty(file, &doc)?;

    info!(
        "Wrote {} ({} donors)",
        out_path.display(),
        snapshot.donors.len()
    );

    Ok(())
}
