use anyhow::Result;
use clap::{Parser, Subcommand};
use fts_top10::{fetch, normalize, render};

#[derive(Parser)]
#[command(name = "fts-top10")]
#[command(about = "Fetch, normalize, and render humanitarian-funding TOP10 snapshots")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a snapshot document over HTTP
    Fetch(fetch::FetchArgs),
    /// Normalize snapshots into canonical per-donor views
    Normalize(normalize::NormalizeArgs),
    /// Render snapshots as static Leaflet map pages
    Render(render::RenderArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }

    match cli.command {
        Commands::Fetch(args) => fetch::run(args),
        Commands::Normalize(args) => normalize::run(args),
        Commands::Render(args) => render::run(args),
    }
}
