//! Emits the callable catalog for a graph snapshot.
//!
//! Loads the snapshot, merges the profile's namespaces onto the root, walks
//! the graph and prints the catalog as one JSON line on stdout. Diagnostics
//! go to stderr.
//!
//! Usage:
//!   extract-api --graph snapshots/node.json
//!   extract-api --graph graph.json --namespaces fs,path --format records

use anyhow::Result;
use apiscan::runtime::init_logging;
use apiscan::{CatalogFormat, ScanProfile, emit, load_and_merge, scan, select_namespaces};
use clap::Parser;
use std::io::stdout;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "extract-api")]
#[command(about = "Enumerate every callable reachable from a graph snapshot")]
struct Cli {
    /// Graph snapshot document to walk.
    #[arg(long)]
    graph: PathBuf,
    /// Scan profile (or set APISCAN_PROFILE); the built-in profile otherwise.
    #[arg(long)]
    profile: Option<PathBuf>,
    /// Comma-separated namespaces to merge instead of the profile's list.
    #[arg(long, conflicts_with = "no_namespaces")]
    namespaces: Option<String>,
    /// Walk the root as-is, without merging namespaces.
    #[arg(long)]
    no_namespaces: bool,
    /// Output shape: names (default) or records.
    #[arg(long, value_enum, default_value_t = CatalogFormat::Names)]
    format: CatalogFormat,
}

fn main() {
    init_logging();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let profile = ScanProfile::resolve(cli.profile.as_deref())?;
    let namespaces = select_namespaces(&profile, cli.namespaces.as_deref(), cli.no_namespaces);

    let (graph, _) = load_and_merge(&cli.graph, &namespaces)?;
    let discovery = scan(&graph, &profile.exclusions());

    emit(&mut stdout().lock(), &discovery.entries, cli.format)
}
