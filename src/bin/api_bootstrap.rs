//! Bootstrap: merge namespaces, then hand the graph to the fuzz driver.
//!
//! Namespace resolution failures are fatal. Anything the driver does wrong
//! (missing, crashing, non-zero exit) is logged and ignored; this binary
//! still exits 0.

use anyhow::Result;
use apiscan::runtime::init_logging;
use apiscan::{ScanProfile, hand_off, load_and_merge, select_namespaces};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "api-bootstrap")]
#[command(about = "Merge namespaces into a graph snapshot and start the fuzz driver")]
struct Cli {
    /// Graph snapshot document to augment.
    #[arg(long)]
    graph: PathBuf,
    /// Scan profile (or set APISCAN_PROFILE); the built-in profile otherwise.
    #[arg(long)]
    profile: Option<PathBuf>,
    /// Comma-separated namespaces to merge instead of the profile's list.
    #[arg(long, conflicts_with = "no_namespaces")]
    namespaces: Option<String>,
    /// Skip the namespace merge.
    #[arg(long)]
    no_namespaces: bool,
    /// Driver program; overrides the profile.
    #[arg(long)]
    driver: Option<String>,
    /// Driver entry point; overrides the profile.
    #[arg(long)]
    entry: Option<String>,
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

    let mut driver = profile.driver.clone();
    if let Some(program) = cli.driver {
        driver.program = program;
    }
    if let Some(entry) = cli.entry {
        driver.entry = entry;
    }
    driver.validate()?;

    let (graph, _) = load_and_merge(&cli.graph, &namespaces)?;
    let outcome = hand_off(&driver, &graph.to_snapshot());
    tracing::debug!(?outcome, "bootstrap finished");
    Ok(())
}
