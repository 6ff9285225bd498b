//! Callable surface inventory.
//!
//! Loads an object graph snapshot, merges the configured namespaces onto its
//! root, walks it breadth-first and emits the catalog of every reachable
//! callable. The pieces are usable on their own: `graph` for the model,
//! `namespace` for the merger, `walker` for discovery and `catalog` for
//! output.

pub mod catalog;
pub mod driver;
pub mod graph;
pub mod namespace;
pub mod profile;
pub mod runtime;
pub mod walker;

pub use catalog::{CatalogFormat, CatalogRecord, canonicalize, emit, render};
pub use driver::{DriverOutcome, DriverSpec, hand_off};
pub use graph::{
    GraphSnapshot, Heap, LoadedGraph, ObjectId, ObjectModel, PropertyFault, Value,
    load_graph_from_path,
};
pub use namespace::{
    MergeError, ModuleTable, NamespaceMap, NamespaceProvider, ResolvedNamespace,
    attach_namespaces, merge_namespaces,
};
pub use profile::ScanProfile;
pub use runtime::split_list;
pub use walker::{
    CatalogEntry, Discovery, Exclusions, WalkStats, Walker, default_exclusions, discover,
};

use anyhow::{Context, Result};
use std::path::Path;

/// Namespace list for a run: `--no-namespaces` wins, then an explicit list,
/// then the profile.
pub fn select_namespaces(
    profile: &ScanProfile,
    requested: Option<&str>,
    disabled: bool,
) -> Vec<String> {
    if disabled {
        return Vec::new();
    }
    match requested {
        Some(raw) => split_list(raw),
        None => profile.namespaces.clone(),
    }
}

/// Load a snapshot and attach `namespaces` to its root.
pub fn load_and_merge(path: &Path, namespaces: &[String]) -> Result<(LoadedGraph, NamespaceMap)> {
    let mut graph = load_graph_from_path(path)?;
    let root = graph.root_value();
    let map = attach_namespaces(&mut graph.heap, &root, namespaces, &graph.modules)
        .with_context(|| format!("merging namespaces into {}", path.display()))?;
    tracing::debug!(count = map.len(), "namespaces merged");
    Ok((graph, map))
}

/// Discover every callable reachable from the graph root.
pub fn scan(graph: &LoadedGraph, exclusions: &Exclusions) -> Discovery<ObjectId> {
    Walker::new(&graph.heap, &graph.root_value(), exclusions).run()
}
