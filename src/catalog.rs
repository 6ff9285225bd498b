//! Catalog emitter.
//!
//! Strips live handles off discovered entries and serializes the ordered
//! catalog. Rendering happens in full before anything reaches the writer.

use crate::walker::CatalogEntry;
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Canonical, handle-free form of a catalog entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: usize,
    pub name: String,
}

/// Output shape of the emitted catalog line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum CatalogFormat {
    /// JSON array of dotted names in discovery order.
    #[default]
    Names,
    /// JSON array of `{id, name}` records.
    Records,
}

pub fn canonicalize<H>(entries: &[CatalogEntry<H>]) -> Vec<CatalogRecord> {
    entries
        .iter()
        .map(|entry| CatalogRecord {
            id: entry.id,
            name: entry.name.clone(),
        })
        .collect()
}

/// Serialize the complete catalog as a single line of JSON.
pub fn render(records: &[CatalogRecord], format: CatalogFormat) -> Result<String> {
    let rendered = match format {
        CatalogFormat::Names => {
            let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
            serde_json::to_string(&names)
        }
        CatalogFormat::Records => serde_json::to_string(records),
    };
    rendered.context("serializing catalog")
}

/// Canonicalize, render and write `entries` followed by a newline.
pub fn emit<H, W: Write>(
    writer: &mut W,
    entries: &[CatalogEntry<H>],
    format: CatalogFormat,
) -> Result<()> {
    let mut line = render(&canonicalize(entries), format)?;
    line.push('\n');
    writer
        .write_all(line.as_bytes())
        .and_then(|_| writer.flush())
        .context("writing catalog")
}
