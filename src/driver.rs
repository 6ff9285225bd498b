//! Bootstrap hand-off to the external fuzz driver.
//!
//! After namespaces are merged, the augmented graph is written to a temporary
//! snapshot and the driver program is invoked as
//! `<program> <entry> <snapshot-path>`. The hand-off is best effort: every
//! failure is logged and reported as a `DriverOutcome`, never as an error.

use crate::graph::GraphSnapshot;
use crate::runtime::{find_on_path, is_executable};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::NamedTempFile;

pub const DEFAULT_DRIVER_PROGRAM: &str = "caf";
pub const DEFAULT_DRIVER_ENTRY: &str = "run";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverSpec {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_entry")]
    pub entry: String,
}

fn default_program() -> String {
    DEFAULT_DRIVER_PROGRAM.to_string()
}

fn default_entry() -> String {
    DEFAULT_DRIVER_ENTRY.to_string()
}

impl Default for DriverSpec {
    fn default() -> Self {
        Self {
            program: default_program(),
            entry: default_entry(),
        }
    }
}

impl DriverSpec {
    pub fn validate(&self) -> Result<()> {
        if self.program.trim().is_empty() {
            bail!("driver.program must not be empty");
        }
        if self.entry.trim().is_empty() {
            bail!("driver.entry must not be empty");
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DriverOutcome {
    Completed,
    /// The driver ran and exited unsuccessfully; `None` means a signal.
    Failed { code: Option<i32> },
    /// The driver could not be started at all.
    Unavailable { reason: String },
}

/// Hand the augmented graph to the driver. Never fails.
pub fn hand_off(spec: &DriverSpec, snapshot: &GraphSnapshot) -> DriverOutcome {
    let program = match resolve_driver(&spec.program) {
        Ok(program) => program,
        Err(err) => {
            tracing::warn!(driver = %spec.program, "fuzz driver unavailable: {err:#}");
            return DriverOutcome::Unavailable {
                reason: format!("{err:#}"),
            };
        }
    };

    let snapshot_file = match write_snapshot(snapshot) {
        Ok(file) => file,
        Err(err) => {
            tracing::warn!("could not stage graph snapshot for driver: {err:#}");
            return DriverOutcome::Unavailable {
                reason: format!("{err:#}"),
            };
        }
    };

    tracing::info!(
        driver = %program.display(),
        entry = %spec.entry,
        "handing off to fuzz driver"
    );
    let status = Command::new(&program)
        .arg(&spec.entry)
        .arg(snapshot_file.path())
        .stdin(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => DriverOutcome::Completed,
        Ok(status) => {
            tracing::warn!(driver = %program.display(), code = ?status.code(), "fuzz driver failed; continuing");
            DriverOutcome::Failed {
                code: status.code(),
            }
        }
        Err(err) => {
            tracing::warn!(driver = %program.display(), "failed to execute fuzz driver: {err}");
            DriverOutcome::Unavailable {
                reason: err.to_string(),
            }
        }
    }
}

/// Locate the driver: an explicit path, a sibling of the current executable,
/// then PATH.
pub fn resolve_driver(program: &str) -> Result<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        if is_executable(candidate) {
            return Ok(candidate.to_path_buf());
        }
        bail!("driver '{}' is not an executable file", candidate.display());
    }

    if let Ok(current_exe) = env::current_exe() {
        if let Some(dir) = current_exe.parent() {
            let sibling = dir.join(program);
            if is_executable(&sibling) {
                return Ok(sibling);
            }
        }
    }

    if let Some(path) = find_on_path(program) {
        return Ok(path);
    }

    bail!("Unable to locate driver '{program}' next to this binary or on PATH")
}

fn write_snapshot(snapshot: &GraphSnapshot) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new().context("create graph snapshot temp file")?;
    serde_json::to_writer(&mut file, snapshot).context("write graph snapshot temp file")?;
    Ok(file)
}
