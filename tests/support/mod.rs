#![allow(dead_code)]

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Callables reachable from `runtime_graph.json` once fs, path and events
/// are merged, in discovery order.
pub const MERGED_CATALOG: &[&str] = &[
    "Buffer",
    "setTimeout",
    "events",
    "console.log",
    "console.error",
    "Buffer.from",
    "fs.readFileSync",
    "path.join",
    "events.once",
    "Buffer.prototype.toString",
    "fs.promises.readFile",
];

/// Callables reachable from the bare root of `runtime_graph.json`.
pub const BARE_CATALOG: &[&str] = &[
    "Buffer",
    "setTimeout",
    "console.log",
    "console.error",
    "Buffer.from",
    "Buffer.prototype.toString",
];

pub fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn fixture(name: &str) -> PathBuf {
    repo_root().join("tests/fixtures").join(name)
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Command for one of this crate's binaries with a clean profile environment.
pub fn binary(name: &str) -> Command {
    let path = match name {
        "extract-api" => env!("CARGO_BIN_EXE_extract-api"),
        "api-bootstrap" => env!("CARGO_BIN_EXE_api-bootstrap"),
        other => panic!("unknown binary {other}"),
    };
    let mut cmd = Command::new(path);
    cmd.env_remove("APISCAN_PROFILE").env_remove("APISCAN_LOG");
    cmd
}

pub fn run_command(mut cmd: Command) -> Result<Output> {
    let output = cmd
        .output()
        .with_context(|| format!("failed to spawn {:?}", cmd.get_program()))?;
    if !output.status.success() {
        bail!(
            "command {:?} failed with {:?}: {}",
            cmd.get_program(),
            output.status.code(),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(output)
}

#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n"))
        .with_context(|| format!("failed to write script {}", path.display()))?;
    let mut perms = fs::metadata(&path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms)?;
    Ok(path)
}
