//! Scan profiles.
//!
//! A profile fixes the namespace list merged onto the root, the two exclusion
//! sets and the fuzz driver hand-off. The built-in profile covers the runtime's
//! builtin modules; a JSON profile on disk can replace any field. Profiles are
//! version-checked the same way catalogs are: unknown `schema_version` values
//! are rejected unless widened through the environment.

use crate::driver::DriverSpec;
use crate::runtime::split_list;
use crate::walker::{DEFAULT_EXCLUDED_PROPERTIES, DEFAULT_RESERVED_NAMES, Exclusions};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PROFILE_SCHEMA_VERSION: &str = "apiscan_profile_v1";
const ENV_ALLOWED_PROFILE_SCHEMAS: &str = "APISCAN_ALLOWED_PROFILE_SCHEMAS";
pub const ENV_PROFILE_PATH: &str = "APISCAN_PROFILE";

/// Builtin module names, in merge order. Changing this list changes which
/// paths appear in the catalog.
pub const BUILTIN_NAMESPACES: &[&str] = &[
    "assert",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "worker_threads",
    "zlib",
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProfile {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default = "default_namespaces")]
    pub namespaces: Vec<String>,
    #[serde(default = "default_excluded_properties")]
    pub excluded_properties: Vec<String>,
    #[serde(default = "default_reserved_names")]
    pub reserved_names: Vec<String>,
    #[serde(default)]
    pub driver: DriverSpec,
}

fn default_schema_version() -> String {
    DEFAULT_PROFILE_SCHEMA_VERSION.to_string()
}

fn default_namespaces() -> Vec<String> {
    to_strings(BUILTIN_NAMESPACES)
}

fn default_excluded_properties() -> Vec<String> {
    to_strings(DEFAULT_EXCLUDED_PROPERTIES)
}

fn default_reserved_names() -> Vec<String> {
    to_strings(DEFAULT_RESERVED_NAMES)
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl Default for ScanProfile {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            namespaces: default_namespaces(),
            excluded_properties: default_excluded_properties(),
            reserved_names: default_reserved_names(),
            driver: DriverSpec::default(),
        }
    }
}

impl ScanProfile {
    /// Load and validate a profile from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading scan profile {}", path.display()))?;
        let profile: ScanProfile = serde_json::from_str(&data)
            .with_context(|| format!("parsing scan profile {}", path.display()))?;
        profile
            .validate()
            .with_context(|| format!("validating scan profile {}", path.display()))?;
        Ok(profile)
    }

    /// Explicit path, then `APISCAN_PROFILE`, then the built-in profile.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match resolve_profile_path(explicit) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_schema_version(&self.schema_version)?;

        let mut seen = BTreeSet::new();
        for name in &self.namespaces {
            if name.trim().is_empty() {
                bail!("namespaces must not contain empty names");
            }
            if !seen.insert(name.as_str()) {
                bail!("namespace '{name}' is listed more than once");
            }
        }
        if self.excluded_properties.iter().any(|n| n.is_empty()) {
            bail!("excluded_properties must not contain empty names");
        }
        if self.reserved_names.iter().any(|n| n.is_empty()) {
            bail!("reserved_names must not contain empty names");
        }
        self.driver.validate()
    }

    pub fn exclusions(&self) -> Exclusions {
        Exclusions::new(
            self.excluded_properties.iter().cloned(),
            self.reserved_names.iter().cloned(),
        )
    }
}

fn resolve_profile_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    match env::var_os(ENV_PROFILE_PATH) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}

/// Profile documents name their format; only known formats are accepted.
fn validate_schema_version(schema_version: &str) -> Result<()> {
    let well_formed = !schema_version.is_empty()
        && schema_version
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"_.-".contains(&b));
    if !well_formed {
        bail!("scan profile schema_version '{schema_version}' is not a valid version tag");
    }

    let allowed = allowed_schema_versions();
    if !allowed.contains(schema_version) {
        let known: Vec<&str> = allowed.iter().map(String::as_str).collect();
        bail!(
            "scan profile schema_version '{schema_version}' is not supported (known: {})",
            known.join(", ")
        );
    }
    Ok(())
}

/// Profile formats this build reads: the built-in one plus any listed in
/// `APISCAN_ALLOWED_PROFILE_SCHEMAS`.
pub fn allowed_schema_versions() -> BTreeSet<String> {
    let extra = env::var(ENV_ALLOWED_PROFILE_SCHEMAS).unwrap_or_default();
    std::iter::once(DEFAULT_PROFILE_SCHEMA_VERSION.to_string())
        .chain(split_list(&extra))
        .collect()
}
