//! Layered YAML configuration.
//!
//! Files are merged in order (later layers override earlier ones), converted
//! to JSON, canonicalised and hashed. The hash is logged by the binaries so a
//! processed accession can always be tied back to the exact settings in force.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

mod leaves;
pub mod secrets;
mod settings;

use leaves::{leaf_values, pointer_covers};

pub use settings::{
    AuthEnvNames, ElisSettings, SyncConfig, DEFAULT_LAB_ORDER_ENCOUNTER_TYPE,
    DEFAULT_LAB_RESULT_ENCOUNTER_TYPE, DEFAULT_SYSTEM_PROVIDER_IDENTIFIER, DEFAULT_TIMEOUT_MS,
    DEFAULT_UNKNOWN_ENCOUNTER_ROLE_UUID, DEFAULT_WORKER_CONCURRENCY,
};

/// JSON-pointer prefixes actually read by [`SyncConfig::from_config_json`]
/// and [`secrets::resolve_elis_credentials`].
///
/// A leaf under one of these prefixes is consumed; anything else is reported
/// as unused. Keep this in step with the readers, never broader.
pub const CONSUMED_POINTERS: &[&str] = &[
    "/elis/base_uri",
    "/elis/timeout_ms",
    "/elis/auth/user_env",
    "/elis/auth/password_env",
    "/encounter_types/lab_result",
    "/encounter_types/lab_order",
    "/providers/system_identifier",
    "/encounter_roles/unknown_uuid",
    "/worker/concurrency",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Registry the document was checked against.
    pub consumed_prefixes: Vec<String>,
    /// Leaves nothing reads, sorted.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Check every leaf of the merged document against [`CONSUMED_POINTERS`].
/// `Fail` turns a non-empty report into `CONFIG_UNUSED_KEYS`.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let mut unused: Vec<String> = leaf_values(config_json)
        .into_iter()
        .map(|(ptr, _)| ptr)
        .filter(|ptr| !CONSUMED_POINTERS.iter().any(|c| pointer_covers(c, ptr)))
        .collect();
    unused.sort();

    let mut consumed_prefixes: Vec<String> = CONSUMED_POINTERS.iter().map(|p| p.to_string()).collect();
    consumed_prefixes.sort();

    let report = UnusedKeyReport {
        consumed_prefixes,
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        let shown: Vec<&str> = report.unused_leaf_pointers.iter().take(12).map(String::as_str).collect();
        bail!(
            "CONFIG_UNUSED_KEYS: {} unused config leaf key(s): {}",
            report.unused_leaf_pointers.len(),
            shown.join(", ")
        );
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Merged configuration plus its identity.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// sha256 of `canonical_json`, hex encoded.
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Typed view over the merged document.
    pub fn settings(&self) -> Result<SyncConfig> {
        SyncConfig::from_config_json(&self.config_json)
    }

    fn from_merged(config_json: Value) -> Result<Self> {
        secrets::reject_inline_credentials(&config_json)?;
        // serde_json maps are key-ordered, so compact output is canonical.
        let canonical_json = serde_json::to_string(&config_json).context("canonical json serialize failed")?;
        let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));
        Ok(Self {
            config_hash,
            canonical_json,
            config_json,
        })
    }
}

/// Read and merge the YAML files at `paths`, later files winning.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let docs = paths
        .iter()
        .map(|p| std::fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}")))
        .collect::<Result<Vec<String>>>()?;
    let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());
    for (i, raw) in yaml_docs.iter().enumerate() {
        let layer: Value = serde_yaml::from_str(raw).with_context(|| format!("invalid yaml in layer {i}"))?;
        // An empty file parses to null and contributes nothing.
        if !layer.is_null() {
            overlay(&mut merged, layer);
        }
    }
    LoadedConfig::from_merged(merged)
}

/// Objects merge key by key; any other value replaces what was below it.
fn overlay(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base_map), Value::Object(layer_map)) => {
            for (k, v) in layer_map {
                overlay(base_map.entry(k).or_insert(Value::Null), v);
            }
        }
        (slot, v) => *slot = v,
    }
}
