//! Command handler modules for labsync-cli.
//!
//! Shared utilities used by multiple command paths live here.

pub mod process;
pub mod seed;

use anyhow::{Context, Result};
use labsync_config::{LoadedConfig, SyncConfig, UnusedKeyPolicy};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load layered config, report unused keys and extract typed settings.
pub fn load_settings(paths: &[String], strict: bool) -> Result<(LoadedConfig, SyncConfig)> {
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = labsync_config::load_layered_yaml(&refs).context("load config failed")?;

    let policy = if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = labsync_config::report_unused_keys(&loaded.config_json, policy)?;
    for key in &report.unused_leaf_pointers {
        tracing::warn!(pointer = %key, "unused config key");
    }

    let settings = loaded.settings()?;
    Ok((loaded, settings))
}
