//! Runtime secret resolution for the lab system client.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** under `elis.auth`.
//! - Binaries call [`resolve_elis_credentials`] once at startup and hand the
//!   result to the HTTP source. No other code reads these variables.
//! - `Debug` redacts values; errors name the variable, never the value.

use anyhow::{bail, Result};
use serde_json::Value;

use crate::SyncConfig;

/// Basic-auth credentials for the lab system. **Values are redacted in `Debug`.**
#[derive(Clone)]
pub struct ElisCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ElisCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElisCredentials")
            .field("username", &"<REDACTED>")
            .field("password", &"<REDACTED>")
            .finish()
    }
}

/// Returns `None` if the value is unset or blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve lab system credentials named by the config.
///
/// No `elis.auth` section means anonymous access (`Ok(None)`). When the
/// section is present both variables must be set.
pub fn resolve_elis_credentials(config_json: &Value) -> Result<Option<ElisCredentials>> {
    let settings = SyncConfig::from_config_json(config_json)?;
    let Some(names) = settings.elis.auth else {
        return Ok(None);
    };

    let Some(username) = resolve_env(&names.user_env) else {
        bail!(
            "SECRETS_MISSING: required env var '{}' (lab system user) is not set or empty",
            names.user_env
        );
    };
    let Some(password) = resolve_env(&names.password_env) else {
        bail!(
            "SECRETS_MISSING: required env var '{}' (lab system password) is not set or empty",
            names.password_env
        );
    };

    Ok(Some(ElisCredentials { username, password }))
}

/// Markers of material that must never sit in a config file.
const CREDENTIAL_MARKERS: &[&str] = &["-----BEGIN", "sk-", "sk_live", "ghp_", "gho_", "glpat-", "AKIA"];

/// Reject a merged config that carries a credential instead of a reference to one.
///
/// Any leaf starting with a known marker fails. Under `/elis/auth` every leaf
/// must additionally be an env var name (`[A-Z_][A-Z0-9_]*`). Errors name the
/// leaf and never the value.
pub(crate) fn reject_inline_credentials(config_json: &Value) -> Result<()> {
    for (ptr, v) in crate::leaves::leaf_values(config_json) {
        let Some(s) = v.as_str() else { continue };
        let s = s.trim();
        let marked = CREDENTIAL_MARKERS.iter().any(|m| s.starts_with(m));
        let inline_auth = crate::leaves::pointer_covers("/elis/auth", &ptr) && !is_env_var_name(s);
        if marked || inline_auth {
            bail!(
                "CONFIG_SECRET_DETECTED leaf={ptr} key={} value=REDACTED; store an env var name instead",
                crate::leaves::leaf_key(&ptr)
            );
        }
    }
    Ok(())
}

fn is_env_var_name(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_uppercase() || c == '_')
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
