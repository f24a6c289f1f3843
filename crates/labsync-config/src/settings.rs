use anyhow::{bail, Result};
use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_LAB_RESULT_ENCOUNTER_TYPE: &str = "LAB_RESULT";
pub const DEFAULT_LAB_ORDER_ENCOUNTER_TYPE: &str = "INVESTIGATION";
pub const DEFAULT_SYSTEM_PROVIDER_IDENTIFIER: &str = "system";
pub const DEFAULT_UNKNOWN_ENCOUNTER_ROLE_UUID: &str = "a0b03050-c99b-11e0-9572-0800200c9a66";
pub const DEFAULT_WORKER_CONCURRENCY: usize = 4;

/// Env var NAMES holding the lab system basic-auth credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthEnvNames {
    pub user_env: String,
    pub password_env: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElisSettings {
    /// Lab system root, without trailing slash. Event content paths are
    /// appended to it.
    pub base_uri: String,
    pub timeout_ms: u64,
    pub auth: Option<AuthEnvNames>,
}

impl ElisSettings {
    /// Absolute url of the accession document behind an event content path.
    pub fn accession_url(&self, content: &str) -> String {
        let path = content.trim();
        if path.starts_with('/') {
            format!("{}{}", self.base_uri, path)
        } else {
            format!("{}/{}", self.base_uri, path)
        }
    }
}

/// Typed settings for one sync deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncConfig {
    pub elis: ElisSettings,
    pub lab_result_encounter_type: String,
    pub lab_order_encounter_type: String,
    pub system_provider_identifier: String,
    pub unknown_encounter_role_uuid: String,
    pub worker_concurrency: usize,
}

fn read_str(config: &Value, pointer: &str) -> Result<Option<String>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let t = s.trim();
            Ok((!t.is_empty()).then(|| t.to_string()))
        }
        Some(_) => bail!("CONFIG_INVALID {pointer}: expected a string"),
    }
}

fn read_u64(config: &Value, pointer: &str) -> Result<Option<u64>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => match v.as_u64() {
            Some(n) => Ok(Some(n)),
            None => bail!("CONFIG_INVALID {pointer}: expected a non-negative integer"),
        },
    }
}

fn str_or(config: &Value, pointer: &str, default: &str) -> Result<String> {
    Ok(read_str(config, pointer)?.unwrap_or_else(|| default.to_string()))
}

impl SyncConfig {
    pub fn from_config_json(config: &Value) -> Result<Self> {
        let Some(base_uri) = read_str(config, "/elis/base_uri")? else {
            bail!("CONFIG_MISSING /elis/base_uri: lab system base uri is required");
        };

        let timeout_ms = read_u64(config, "/elis/timeout_ms")?.unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout_ms == 0 {
            bail!("CONFIG_INVALID /elis/timeout_ms: must be greater than zero");
        }

        let auth = match (
            read_str(config, "/elis/auth/user_env")?,
            read_str(config, "/elis/auth/password_env")?,
        ) {
            (Some(user_env), Some(password_env)) => Some(AuthEnvNames {
                user_env,
                password_env,
            }),
            (None, None) => None,
            _ => bail!(
                "CONFIG_INVALID /elis/auth: user_env and password_env must be set together"
            ),
        };

        let concurrency = read_u64(config, "/worker/concurrency")?
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_WORKER_CONCURRENCY);
        if concurrency == 0 {
            bail!("CONFIG_INVALID /worker/concurrency: must be at least 1");
        }

        Ok(Self {
            elis: ElisSettings {
                base_uri: base_uri.trim_end_matches('/').to_string(),
                timeout_ms,
                auth,
            },
            lab_result_encounter_type: str_or(
                config,
                "/encounter_types/lab_result",
                DEFAULT_LAB_RESULT_ENCOUNTER_TYPE,
            )?,
            lab_order_encounter_type: str_or(
                config,
                "/encounter_types/lab_order",
                DEFAULT_LAB_ORDER_ENCOUNTER_TYPE,
            )?,
            system_provider_identifier: str_or(
                config,
                "/providers/system_identifier",
                DEFAULT_SYSTEM_PROVIDER_IDENTIFIER,
            )?,
            unknown_encounter_role_uuid: str_or(
                config,
                "/encounter_roles/unknown_uuid",
                DEFAULT_UNKNOWN_ENCOUNTER_ROLE_UUID,
            )?,
            worker_concurrency: concurrency,
        })
    }

    pub fn accession_url(&self, content: &str) -> String {
        self.elis.accession_url(content)
    }
}
