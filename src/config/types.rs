use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::provision::{ProvisionRequest, ProvisionTimeouts};

// ─── Top-Level Config ───────────────────────────────────────────────────────

/// Root configuration structure parsed from sqlprov YAML files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YamlConfig {
    pub project: YamlProject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YamlProject {
    pub name: String,
    #[serde(default)]
    pub settings: YamlSettings,
    /// Scripts keyed by local address.
    #[serde(default)]
    pub scripts: BTreeMap<String, YamlScriptConfig>,
}

// ─── Settings ───────────────────────────────────────────────────────────────

/// Global settings controlling execution behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YamlSettings {
    /// Default cloud project for scripts that don't name one.
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    #[serde(default = "default_working_dir")]
    pub working_dir: String,
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    /// Environment variable holding the OAuth access token.
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
    #[serde(default)]
    pub retry: RetrySettings,
}

impl Default for YamlSettings {
    fn default() -> Self {
        Self {
            project: None,
            parallelism: default_parallelism(),
            working_dir: default_working_dir(),
            api_endpoint: default_api_endpoint(),
            access_token_env: default_access_token_env(),
            timeouts: TimeoutSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

fn default_parallelism() -> usize {
    10
}

fn default_working_dir() -> String {
    ".sqlprov".to_string()
}

fn default_api_endpoint() -> String {
    crate::admin::http::DEFAULT_ENDPOINT.to_string()
}

fn default_access_token_env() -> String {
    "SQLPROV_ACCESS_TOKEN".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    #[serde(default = "default_timeout_secs")]
    pub create_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub read_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            create_secs: default_timeout_secs(),
            read_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    20 * 60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl YamlSettings {
    pub fn provision_timeouts(&self) -> ProvisionTimeouts {
        ProvisionTimeouts {
            create: Duration::from_secs(self.timeouts.create_secs),
            read: Duration::from_secs(self.timeouts.read_secs),
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }
}

// ─── Scripts ────────────────────────────────────────────────────────────────

/// One provision script as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YamlScriptConfig {
    pub name: String,
    pub instance: String,
    pub script: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default = "default_deletion_policy")]
    pub deletion_policy: String,
}

fn default_deletion_policy() -> String {
    "ABANDON".to_string()
}

/// A validated script with its project resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSpec {
    pub address: String,
    pub project: String,
    pub request: ProvisionRequest,
}
