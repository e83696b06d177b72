//! Billing configuration
//!
//! Settings come from an optional file (`BILLING_CONFIG_FILE`, default
//! `billing.toml`) overlaid by `BILLING_*` environment variables. Every field
//! has a default, so an empty environment yields a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use domain_exemption::SandboxLimits;

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output
    Pretty,
    /// One JSON object per event
    Json,
}

/// Billing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BillingSettings {
    /// Log level directive, overridden by `RUST_LOG`
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
    /// Static exemption scope document
    pub exemption_config_path: PathBuf,
    /// Optional JSON array of script-authored exemptions
    pub exemption_rules_path: Option<PathBuf>,
    /// Optional JSON map of concept id to unit price
    pub price_list_path: Option<PathBuf>,
    /// Timeout per exemption script; 0 disables the timeout
    pub script_timeout_ms: u64,
    /// Largest accepted exemption script, in bytes
    pub max_script_len: usize,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            exemption_config_path: PathBuf::from("exemptions.json"),
            exemption_rules_path: None,
            price_list_path: None,
            script_timeout_ms: SandboxLimits::DEFAULT_TIMEOUT.as_millis() as u64,
            max_script_len: SandboxLimits::DEFAULT_MAX_SCRIPT_LEN,
        }
    }
}

impl BillingSettings {
    /// Environment variable prefix
    pub const ENV_PREFIX: &'static str = "BILLING";
    /// Names the settings file
    pub const CONFIG_FILE_VAR: &'static str = "BILLING_CONFIG_FILE";
    pub const DEFAULT_CONFIG_FILE: &'static str = "billing.toml";

    /// Loads settings from the configured file and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let file = std::env::var(Self::CONFIG_FILE_VAR)
            .unwrap_or_else(|_| Self::DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(Some(Path::new(&file)))
    }

    /// Loads settings from an optional file and the environment
    ///
    /// A missing file is not an error; a malformed one is.
    pub fn load_from(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        builder
            .add_source(config::Environment::with_prefix(Self::ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Limits for the exemption script sandbox
    pub fn sandbox_limits(&self) -> SandboxLimits {
        let timeout = match self.script_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        SandboxLimits::new(timeout, self.max_script_len)
    }
}
