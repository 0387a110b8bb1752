//! Engine configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.tripwire/` by default)
//! into [`EngineConfig`], then applies `TRIPWIRE_*` environment overrides.
//! A missing or unparseable file falls back to defaults.

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use tripwire_types::config::{EngineConfig, SignatureEncoding};

pub const CONFIG_FILE: &str = "config.toml";

pub const ENV_DATA_DIR: &str = "TRIPWIRE_DATA_DIR";
pub const ENV_WEBHOOK_SECRET: &str = "TRIPWIRE_WEBHOOK_SECRET";
pub const ENV_WEBHOOK_SIGNATURE_HEADER: &str = "TRIPWIRE_WEBHOOK_SIGNATURE_HEADER";
pub const ENV_WEBHOOK_SIGNATURE_ENCODING: &str = "TRIPWIRE_WEBHOOK_SIGNATURE_ENCODING";
pub const ENV_WEBHOOK_STRICT: &str = "TRIPWIRE_WEBHOOK_STRICT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnv { var: &'static str, reason: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Data directory: `$TRIPWIRE_DATA_DIR`, else `~/.tripwire`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tripwire")
}

/// Load `{data_dir}/config.toml` with environment overrides applied.
pub async fn load_config(data_dir: &Path) -> Result<EngineConfig, ConfigError> {
    let config = read_config_file(data_dir).await;
    let config = apply_env_overrides(config, |key| std::env::var(key).ok())?;
    config.validate().map_err(ConfigError::Invalid)?;
    Ok(config)
}

async fn read_config_file(data_dir: &Path) -> EngineConfig {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return EngineConfig::default();
        }
    };

    match toml::from_str::<EngineConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", config_path.display());
            EngineConfig::default()
        }
    }
}

/// Overlay `TRIPWIRE_*` variables on top of the file config.
///
/// Takes a lookup function so tests do not touch the process environment.
pub fn apply_env_overrides(
    mut config: EngineConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<EngineConfig, ConfigError> {
    if let Some(header) = lookup(ENV_WEBHOOK_SIGNATURE_HEADER).filter(|h| !h.trim().is_empty()) {
        config.webhook.signature_header = header.trim().to_string();
    }

    if let Some(raw) = lookup(ENV_WEBHOOK_SIGNATURE_ENCODING) {
        config.webhook.signature_encoding =
            raw.parse::<SignatureEncoding>()
                .map_err(|reason| ConfigError::InvalidEnv {
                    var: ENV_WEBHOOK_SIGNATURE_ENCODING,
                    reason,
                })?;
    }

    if let Some(raw) = lookup(ENV_WEBHOOK_STRICT) {
        config.webhook.strict = parse_bool(&raw).ok_or_else(|| ConfigError::InvalidEnv {
            var: ENV_WEBHOOK_STRICT,
            reason: format!("expected true/false, got '{raw}'"),
        })?;
    }

    Ok(config)
}

/// The shared webhook secret, if configured. Empty values count as unset.
pub fn webhook_secret() -> Option<SecretString> {
    std::env::var(ENV_WEBHOOK_SECRET)
        .ok()
        .filter(|s| !s.is_empty())
        .map(SecretString::from)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
