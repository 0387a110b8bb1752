//! Engine configuration types.
//!
//! `EngineConfig` mirrors `config.toml` in the data directory. Every field has
//! a default so a missing or partial file still yields a usable config.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Top-level configuration for Tripwire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub messaging: MessagingConfig,
}

impl EngineConfig {
    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.webhook.signature_header.trim().is_empty() {
            return Err("webhook.signature_header cannot be empty".to_string());
        }
        if self.queue.capacity == 0 {
            return Err("queue.capacity must be at least 1".to_string());
        }
        if self.ai.timeout_secs == 0 {
            return Err("ai.timeout_secs must be at least 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Webhook ingress settings. The shared secret itself is never read from
/// the file; it comes from the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_signature_header")]
    pub signature_header: String,
    #[serde(default)]
    pub signature_encoding: SignatureEncoding,
    /// Reject unsigned or malformed deliveries instead of acknowledging them.
    #[serde(default)]
    pub strict: bool,
}

fn default_signature_header() -> String {
    "x-dialect-signature".to_string()
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            signature_header: default_signature_header(),
            signature_encoding: SignatureEncoding::default(),
            strict: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureEncoding {
    #[default]
    Hex,
    Base64,
}

impl fmt::Display for SignatureEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureEncoding::Hex => write!(f, "hex"),
            SignatureEncoding::Base64 => write!(f, "base64"),
        }
    }
}

impl FromStr for SignatureEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hex" => Ok(SignatureEncoding::Hex),
            "base64" => Ok(SignatureEncoding::Base64),
            other => Err(format!("invalid signature encoding: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Bounded channel size between the webhook and the dispatcher.
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Base URL of the alerts API. Notification actions fail while unset.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_alert_channels")]
    pub default_channels: Vec<String>,
}

fn default_alert_channels() -> Vec<String> {
    vec!["IN_APP".to_string()]
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            default_channels: default_alert_channels(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiConfig {
    /// OpenAI-compatible API base URL.
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,
    #[serde(default = "default_ai_model")]
    pub default_model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_ai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
}

fn default_ai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_ai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_ai_timeout() -> u64 {
    60
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: default_ai_base_url(),
            default_model: default_ai_model(),
            api_key_env: default_ai_key_env(),
            timeout_secs: default_ai_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Incoming-webhook style URL for `send_message`. Stubbed when unset.
    #[serde(default)]
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.webhook.signature_header, "x-dialect-signature");
        assert_eq!(config.webhook.signature_encoding, SignatureEncoding::Hex);
        assert!(!config.webhook.strict);
        assert_eq!(config.queue.capacity, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_config_deserialize_empty() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_engine_config_deserialize_partial() {
        let toml_str = r#"
[webhook]
signature_encoding = "base64"
strict = true

[queue]
capacity = 8
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.webhook.signature_encoding, SignatureEncoding::Base64);
        assert!(config.webhook.strict);
        assert_eq!(config.webhook.signature_header, "x-dialect-signature");
        assert_eq!(config.queue.capacity, 8);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = EngineConfig::default();
        config.queue.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_signature_encoding_from_str() {
        assert_eq!("HEX".parse::<SignatureEncoding>().unwrap(), SignatureEncoding::Hex);
        assert_eq!(
            " base64 ".parse::<SignatureEncoding>().unwrap(),
            SignatureEncoding::Base64
        );
        assert!("utf8".parse::<SignatureEncoding>().is_err());
    }
}
