//! reqwest-backed implementations of the executor's collaborator ports.

pub mod alerts;
pub mod completion;
pub mod messaging;
pub mod webhook;

use std::sync::Arc;

use serde_json::Value;
use tripwire_core::automation::collaborator::Collaborators;
use tripwire_types::config::EngineConfig;
use tripwire_types::error::ActionError;

use self::alerts::DialectAlertsClient;
use self::completion::OpenAiCompletionClient;
use self::messaging::HttpMessageSender;
use self::webhook::HttpWebhookClient;

pub(crate) const USER_AGENT: &str = concat!("tripwire/", env!("CARGO_PKG_VERSION"));

/// Wire up every collaborator the config allows.
///
/// Outbound webhooks are always available. Alerts need `alerts.base_url`,
/// completions need the API key variable named by `ai.api_key_env`, and
/// messaging needs `messaging.url`. Missing ones are logged and left out.
pub fn build_collaborators(config: &EngineConfig) -> Result<Collaborators, reqwest::Error> {
    let mut collaborators = Collaborators::new().with_webhooks(Arc::new(HttpWebhookClient::new()?));

    match &config.alerts.base_url {
        Some(base_url) => {
            collaborators = collaborators.with_alerts(Arc::new(DialectAlertsClient::new(
                base_url,
                config.alerts.default_channels.clone(),
            )?));
        }
        None => tracing::info!("alerts.base_url not set, send_notification actions will fail"),
    }

    match OpenAiCompletionClient::from_env(&config.ai)? {
        Some(client) => collaborators = collaborators.with_completions(Arc::new(client)),
        None => tracing::info!(
            env = %config.ai.api_key_env,
            "no AI API key in environment, ai_response actions will fail"
        ),
    }

    if let Some(url) = &config.messaging.url {
        collaborators = collaborators.with_messages(Arc::new(HttpMessageSender::new(url)?));
    }

    tracing::debug!(?collaborators, "collaborators ready");
    Ok(collaborators)
}

pub(crate) fn network_error(err: reqwest::Error) -> ActionError {
    if err.is_timeout() {
        ActionError::Network(format!("request timed out: {err}"))
    } else {
        ActionError::Network(err.to_string())
    }
}

/// Read a response into `(status, body)`.
///
/// Non-2xx statuses become `ActionError::Upstream`. A 2xx body is parsed as
/// JSON when possible, otherwise returned as a JSON string (`null` if empty).
pub(crate) async fn read_response(response: reqwest::Response) -> Result<(u16, Value), ActionError> {
    let status = response.status();
    let text = response.text().await.map_err(network_error)?;

    if !status.is_success() {
        return Err(ActionError::Upstream {
            status: status.as_u16(),
            body: text,
        });
    }

    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };
    Ok((status.as_u16(), body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_wires_webhooks_only() {
        let mut config = EngineConfig::default();
        config.ai.api_key_env = "TRIPWIRE_TEST_UNSET_AI_KEY".to_string();

        let collaborators = build_collaborators(&config).unwrap();
        assert!(collaborators.webhooks.is_some());
        assert!(collaborators.alerts.is_none());
        assert!(collaborators.completions.is_none());
        assert!(collaborators.messages.is_none());
    }

    #[test]
    fn configured_urls_enable_alerts_and_messaging() {
        let mut config = EngineConfig::default();
        config.ai.api_key_env = "TRIPWIRE_TEST_UNSET_AI_KEY".to_string();
        config.alerts.base_url = Some("https://alerts.example.com".to_string());
        config.messaging.url = Some("https://hooks.example.com/chat".to_string());

        let collaborators = build_collaborators(&config).unwrap();
        assert!(collaborators.alerts.is_some());
        assert!(collaborators.messages.is_some());
    }
}
