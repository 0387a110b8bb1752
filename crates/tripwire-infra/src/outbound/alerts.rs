//! Dialect alerts client for `send_notification` actions.
//!
//! `POST {base}/alerts` for a single recipient, `POST {base}/alerts/broadcast`
//! for every subscriber. A 2xx reply whose body carries `"success": false`
//! is reported as an unsuccessful receipt rather than an error.

use std::time::Duration;

use serde_json::Value;
use tripwire_core::automation::collaborator::{AlertReceipt, AlertRequest, AlertSender, BoxFuture};
use tripwire_types::error::ActionError;

use super::{USER_AGENT, network_error, read_response};

pub struct DialectAlertsClient {
    client: reqwest::Client,
    base_url: String,
    default_channels: Vec<String>,
}

impl DialectAlertsClient {
    pub fn new(base_url: &str, default_channels: Vec<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_channels,
        })
    }

    async fn post(&self, path: &str, alert: &AlertRequest) -> Result<AlertReceipt, ActionError> {
        let mut payload = alert.clone();
        if payload.channels.is_empty() {
            payload.channels = self.default_channels.clone();
        }

        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%url, recipient = ?payload.recipient, "sending alert");

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(network_error)?;
        let (_, body) = read_response(response).await?;
        Ok(receipt_from(body))
    }
}

fn receipt_from(body: Value) -> AlertReceipt {
    let success = body.get("success").and_then(Value::as_bool).unwrap_or(true);
    let id = ["id", "alertId"]
        .iter()
        .find_map(|key| body.get(*key))
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
    AlertReceipt {
        success,
        id,
        detail: (!body.is_null()).then_some(body),
    }
}

impl AlertSender for DialectAlertsClient {
    fn send<'a>(&'a self, alert: &'a AlertRequest) -> BoxFuture<'a, Result<AlertReceipt, ActionError>> {
        Box::pin(async move {
            if alert.recipient.is_none() {
                return Err(ActionError::InvalidConfig(
                    "alert has no recipient, use broadcast".to_string(),
                ));
            }
            self.post("/alerts", alert).await
        })
    }

    fn broadcast<'a>(
        &'a self,
        alert: &'a AlertRequest,
    ) -> BoxFuture<'a, Result<AlertReceipt, ActionError>> {
        Box::pin(async move {
            let mut alert = alert.clone();
            alert.recipient = None;
            self.post("/alerts/broadcast", &alert).await
        })
    }
}
