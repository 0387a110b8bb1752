//! Incoming-webhook style message delivery for `send_message` actions.

use std::time::Duration;

use serde_json::{Value, json};
use tripwire_core::automation::collaborator::{BoxFuture, MessageSender, OutboundMessage};
use tripwire_types::error::ActionError;

use super::{USER_AGENT, network_error, read_response};

/// Posts `{text, channel}` to a fixed URL.
pub struct HttpMessageSender {
    client: reqwest::Client,
    url: String,
}

impl HttpMessageSender {
    pub fn new(url: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    async fn deliver(&self, message: &OutboundMessage) -> Result<Value, ActionError> {
        let response = self
            .client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(network_error)?;
        let (status, body) = read_response(response).await?;
        Ok(json!({
            "delivered": true,
            "status": status,
            "response": body,
        }))
    }
}

impl MessageSender for HttpMessageSender {
    fn send<'a>(&'a self, message: &'a OutboundMessage) -> BoxFuture<'a, Result<Value, ActionError>> {
        Box::pin(self.deliver(message))
    }
}
