//! Outbound HTTP for `call_webhook` actions.

use std::time::Duration;

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use tripwire_core::automation::collaborator::{BoxFuture, WebhookClient, WebhookRequest, WebhookResponse};
use tripwire_types::error::ActionError;

use super::{USER_AGENT, network_error, read_response};

pub struct HttpWebhookClient {
    client: reqwest::Client,
}

impl HttpWebhookClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        // Per-request timeouts come from the action config; this is the ceiling.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    async fn perform(&self, request: &WebhookRequest) -> Result<WebhookResponse, ActionError> {
        let method = Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| ActionError::InvalidConfig(format!("invalid HTTP method '{}'", request.method)))?;

        let mut builder = self
            .client
            .request(method.clone(), &request.url)
            .timeout(request.timeout);

        let mut has_content_type = false;
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ActionError::InvalidConfig(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ActionError::InvalidConfig(format!("invalid header value for '{name}': {e}")))?;
            has_content_type |= name == CONTENT_TYPE;
            builder = builder.header(name, value);
        }

        if let Some(body) = &request.body {
            if !has_content_type {
                builder = builder.header(CONTENT_TYPE, "application/json");
            }
            builder = builder.body(body.clone());
        }

        tracing::debug!(%method, url = %request.url, "calling outbound webhook");
        let response = builder.send().await.map_err(network_error)?;
        let (status, body) = read_response(response).await?;
        Ok(WebhookResponse { status, body })
    }
}

impl WebhookClient for HttpWebhookClient {
    fn call<'a>(&'a self, request: &'a WebhookRequest) -> BoxFuture<'a, Result<WebhookResponse, ActionError>> {
        Box::pin(self.perform(request))
    }
}
