//! OpenAI-compatible `/chat/completions` client for `ai_response` actions.
//!
//! The API key is held as a [`SecretString`] and only exposed when building
//! the `Authorization` header.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tripwire_core::automation::collaborator::{
    BoxFuture, ChatMessage, CompletionClient, CompletionRequest, CompletionResponse,
};
use tripwire_types::config::AiConfig;
use tripwire_types::error::ActionError;

use super::{USER_AGENT, network_error, read_response};

pub struct OpenAiCompletionClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    default_model: String,
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatCompletionReply {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompletionClient {
    pub fn new(config: &AiConfig, api_key: SecretString) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_model: config.default_model.clone(),
        })
    }

    /// Build a client when the key variable named in the config is set.
    pub fn from_env(config: &AiConfig) -> Result<Option<Self>, reqwest::Error> {
        match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Self::new(config, SecretString::from(key)).map(Some),
            _ => Ok(None),
        }
    }

    async fn perform(&self, request: &CompletionRequest) -> Result<CompletionResponse, ActionError> {
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        if request.use_retrieval {
            tracing::debug!(model, "retrieval requested but not supported by this endpoint");
        }

        let body = ChatCompletionBody {
            model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;
        let (_, value) = read_response(response).await?;

        let reply: ChatCompletionReply = serde_json::from_value(value)
            .map_err(|e| ActionError::Failed(format!("unexpected completion response: {e}")))?;
        let text = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ActionError::Failed("completion returned no content".to_string()))?;

        Ok(CompletionResponse {
            text,
            model: reply.model.or_else(|| Some(model.to_string())),
            retrieval: None,
        })
    }
}

impl CompletionClient for OpenAiCompletionClient {
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> BoxFuture<'a, Result<CompletionResponse, ActionError>> {
        Box::pin(self.perform(request))
    }
}
