//! Outbound collaborator ports used by action handlers.
//!
//! Each trait is object-safe (boxed futures) so the executor can hold any mix
//! of real clients, stubs, and test doubles behind `Arc<dyn _>`. HTTP
//! implementations live in tripwire-infra.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tripwire_types::error::ActionError;

/// Boxed, sendable future returned by collaborator calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ---------------------------------------------------------------------------
// Messaging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

pub trait MessageSender: Send + Sync {
    /// Deliver a rendered message. The returned value is stored as the action
    /// result.
    fn send<'a>(&'a self, message: &'a OutboundMessage) -> BoxFuture<'a, Result<Value, ActionError>>;
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRequest {
    /// `None` for a broadcast to every subscriber.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    pub title: String,
    pub body: String,
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertReceipt {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

pub trait AlertSender: Send + Sync {
    /// Send an alert to the request's recipient.
    fn send<'a>(&'a self, alert: &'a AlertRequest) -> BoxFuture<'a, Result<AlertReceipt, ActionError>>;

    /// Send an alert to every subscriber. `alert.recipient` is ignored.
    fn broadcast<'a>(
        &'a self,
        alert: &'a AlertRequest,
    ) -> BoxFuture<'a, Result<AlertReceipt, ActionError>>;
}

// ---------------------------------------------------------------------------
// AI completion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// `None` lets the client use its configured default model.
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub use_retrieval: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub text: String,
    pub model: Option<String>,
    /// Retrieval metadata when the provider performed retrieval.
    pub retrieval: Option<Value>,
}

pub trait CompletionClient: Send + Sync {
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> BoxFuture<'a, Result<CompletionResponse, ActionError>>;
}

// ---------------------------------------------------------------------------
// Outbound webhooks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookResponse {
    pub status: u16,
    /// Parsed JSON body, or the raw text as a JSON string.
    pub body: Value,
}

pub trait WebhookClient: Send + Sync {
    /// Perform the request. Non-2xx statuses are errors.
    fn call<'a>(&'a self, request: &'a WebhookRequest) -> BoxFuture<'a, Result<WebhookResponse, ActionError>>;
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// The set of collaborators available to the executor. Any may be absent.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub messages: Option<Arc<dyn MessageSender>>,
    pub alerts: Option<Arc<dyn AlertSender>>,
    pub completions: Option<Arc<dyn CompletionClient>>,
    pub webhooks: Option<Arc<dyn WebhookClient>>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(mut self, sender: Arc<dyn MessageSender>) -> Self {
        self.messages = Some(sender);
        self
    }

    pub fn with_alerts(mut self, sender: Arc<dyn AlertSender>) -> Self {
        self.alerts = Some(sender);
        self
    }

    pub fn with_completions(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.completions = Some(client);
        self
    }

    pub fn with_webhooks(mut self, client: Arc<dyn WebhookClient>) -> Self {
        self.webhooks = Some(client);
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("messages", &self.messages.is_some())
            .field("alerts", &self.alerts.is_some())
            .field("completions", &self.completions.is_some())
            .field("webhooks", &self.webhooks.is_some())
            .finish()
    }
}
