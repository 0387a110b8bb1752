//! Dialect webhook ingestion: signature check, parsing, normalization.

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use tripwire_core::automation::dispatcher::{Delivery, Dispatcher};
use tripwire_core::ingest::normalize::{extract_events, normalize};
use tripwire_core::repository::agent::AgentRepository;
use tripwire_core::repository::execution::ExecutionRepository;
use tripwire_types::config::{SignatureEncoding, WebhookConfig};
use tripwire_types::event::NormalizedEvent;

use super::signature::{SignatureError, verify_signature};

/// Resolved ingress settings: the file/env config plus the shared secret.
#[derive(Debug, Clone)]
pub struct IngestorSettings {
    pub secret: Option<SecretString>,
    pub signature_header: String,
    pub encoding: SignatureEncoding,
    pub strict: bool,
}

impl IngestorSettings {
    pub fn from_config(config: &WebhookConfig, secret: Option<SecretString>) -> Self {
        Self {
            secret,
            signature_header: config.signature_header.to_lowercase(),
            encoding: config.signature_encoding,
            strict: config.strict,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("missing signature header '{0}'")]
    MissingSignature(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl IngestError {
    /// Authentication failures, as opposed to payload problems.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            IngestError::MissingSignature(_) | IngestError::InvalidSignature(_)
        )
    }
}

pub struct EventIngestor {
    settings: IngestorSettings,
}

impl EventIngestor {
    pub fn new(settings: IngestorSettings) -> Self {
        if settings.secret.is_none() {
            tracing::warn!("no webhook secret configured, signatures will not be checked");
        }
        Self { settings }
    }

    pub fn settings(&self) -> &IngestorSettings {
        &self.settings
    }

    /// Verify, parse and normalize a raw webhook body.
    ///
    /// In strict mode any signature or payload problem is an error. Otherwise
    /// signature problems are logged and processing continues, and an
    /// unparseable payload yields no events.
    pub fn ingest(
        &self,
        body: &[u8],
        headers: &HeaderMap,
        received_at: DateTime<Utc>,
    ) -> Result<Vec<NormalizedEvent>, IngestError> {
        if let Err(e) = self.verify(body, headers) {
            if self.settings.strict {
                tracing::warn!(error = %e, "rejecting webhook delivery");
                return Err(e);
            }
            tracing::warn!(error = %e, "webhook signature check failed, continuing (non-strict)");
        }

        let events = match parse(body) {
            Ok(raw_events) => raw_events,
            Err(e) if self.settings.strict => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, bytes = body.len(), "ignoring malformed webhook payload");
                return Ok(Vec::new());
            }
        };

        let events: Vec<NormalizedEvent> = events
            .iter()
            .map(|raw| normalize(raw, received_at))
            .collect();

        tracing::info!(count = events.len(), "ingested webhook events");
        Ok(events)
    }

    /// Ingest a body and hand the events to the dispatcher.
    pub async fn receive<A, E>(
        &self,
        body: &[u8],
        headers: &HeaderMap,
        dispatcher: &Dispatcher<A, E>,
    ) -> Result<Delivery, IngestError>
    where
        A: AgentRepository + 'static,
        E: ExecutionRepository + 'static,
    {
        let events = self.ingest(body, headers, Utc::now())?;
        if events.is_empty() {
            return Ok(Delivery::default());
        }
        Ok(dispatcher.deliver(events).await)
    }

    fn verify(&self, body: &[u8], headers: &HeaderMap) -> Result<(), IngestError> {
        let Some(secret) = &self.settings.secret else {
            return Ok(());
        };

        let provided = headers
            .get(self.settings.signature_header.as_str())
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| IngestError::MissingSignature(self.settings.signature_header.clone()))?;

        verify_signature(
            secret.expose_secret().as_bytes(),
            body,
            provided,
            self.settings.encoding,
        )?;
        Ok(())
    }
}

fn parse(body: &[u8]) -> Result<Vec<serde_json::Map<String, Value>>, IngestError> {
    let payload: Value =
        serde_json::from_slice(body).map_err(|e| IngestError::Malformed(e.to_string()))?;
    extract_events(&payload).map_err(|e| IngestError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::signature::compute_signature;
    use reqwest::header::HeaderValue;

    const BODY: &[u8] = br#"{"events":[{"id":"e1","type":"token_price_change","parsedData":{"token":{"symbol":"SOL"}}},{"id":"e2","type":"liquidation_warning"}]}"#;

    fn settings(secret: Option<&str>, strict: bool) -> IngestorSettings {
        IngestorSettings {
            secret: secret.map(|s| SecretString::from(s.to_string())),
            signature_header: "x-dialect-signature".to_string(),
            encoding: SignatureEncoding::Hex,
            strict,
        }
    }

    fn signed(secret: &str, body: &[u8]) -> HeaderMap {
        let sig = compute_signature(secret.as_bytes(), body, SignatureEncoding::Hex).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-dialect-signature", HeaderValue::from_str(&sig).unwrap());
        headers
    }

    #[test]
    fn unsigned_mode_accepts_everything() {
        let ingestor = EventIngestor::new(settings(None, true));
        let events = ingestor.ingest(BODY, &HeaderMap::new(), Utc::now()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, "e1");
        assert_eq!(events[1].event_type, "liquidation_warning");
    }

    #[test]
    fn strict_accepts_exact_signature() {
        let ingestor = EventIngestor::new(settings(Some("s3cret"), true));
        let events = ingestor.ingest(BODY, &signed("s3cret", BODY), Utc::now()).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn strict_rejects_wrong_secret_and_missing_header() {
        let ingestor = EventIngestor::new(settings(Some("s3cret"), true));

        let err = ingestor.ingest(BODY, &signed("other", BODY), Utc::now()).unwrap_err();
        assert!(err.is_auth());

        let err = ingestor.ingest(BODY, &HeaderMap::new(), Utc::now()).unwrap_err();
        assert!(matches!(err, IngestError::MissingSignature(_)));
    }

    #[test]
    fn lenient_mode_processes_despite_bad_signature() {
        let ingestor = EventIngestor::new(settings(Some("s3cret"), false));
        let events = ingestor.ingest(BODY, &signed("other", BODY), Utc::now()).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn malformed_json_depends_on_mode() {
        let lenient = EventIngestor::new(settings(None, false));
        assert!(lenient.ingest(b"{not json", &HeaderMap::new(), Utc::now()).unwrap().is_empty());

        let strict = EventIngestor::new(settings(None, true));
        let err = strict.ingest(b"{not json", &HeaderMap::new(), Utc::now()).unwrap_err();
        assert!(!err.is_auth());
    }

    #[test]
    fn signature_covers_raw_bytes() {
        // Same JSON, different whitespace: the signature is over the bytes.
        let ingestor = EventIngestor::new(settings(Some("s3cret"), true));
        let compact = br#"{"type":"x"}"#;
        let spaced = br#"{ "type": "x" }"#;
        assert!(ingestor.ingest(spaced, &signed("s3cret", compact), Utc::now()).is_err());
    }
}
