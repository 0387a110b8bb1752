//! Dialect webhook receiver.
//!
//! Non-strict mode always answers `200 OK` so the provider does not retry;
//! failures are logged. Strict mode answers `401` for signature problems and
//! `500` for unparseable payloads.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::http::error::AppError;
use crate::state::AppState;

/// POST /webhooks/dialect and /api/v1/webhooks/dialect
pub async fn receive_dialect(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match state.ingestor.receive(&body, &headers, &*state.dispatcher).await {
        Ok(delivery) => {
            tracing::debug!(
                queued = delivery.queued,
                inline = delivery.inline,
                "webhook delivery accepted"
            );
            (StatusCode::OK, "OK").into_response()
        }
        Err(e) if state.ingestor.settings().strict => {
            if e.is_auth() {
                AppError::Unauthorized(e.to_string()).into_response()
            } else {
                AppError::Internal(e.to_string()).into_response()
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "webhook delivery failed, acknowledging anyway");
            (StatusCode::OK, "OK").into_response()
        }
    }
}
