//! HTTP layer for Tripwire.
//!
//! Axum router serving the Dialect webhook receiver and the management API
//! at `/api/v1/` with the envelope response format.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
