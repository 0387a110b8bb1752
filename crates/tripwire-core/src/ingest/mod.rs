//! Webhook payload unpacking and normalization.
//!
//! Signature verification lives in tripwire-infra next to the HTTP ingress;
//! this module only knows about JSON shapes.

pub mod normalize;
