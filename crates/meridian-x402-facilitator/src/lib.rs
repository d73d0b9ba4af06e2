//! x402 facilitator: verifies payment assertions and settles them on the
//! Meridian ledger.
//!
//! The facilitator receives HMAC-authenticated requests from resource
//! servers, verifies payment payloads against the declared requirements, and
//! submits signed envelopes to the ledger exactly once per transaction
//! identity. Verification, settlement, and replay protection live in the
//! core [`x402`] crate; this crate provides the HTTP server, state
//! management, metrics, and webhook notifications.
//!
//! # Modules
//!
//! - [`routes`]: HTTP endpoints (health, supported, verify, settle, metrics)
//! - [`state`]: shared [`AppState`](state::AppState)
//! - [`webhook`]: webhook notifications on successful settlement
//! - [`metrics`]: Prometheus metrics for verify/settle operations

pub mod metrics;
pub mod routes;
pub mod state;
pub mod webhook;
