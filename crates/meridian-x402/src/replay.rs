//! Replay-protection store: a durable mapping from transaction identity to
//! settlement outcome, with a process-local fallback.
//!
//! The primary backend is any shared key-value service exposing get/set with
//! TTL, behind the [`KvBackend`] trait. When the primary is unreachable the
//! store transparently falls back to an in-memory map so the facilitator
//! keeps functioning; the switch is logged and counted but never surfaces as
//! an error to callers. Records in the fallback do not survive a restart,
//! which is the accepted cost of staying available while the primary is down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::REPLAY_TTL_SECS;
use crate::response::SettleResponse;

/// A terminal settlement outcome bound to a transaction identity.
///
/// Write-once: an identity maps to at most one record, ever, and the record
/// pins the resource the payment unlocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRecord {
    /// The transaction identity (replay key).
    pub transaction: String,
    /// The resource this payment was accepted for.
    pub resource: String,
    pub settled_at: DateTime<Utc>,
    pub result: SettleResponse,
}

#[derive(Debug, Error)]
#[error("kv backend error: {0}")]
pub struct KvError(pub String);

/// Key-value backend for settlement records.
///
/// Implementations must be thread-safe. Errors are reported so the
/// [`ReplayStore`] can fall back; they are never shown to API callers.
#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError>;
}

/// Client for an HTTP key-value service: `GET/PUT {base}/kv/{key}`, bearer
/// auth, TTL as a query parameter on writes.
pub struct HttpKvBackend {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

/// Keep KV round-trips short; a slow store should trip the fallback, not
/// stall settlement.
const KV_TIMEOUT: Duration = Duration::from_secs(3);

impl HttpKvBackend {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            token,
        }
    }
}

#[async_trait]
impl KvBackend for HttpKvBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut req = self
            .http
            .get(format!("{}/kv/{key}", self.base_url))
            .timeout(KV_TIMEOUT);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| KvError(format!("get failed: {e}")))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(KvError(format!("get returned {}", resp.status())));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| KvError(format!("unreadable get response: {e}")))?;
        Ok(Some(body))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        let mut req = self
            .http
            .put(format!("{}/kv/{key}", self.base_url))
            .query(&[("ttl", ttl.as_secs())])
            .timeout(KV_TIMEOUT)
            .body(value.to_string());
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| KvError(format!("set failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(KvError(format!("set returned {}", resp.status())));
        }
        Ok(())
    }
}

/// Replay store with a primary KV backend and a process-local fallback.
pub struct ReplayStore {
    primary: Option<Arc<dyn KvBackend>>,
    fallback: DashMap<String, SettlementRecord>,
    ttl: Duration,
    fallback_events: AtomicU64,
}

impl ReplayStore {
    /// Store backed only by process-local memory. Replay protection does not
    /// survive a restart; intended for tests and development.
    pub fn in_memory() -> Self {
        Self {
            primary: None,
            fallback: DashMap::new(),
            ttl: Duration::from_secs(REPLAY_TTL_SECS),
            fallback_events: AtomicU64::new(0),
        }
    }

    /// Store backed by a shared KV service, with in-memory fallback.
    pub fn with_backend(backend: Arc<dyn KvBackend>, ttl: Duration) -> Self {
        Self {
            primary: Some(backend),
            fallback: DashMap::new(),
            ttl,
            fallback_events: AtomicU64::new(0),
        }
    }

    /// Number of times an operation fell back to process-local memory.
    pub fn fallback_events(&self) -> u64 {
        self.fallback_events.load(Ordering::Relaxed)
    }

    /// Look up the settlement record for a transaction identity.
    pub async fn get(&self, id: &str) -> Option<SettlementRecord> {
        if let Some(primary) = &self.primary {
            match primary.get(id).await {
                Ok(Some(json)) => match serde_json::from_str(&json) {
                    Ok(record) => return Some(record),
                    Err(e) => {
                        tracing::error!(tx = %id, error = %e, "stored settlement record is corrupt");
                        return None;
                    }
                },
                // Missing in the primary: still consult the fallback, the
                // record may have been written during an outage window.
                Ok(None) => {}
                Err(e) => self.note_fallback(&e),
            }
        }
        self.fallback.get(id).map(|r| r.clone())
    }

    /// Whether any settlement outcome exists for this identity.
    pub async fn exists(&self, id: &str) -> bool {
        self.get(id).await.is_some()
    }

    /// The resource a settled transaction identity is bound to.
    pub async fn resource_of(&self, id: &str) -> Option<String> {
        self.get(id).await.map(|r| r.resource)
    }

    /// Persist a terminal settlement outcome.
    pub async fn put(&self, record: SettlementRecord) {
        if let Some(primary) = &self.primary {
            match serde_json::to_string(&record) {
                Ok(json) => match primary.set(&record.transaction, &json, self.ttl).await {
                    Ok(()) => return,
                    Err(e) => self.note_fallback(&e),
                },
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize settlement record");
                }
            }
        }
        // Write-once: the first record for an identity wins.
        self.fallback
            .entry(record.transaction.clone())
            .or_insert(record);
    }

    fn note_fallback(&self, err: &KvError) {
        self.fallback_events.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            error = %err,
            "replay KV backend unreachable, falling back to in-memory store"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{ErrorReason, SettleResponse};

    fn record(id: &str, resource: &str) -> SettlementRecord {
        SettlementRecord {
            transaction: id.to_string(),
            resource: resource.to_string(),
            settled_at: Utc::now(),
            result: SettleResponse {
                success: true,
                error_reason: None,
                payer: Some("MSOURCE".to_string()),
                transaction: Some(id.to_string()),
                network: "meridian-testnet".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn in_memory_roundtrip() {
        let store = ReplayStore::in_memory();
        assert!(!store.exists("tx1").await);

        store.put(record("tx1", "/weather")).await;
        assert!(store.exists("tx1").await);
        assert_eq!(store.resource_of("tx1").await.as_deref(), Some("/weather"));
        assert_eq!(store.get("tx1").await.unwrap().transaction, "tx1");
    }

    #[tokio::test]
    async fn in_memory_put_is_write_once() {
        let store = ReplayStore::in_memory();
        store.put(record("tx1", "/weather")).await;
        store.put(record("tx1", "/other")).await;
        assert_eq!(store.resource_of("tx1").await.as_deref(), Some("/weather"));
    }

    #[tokio::test]
    async fn unreachable_primary_falls_back_without_error() {
        let backend = Arc::new(HttpKvBackend::new("http://localhost:1", None));
        let store = ReplayStore::with_backend(backend, Duration::from_secs(60));

        store.put(record("tx1", "/weather")).await;
        assert!(store.exists("tx1").await);
        assert_eq!(store.resource_of("tx1").await.as_deref(), Some("/weather"));
        assert!(store.fallback_events() > 0, "fallback must be observable");
    }

    #[tokio::test]
    async fn failure_records_roundtrip() {
        let store = ReplayStore::in_memory();
        let mut rec = record("tx2", "/paid");
        rec.result = SettleResponse::failure_with_payer(
            ErrorReason::TransactionRejected,
            "MSOURCE",
            "meridian-testnet",
        );
        store.put(rec.clone()).await;
        assert_eq!(store.get("tx2").await.unwrap(), rec);
    }
}
