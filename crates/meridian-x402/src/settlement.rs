//! Idempotent, replay-safe settlement coordination.

use std::sync::Arc;

use base64::Engine;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::constants::NetworkConfig;
use crate::envelope::SponsorKey;
use crate::ledger::{LedgerClient, LedgerError};
use crate::payment::{PaymentPayload, PaymentRequirements};
use crate::replay::{ReplayStore, SettlementRecord};
use crate::response::{ErrorReason, SettleResponse};

/// Fee sponsorship configuration for outbound envelopes.
pub struct SponsorConfig {
    pub key: SponsorKey,
    /// Maximum network fee the sponsor will cover, atomic units.
    pub max_fee: String,
}

/// Orchestrates settlement: replay protection, optional fee sponsorship,
/// at-most-one ledger submission per transaction identity.
///
/// `settle` never errors outward; every failure becomes a structured
/// [`SettleResponse`]. Terminal outcomes (success or ledger rejection) are
/// persisted in the replay store; transient infrastructure failures are not,
/// so callers may retry them.
pub struct SettlementCoordinator<L> {
    ledger: Arc<L>,
    store: Arc<ReplayStore>,
    sponsor: Option<SponsorConfig>,
    config: NetworkConfig,
    /// Per-identity reservation. Same-identity callers serialize here while
    /// distinct identities proceed fully in parallel; the DashMap entry API
    /// makes the check-and-reserve atomic.
    identity_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<L: LedgerClient> SettlementCoordinator<L> {
    pub fn new(ledger: Arc<L>, store: Arc<ReplayStore>, config: NetworkConfig) -> Self {
        Self {
            ledger,
            store,
            sponsor: None,
            config,
            identity_locks: DashMap::new(),
        }
    }

    /// Enable fee sponsorship: outbound envelopes are wrapped so the sponsor
    /// pays the network fee.
    pub fn with_sponsor(mut self, sponsor: SponsorConfig) -> Self {
        self.sponsor = Some(sponsor);
        self
    }

    fn identity_lock(&self, identity: &str) -> Arc<Mutex<()>> {
        self.identity_locks
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Submit a verified payment to the ledger exactly once.
    pub async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> SettleResponse {
        // The identity comes from the signed envelope, never from claimed
        // fields: without an envelope there is nothing to settle.
        let raw = match payload.payload.transaction.as_deref() {
            Some(encoded) => match base64::engine::general_purpose::STANDARD.decode(encoded) {
                Ok(raw) => raw,
                Err(_) => return self.failure(ErrorReason::InvalidPayload),
            },
            None => return self.failure(ErrorReason::InvalidPayload),
        };
        let parsed = match self.ledger.parse_envelope(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable envelope submitted for settlement");
                return self.failure(ErrorReason::InvalidPayload);
            }
        };
        let identity = parsed.identity.clone();

        let lock = self.identity_lock(&identity);
        let _guard = lock.lock().await;

        // Replay check, under the reservation.
        if let Some(existing) = self.store.get(&identity).await {
            if existing.resource == requirements.resource {
                tracing::info!(tx = %identity, "replayed settlement request, returning stored result");
                return existing.result;
            }
            tracing::warn!(
                tx = %identity,
                bound_resource = %existing.resource,
                requested_resource = %requirements.resource,
                "transaction already used for a different resource"
            );
            return self.failure_with_payer(ErrorReason::TransactionAlreadyUsed, &parsed.source);
        }

        let outbound = match &self.sponsor {
            Some(sponsor) => {
                match self
                    .ledger
                    .build_sponsored_wrapper(&raw, &sponsor.key, &sponsor.max_fee)
                {
                    Ok(wrapped) => wrapped,
                    Err(e) => {
                        tracing::error!(tx = %identity, error = %e, "failed to build fee-sponsoring wrapper");
                        return self
                            .failure_with_payer(ErrorReason::UnexpectedSettleError, &parsed.source);
                    }
                }
            }
            None => raw,
        };

        let receipt = match timeout(self.submit_limit(requirements), self.ledger.submit(&outbound))
            .await
        {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(LedgerError::Rejected(reason))) => {
                tracing::warn!(tx = %identity, reason = %reason, "ledger rejected transaction");
                let result =
                    self.failure_with_payer(ErrorReason::TransactionRejected, &parsed.source);
                // Terminal rejection: cache it so replays do not resubmit.
                self.record(&identity, requirements, result.clone()).await;
                return result;
            }
            Ok(Err(e)) => {
                // Transient: not cached, the caller may legitimately retry.
                tracing::error!(tx = %identity, error = %e, "settlement submission failed");
                return self.failure_with_payer(ErrorReason::UnexpectedSettleError, &parsed.source);
            }
            Err(_) => {
                tracing::error!(tx = %identity, "settlement submission timed out");
                return self.failure_with_payer(ErrorReason::UnexpectedSettleError, &parsed.source);
            }
        };

        let result = SettleResponse {
            success: true,
            error_reason: None,
            payer: Some(parsed.source.clone()),
            transaction: Some(identity.clone()),
            network: self.config.network.clone(),
        };
        self.record(&identity, requirements, result.clone()).await;
        tracing::info!(
            payer = %parsed.source,
            tx = %identity,
            ledger = receipt.ledger,
            "payment settled"
        );
        result
    }

    /// Submission timeout: the configured ledger bound, tightened by the
    /// resource server's maxTimeoutSeconds when that is stricter.
    fn submit_limit(&self, requirements: &PaymentRequirements) -> std::time::Duration {
        let mut limit = self.config.ledger_timeout;
        if requirements.max_timeout_seconds > 0 {
            limit = limit.min(std::time::Duration::from_secs(
                requirements.max_timeout_seconds,
            ));
        }
        limit
    }

    async fn record(
        &self,
        identity: &str,
        requirements: &PaymentRequirements,
        result: SettleResponse,
    ) {
        self.store
            .put(SettlementRecord {
                transaction: identity.to_string(),
                resource: requirements.resource.clone(),
                settled_at: Utc::now(),
                result,
            })
            .await;
    }

    fn failure(&self, reason: ErrorReason) -> SettleResponse {
        SettleResponse::failure(reason, self.config.network.clone())
    }

    fn failure_with_payer(&self, reason: ErrorReason, payer: &str) -> SettleResponse {
        SettleResponse::failure_with_payer(reason, payer, self.config.network.clone())
    }
}
