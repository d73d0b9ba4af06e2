//! REST-backed [`LedgerClient`] for a Meridian node.
//!
//! Endpoints used:
//! - `GET  {base}/accounts/{address}` for account state (404 = not found)
//! - `POST {base}/transactions` with `{"envelope": "<base64>"}` to submit
//! - `GET  {base}/ledgers/latest` for health checks
//!
//! A 4xx from `/transactions` is a terminal rejection; connection failures,
//! timeouts and 5xx responses are transport errors the caller may retry.

use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::envelope::{self, SponsorKey};
use crate::ledger::{LedgerAccount, LedgerClient, LedgerError, ParsedEnvelope, SubmitReceipt};

/// Per-request timeout. The verification and settlement paths apply their
/// own configured upper bound on top of this.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct MeridianLedgerClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    envelope: &'a str,
}

#[derive(Deserialize)]
struct RejectionBody {
    reason: Option<String>,
}

#[derive(Deserialize)]
struct LatestLedger {
    height: u64,
}

impl MeridianLedgerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Check node connectivity by fetching the latest ledger height.
    pub async fn latest_ledger(&self) -> Result<u64, LedgerError> {
        let resp = self
            .http
            .get(format!("{}/ledgers/latest", self.base_url))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(format!("health check failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(LedgerError::Transport(format!(
                "node returned {}",
                resp.status()
            )));
        }
        resp.json::<LatestLedger>()
            .await
            .map(|l| l.height)
            .map_err(|e| LedgerError::Transport(format!("unreadable ledger response: {e}")))
    }
}

impl LedgerClient for MeridianLedgerClient {
    fn parse_envelope(&self, raw: &[u8]) -> Result<ParsedEnvelope, LedgerError> {
        let env = envelope::parse(raw).map_err(|e| LedgerError::Malformed(e.to_string()))?;
        Ok(ParsedEnvelope {
            identity: envelope::identity(raw),
            source: env.source,
            destination: env.destination,
            amount: env.amount,
            asset: env.asset,
        })
    }

    fn build_sponsored_wrapper(
        &self,
        inner: &[u8],
        sponsor: &SponsorKey,
        max_fee: &str,
    ) -> Result<Vec<u8>, LedgerError> {
        envelope::build_fee_bump(inner, sponsor, max_fee)
            .map_err(|e| LedgerError::Malformed(e.to_string()))
    }

    async fn submit(&self, raw: &[u8]) -> Result<SubmitReceipt, LedgerError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
        let resp = self
            .http
            .post(format!("{}/transactions", self.base_url))
            .timeout(REQUEST_TIMEOUT)
            .json(&SubmitRequest { envelope: &encoded })
            .send()
            .await
            .map_err(|e| LedgerError::Transport(format!("submit failed: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            resp.json::<SubmitReceipt>()
                .await
                .map_err(|e| LedgerError::Transport(format!("unreadable submit response: {e}")))
        } else if status.is_client_error() {
            let reason = resp
                .json::<RejectionBody>()
                .await
                .ok()
                .and_then(|b| b.reason)
                .unwrap_or_else(|| format!("http {status}"));
            Err(LedgerError::Rejected(reason))
        } else {
            Err(LedgerError::Transport(format!("node returned {status}")))
        }
    }

    async fn get_account(&self, address: &str) -> Result<LedgerAccount, LedgerError> {
        let resp = self
            .http
            .get(format!("{}/accounts/{}", self.base_url, address))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(format!("account fetch failed: {e}")))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(LedgerError::NotFound);
        }
        if !resp.status().is_success() {
            return Err(LedgerError::Transport(format!(
                "node returned {}",
                resp.status()
            )));
        }
        resp.json::<LedgerAccount>()
            .await
            .map_err(|e| LedgerError::Transport(format!("unreadable account response: {e}")))
    }
}
