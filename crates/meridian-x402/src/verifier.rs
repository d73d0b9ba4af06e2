//! Field-level payment verification against declared requirements.

use std::sync::Arc;

use base64::Engine;
use num_bigint::BigUint;
use tokio::time::timeout;

use crate::constants::{NetworkConfig, NATIVE_ASSET};
use crate::ledger::{LedgerClient, LedgerError, ParsedEnvelope};
use crate::payment::{PaymentPayload, PaymentRequirements};
use crate::response::{ErrorReason, VerifyResponse};

/// Verifies payment payloads against a resource server's requirements.
///
/// Read-only: performs ledger lookups but no mutations, so callers may run
/// any number of verifications concurrently. `verify` never errors outward;
/// every failure, including ledger outages, becomes a verdict.
pub struct PaymentVerifier<L> {
    ledger: Arc<L>,
    config: NetworkConfig,
}

impl<L: LedgerClient> PaymentVerifier<L> {
    pub fn new(ledger: Arc<L>, config: NetworkConfig) -> Self {
        Self { ledger, config }
    }

    /// Check a validated payment payload against the requirements.
    ///
    /// Checks run in order and short-circuit on the first failure. When a
    /// signed envelope is present, the values extracted from it are
    /// authoritative: any disagreement with the claimed fields fails, and
    /// every later check uses the extracted values.
    pub async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> VerifyResponse {
        if payload.scheme != requirements.scheme {
            return VerifyResponse::invalid(ErrorReason::InvalidScheme);
        }
        if payload.network != requirements.network {
            return VerifyResponse::invalid(ErrorReason::InvalidNetwork);
        }

        let p = &payload.payload;
        if p.source.is_empty() || p.amount.is_empty() || p.destination.is_empty() {
            return VerifyResponse::invalid(ErrorReason::InvalidMissingFields);
        }

        let extracted: Option<ParsedEnvelope> = match p.transaction.as_deref() {
            Some(encoded) => {
                let raw = match base64::engine::general_purpose::STANDARD.decode(encoded) {
                    Ok(raw) => raw,
                    Err(_) => return VerifyResponse::invalid(ErrorReason::InvalidPayload),
                };
                match self.ledger.parse_envelope(&raw) {
                    Ok(env) => Some(env),
                    Err(_) => return VerifyResponse::invalid(ErrorReason::InvalidPayload),
                }
            }
            None => None,
        };

        // A caller must not assert terms different from what it signed.
        let (source, destination, amount, asset) = match &extracted {
            Some(env) => {
                if env.source != p.source
                    || env.destination != p.destination
                    || env.amount != p.amount
                    || env.asset != p.asset
                {
                    tracing::warn!(
                        payer = %p.source,
                        "claimed fields contradict the signed envelope"
                    );
                    return VerifyResponse::invalid(ErrorReason::InvalidPayload);
                }
                (
                    env.source.as_str(),
                    env.destination.as_str(),
                    env.amount.as_str(),
                    env.asset.as_str(),
                )
            }
            None => (
                p.source.as_str(),
                p.destination.as_str(),
                p.amount.as_str(),
                p.asset.as_str(),
            ),
        };

        if destination != requirements.pay_to {
            return VerifyResponse::invalid(ErrorReason::InvalidDestinationMismatch);
        }

        let offered = match parse_amount(amount) {
            Some(v) => v,
            None => return VerifyResponse::invalid(ErrorReason::InvalidPayload),
        };
        let required = match parse_amount(&requirements.max_amount_required) {
            Some(v) => v,
            None => return VerifyResponse::invalid(ErrorReason::InvalidPayload),
        };
        // Equality passes.
        if offered < required {
            return VerifyResponse::invalid_with_payer(ErrorReason::InvalidAmountMismatch, source);
        }

        if let Some(required_asset) = &requirements.asset {
            if asset != required_asset {
                return VerifyResponse::invalid(ErrorReason::InvalidAssetMismatch);
            }
        }

        let account = match timeout(
            self.config.ledger_timeout,
            self.ledger.get_account(source),
        )
        .await
        {
            Ok(Ok(account)) => account,
            Ok(Err(LedgerError::NotFound)) => {
                return VerifyResponse::invalid(ErrorReason::SourceAccountNotFound);
            }
            Ok(Err(e)) => {
                tracing::error!(payer = %source, error = %e, "account lookup failed");
                return VerifyResponse::invalid(ErrorReason::UnexpectedVerifyError);
            }
            Err(_) => {
                tracing::error!(payer = %source, "account lookup timed out");
                return VerifyResponse::invalid(ErrorReason::UnexpectedVerifyError);
            }
        };

        if asset == NATIVE_ASSET {
            let balance = match account.atomic_balance(NATIVE_ASSET, self.config.native_decimals) {
                Some(balance) => balance,
                None => {
                    tracing::error!(payer = %source, "account reported no usable native balance");
                    return VerifyResponse::invalid(ErrorReason::UnexpectedVerifyError);
                }
            };
            if balance < offered {
                return VerifyResponse::invalid_with_payer(ErrorReason::InsufficientFunds, source);
            }
        }

        tracing::info!(payer = %source, amount = %amount, "payment verification succeeded");
        VerifyResponse::valid(source)
    }
}

/// Parse an atomic-unit amount string as an unbounded non-negative integer.
fn parse_amount(s: &str) -> Option<BigUint> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    BigUint::parse_bytes(s.as_bytes(), 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_amount_accepts_large_integers() {
        let huge = "340282366920938463463374607431768211456123";
        assert!(parse_amount(huge).is_some());
    }

    #[test]
    fn parse_amount_rejects_signs_and_decimals() {
        assert!(parse_amount("-5").is_none());
        assert!(parse_amount("+5").is_none());
        assert!(parse_amount("1.5").is_none());
        assert!(parse_amount("").is_none());
    }
}
