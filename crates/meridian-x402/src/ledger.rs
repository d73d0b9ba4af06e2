//! The narrow ledger interface the facilitator core consumes.
//!
//! Everything chain-specific sits behind [`LedgerClient`]; the verification
//! and settlement paths never touch envelope bytes or the network directly.

use std::future::Future;

use num_bigint::BigUint;
use serde::Deserialize;
use thiserror::Error;

use crate::envelope::SponsorKey;

/// Ledger-side failures. The terminal/transient split matters: the
/// settlement coordinator caches outcomes only for [`LedgerError::Rejected`].
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The account does not exist on the ledger.
    #[error("account not found")]
    NotFound,

    /// The ledger understood the submission and rejected it. Terminal.
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// The envelope bytes could not be understood.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// Network-level failure (connectivity, timeout, 5xx). Retryable.
    #[error("ledger transport error: {0}")]
    Transport(String),
}

/// Fields extracted from a signed envelope. Authoritative: whenever an
/// envelope is present, verification trusts these over caller-claimed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEnvelope {
    /// Deterministic identity of the envelope (replay/idempotency key).
    pub identity: String,
    pub source: String,
    pub destination: String,
    /// Amount in atomic units.
    pub amount: String,
    pub asset: String,
}

/// One balance entry of a ledger account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Balance {
    pub asset: String,
    /// Balance in display units (decimal string), as reported by the node.
    pub amount: String,
}

/// Ledger account state, as returned by [`LedgerClient::get_account`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LedgerAccount {
    pub id: String,
    pub sequence: u64,
    pub balances: Vec<Balance>,
}

impl LedgerAccount {
    /// Balance of `asset` converted to atomic units.
    ///
    /// Returns `None` if the account holds no such asset or the reported
    /// balance string is malformed.
    pub fn atomic_balance(&self, asset: &str, decimals: u32) -> Option<BigUint> {
        let balance = self.balances.iter().find(|b| b.asset == asset)?;
        to_atomic(&balance.amount, decimals)
    }
}

/// Convert a decimal display-unit string into atomic units without going
/// through floating point. Rejects signs, exponents, and more fraction
/// digits than the asset carries.
pub fn to_atomic(display: &str, decimals: u32) -> Option<BigUint> {
    let (int_part, frac_part) = match display.split_once('.') {
        Some((i, f)) => (i, f),
        None => (display, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if frac_part.len() > decimals as usize {
        return None;
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return None;
    }
    let mut scaled = String::with_capacity(int_part.len() + decimals as usize);
    scaled.push_str(int_part);
    scaled.push_str(frac_part);
    for _ in frac_part.len()..decimals as usize {
        scaled.push('0');
    }
    BigUint::parse_bytes(scaled.as_bytes(), 10)
}

/// Receipt returned by a successful submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitReceipt {
    /// Network-assigned identity of the submitted envelope. Differs from the
    /// inner envelope's identity when a fee-bump wrapper was submitted.
    pub id: String,
    /// Ledger height the transaction was applied at.
    pub ledger: u64,
}

/// The narrow contract the core consumes from the ledger SDK.
///
/// `parse_envelope` and `build_sponsored_wrapper` are pure; `submit` and
/// `get_account` perform network I/O. Callers bound every network call with
/// their own timeout on top of whatever the implementation does.
pub trait LedgerClient: Send + Sync {
    /// Extract the authoritative fields and identity from signed envelope bytes.
    fn parse_envelope(&self, raw: &[u8]) -> Result<ParsedEnvelope, LedgerError>;

    /// Wrap `inner` in a fee-sponsoring envelope signed by `sponsor`.
    /// The inner bytes must be embedded byte-for-byte unmodified.
    fn build_sponsored_wrapper(
        &self,
        inner: &[u8],
        sponsor: &SponsorKey,
        max_fee: &str,
    ) -> Result<Vec<u8>, LedgerError>;

    /// Submit envelope bytes to the network.
    fn submit(&self, raw: &[u8])
        -> impl Future<Output = Result<SubmitReceipt, LedgerError>> + Send;

    /// Fetch account state. A missing account is [`LedgerError::NotFound`],
    /// distinct from transport failures.
    fn get_account(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<LedgerAccount, LedgerError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_atomic_scales_display_units() {
        assert_eq!(to_atomic("1", 7), Some(BigUint::from(10_000_000u64)));
        assert_eq!(to_atomic("103.25", 7), Some(BigUint::from(1_032_500_000u64)));
        assert_eq!(to_atomic("0.0000001", 7), Some(BigUint::from(1u64)));
        assert_eq!(to_atomic(".5", 7), Some(BigUint::from(5_000_000u64)));
    }

    #[test]
    fn to_atomic_rejects_malformed_input() {
        assert_eq!(to_atomic("", 7), None);
        assert_eq!(to_atomic(".", 7), None);
        assert_eq!(to_atomic("-1", 7), None);
        assert_eq!(to_atomic("1e7", 7), None);
        assert_eq!(to_atomic("0.00000001", 7), None, "sub-atomic precision");
    }

    #[test]
    fn to_atomic_handles_values_beyond_u64() {
        let huge = "184467440737095516160.0000001";
        let expected = BigUint::parse_bytes(b"1844674407370955161600000001", 10).unwrap();
        assert_eq!(to_atomic(huge, 7), Some(expected));
    }

    #[test]
    fn atomic_balance_picks_matching_asset() {
        let account = LedgerAccount {
            id: "MSOURCE".to_string(),
            sequence: 1,
            balances: vec![
                Balance {
                    asset: "USD:MISSUER".to_string(),
                    amount: "50".to_string(),
                },
                Balance {
                    asset: "native".to_string(),
                    amount: "2.5".to_string(),
                },
            ],
        };
        assert_eq!(
            account.atomic_balance("native", 7),
            Some(BigUint::from(25_000_000u64))
        );
        assert_eq!(account.atomic_balance("EUR:MISSUER", 7), None);
    }
}
