#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use x402::envelope::{self, PaymentEnvelope, SponsorKey};
use x402::{
    Balance, LedgerAccount, LedgerClient, LedgerError, MeridianPaymentData, NetworkConfig,
    ParsedEnvelope, PaymentPayload, PaymentRequirements, SubmitReceipt,
};

/// 32-byte ed25519 seed (RFC 8032 test vector), hex-encoded.
pub const SPONSOR_SEED_HEX: &str =
    "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";

/// In-process ledger double. Parses real Meridian envelopes, records every
/// successful submission, and serves scripted accounts and failures.
pub struct MockLedger {
    accounts: Mutex<HashMap<String, LedgerAccount>>,
    submissions: Mutex<Vec<Vec<u8>>>,
    submit_failures: Mutex<VecDeque<LedgerError>>,
    account_failure: Mutex<Option<LedgerError>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            submissions: Mutex::new(Vec::new()),
            submit_failures: Mutex::new(VecDeque::new()),
            account_failure: Mutex::new(None),
        }
    }

    /// Register an account holding `display_balance` of the native asset.
    pub fn with_native_account(self, address: &str, display_balance: &str) -> Self {
        self.add_account(
            address,
            vec![Balance {
                asset: "native".to_string(),
                amount: display_balance.to_string(),
            }],
        );
        self
    }

    pub fn add_account(&self, address: &str, balances: Vec<Balance>) {
        self.accounts.lock().unwrap().insert(
            address.to_string(),
            LedgerAccount {
                id: address.to_string(),
                sequence: 42,
                balances,
            },
        );
    }

    /// Queue a failure for the next submission attempt.
    pub fn queue_submit_failure(&self, err: LedgerError) {
        self.submit_failures.lock().unwrap().push_back(err);
    }

    /// Fail the next account lookup with `err`.
    pub fn fail_next_account_lookup(&self, err: LedgerError) {
        *self.account_failure.lock().unwrap() = Some(err);
    }

    pub fn submissions(&self) -> Vec<Vec<u8>> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

impl LedgerClient for MockLedger {
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
        if let Some(err) = self.submit_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.submissions.lock().unwrap().push(raw.to_vec());
        Ok(SubmitReceipt {
            id: envelope::identity(raw),
            ledger: 1234,
        })
    }

    async fn get_account(&self, address: &str) -> Result<LedgerAccount, LedgerError> {
        if let Some(err) = self.account_failure.lock().unwrap().take() {
            return Err(err);
        }
        self.accounts
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .ok_or(LedgerError::NotFound)
    }
}

pub fn test_config() -> NetworkConfig {
    NetworkConfig {
        ledger_timeout: Duration::from_secs(2),
        ..NetworkConfig::default()
    }
}

/// Build raw signed-envelope bytes for a payment.
pub fn make_envelope(source: &str, destination: &str, amount: &str, asset: &str) -> Vec<u8> {
    serde_json::to_vec(&PaymentEnvelope {
        source: source.to_string(),
        destination: destination.to_string(),
        amount: amount.to_string(),
        asset: asset.to_string(),
        sequence: 42,
        max_ledger: 9000,
        fee: "100".to_string(),
        signature: Some("c2lnbmF0dXJl".to_string()),
    })
    .unwrap()
}

/// Build a payment payload whose claimed fields are supplied explicitly, so
/// tests can make them agree with or contradict the envelope.
pub fn make_payload(
    envelope_raw: Option<&[u8]>,
    source: &str,
    amount: &str,
    destination: &str,
    asset: &str,
) -> PaymentPayload {
    use base64::Engine;
    PaymentPayload {
        x402_version: 1,
        scheme: "exact".to_string(),
        network: "meridian-testnet".to_string(),
        payload: MeridianPaymentData {
            transaction: envelope_raw
                .map(|raw| base64::engine::general_purpose::STANDARD.encode(raw)),
            source: source.to_string(),
            amount: amount.to_string(),
            destination: destination.to_string(),
            asset: asset.to_string(),
            expiry_ledger: 9000,
            nonce: 42,
        },
    }
}

/// A payload whose claimed fields match the envelope exactly.
pub fn matching_payload(envelope_raw: &[u8]) -> PaymentPayload {
    let env = envelope::parse(envelope_raw).unwrap();
    make_payload(
        Some(envelope_raw),
        &env.source,
        &env.amount,
        &env.destination,
        &env.asset,
    )
}

pub fn make_requirements(amount: &str, pay_to: &str, resource: &str) -> PaymentRequirements {
    PaymentRequirements {
        scheme: "exact".to_string(),
        network: "meridian-testnet".to_string(),
        max_amount_required: amount.to_string(),
        resource: resource.to_string(),
        description: "premium weather data".to_string(),
        mime_type: "application/json".to_string(),
        pay_to: pay_to.to_string(),
        max_timeout_seconds: 30,
        asset: Some("native".to_string()),
        output_schema: None,
        extra: None,
    }
}
