//! Meridian transaction envelopes.
//!
//! An envelope is canonical JSON signed with the source account's ed25519
//! key and carried base64-encoded. The signature covers the serialization
//! with the `signature` field cleared. Signature *verification* is the
//! ledger's job, not the facilitator's; this module only needs to read
//! envelopes and to produce signed fee-bump wrappers.
//!
//! The envelope identity (replay/idempotency key) is the hex SHA-256 of the
//! raw envelope bytes, so any byte change yields a different identity.

use base64::Engine;
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::X402Error;
use crate::security::{hex_decode, hex_encode};

/// A single-payment transaction envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEnvelope {
    pub source: String,
    pub destination: String,
    /// Amount in atomic units.
    pub amount: String,
    pub asset: String,
    /// Source account sequence number.
    pub sequence: u64,
    /// Last ledger height at which this envelope may be applied.
    pub max_ledger: u64,
    /// Network fee the source account is willing to pay, atomic units.
    pub fee: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// A fee-bump wrapper: a sponsor takes over the network fee for an inner
/// envelope without altering the inner bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBumpEnvelope {
    /// Account paying the network fee.
    pub fee_source: String,
    /// Maximum fee the sponsor will pay, atomic units.
    pub max_fee: String,
    /// The wrapped envelope bytes, base64, byte-for-byte as received.
    pub inner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Sponsor identity: account address plus its ed25519 signing key.
///
/// The key is loaded once at startup and never leaves this type; the
/// settlement coordinator only decides whether a sponsor is configured.
pub struct SponsorKey {
    pub address: String,
    key: SigningKey,
}

impl SponsorKey {
    /// Build a sponsor identity from a 32-byte hex-encoded seed.
    pub fn from_hex(address: impl Into<String>, seed_hex: &str) -> Result<Self, X402Error> {
        let bytes = hex_decode(seed_hex.trim())
            .ok_or_else(|| X402Error::ConfigError("sponsor seed is not valid hex".to_string()))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| X402Error::ConfigError("sponsor seed must be 32 bytes".to_string()))?;
        Ok(Self {
            address: address.into(),
            key: SigningKey::from_bytes(&seed),
        })
    }

    fn sign(&self, message: &[u8]) -> String {
        let sig = self.key.sign(message);
        base64::engine::general_purpose::STANDARD.encode(sig.to_bytes())
    }
}

impl std::fmt::Debug for SponsorKey {
    // never print the key
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SponsorKey")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Canonical identity of an envelope: hex SHA-256 of the raw bytes.
pub fn identity(raw: &[u8]) -> String {
    hex_encode(Sha256::digest(raw))
}

/// Parse raw envelope bytes into a [`PaymentEnvelope`].
pub fn parse(raw: &[u8]) -> Result<PaymentEnvelope, X402Error> {
    serde_json::from_slice(raw)
        .map_err(|e| X402Error::InvalidEnvelope(format!("undecodable envelope: {e}")))
}

/// Wrap `inner` (raw envelope bytes, exactly as received) in a fee-bump
/// envelope signed by `sponsor`. The inner bytes are embedded unmodified, so
/// the inner envelope's identity and signature stay intact.
pub fn build_fee_bump(
    inner: &[u8],
    sponsor: &SponsorKey,
    max_fee: &str,
) -> Result<Vec<u8>, X402Error> {
    let mut wrapper = FeeBumpEnvelope {
        fee_source: sponsor.address.clone(),
        max_fee: max_fee.to_string(),
        inner: base64::engine::general_purpose::STANDARD.encode(inner),
        signature: None,
    };
    let unsigned = serde_json::to_vec(&wrapper)?;
    wrapper.signature = Some(sponsor.sign(&unsigned));
    Ok(serde_json::to_vec(&wrapper)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    const SEED_HEX: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";

    fn sample_envelope_bytes() -> Vec<u8> {
        serde_json::to_vec(&PaymentEnvelope {
            source: "MSOURCE".to_string(),
            destination: "MDEST".to_string(),
            amount: "1000000".to_string(),
            asset: "native".to_string(),
            sequence: 42,
            max_ledger: 9000,
            fee: "100".to_string(),
            signature: Some("c2lnbmF0dXJl".to_string()),
        })
        .unwrap()
    }

    #[test]
    fn parse_roundtrip() {
        let raw = sample_envelope_bytes();
        let env = parse(&raw).unwrap();
        assert_eq!(env.source, "MSOURCE");
        assert_eq!(env.amount, "1000000");
        assert_eq!(env.sequence, 42);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse(b"definitely not an envelope").is_err());
    }

    #[test]
    fn identity_is_deterministic_and_byte_sensitive() {
        let raw = sample_envelope_bytes();
        assert_eq!(identity(&raw), identity(&raw));

        let mut tampered = raw.clone();
        tampered[0] ^= 0x01;
        assert_ne!(identity(&raw), identity(&tampered));
    }

    #[test]
    fn fee_bump_preserves_inner_bytes_exactly() {
        let sponsor = SponsorKey::from_hex("MSPONSOR", SEED_HEX).unwrap();
        let raw = sample_envelope_bytes();

        let wrapped = build_fee_bump(&raw, &sponsor, "500").unwrap();
        let wrapper: FeeBumpEnvelope = serde_json::from_slice(&wrapped).unwrap();

        assert_eq!(wrapper.fee_source, "MSPONSOR");
        assert_eq!(wrapper.max_fee, "500");
        assert!(wrapper.signature.is_some());

        let inner = base64::engine::general_purpose::STANDARD
            .decode(&wrapper.inner)
            .unwrap();
        assert_eq!(inner, raw, "inner envelope bytes must be untouched");
        assert_eq!(identity(&inner), identity(&raw));
    }

    #[test]
    fn sponsor_key_rejects_bad_seed() {
        assert!(SponsorKey::from_hex("MSPONSOR", "not-hex").is_err());
        assert!(SponsorKey::from_hex("MSPONSOR", "abcd").is_err());
    }
}
