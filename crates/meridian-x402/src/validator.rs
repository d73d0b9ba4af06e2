//! Inbound request validation: transport decoding and structural checks.
//!
//! Pure functions, no I/O. Field-level verification against payment
//! requirements happens later in [`crate::verifier`]; this module only
//! establishes that the assertion is well-formed and addressed to a
//! supported (scheme, network) combination.

use base64::Engine;
use serde_json::Value;

use crate::constants::NetworkConfig;
use crate::payment::PaymentPayload;
use crate::response::ErrorReason;

/// Protocol version this facilitator speaks.
pub const X402_VERSION: u32 = 1;

/// Decode an inbound payment assertion from its wire form.
///
/// `header` is the base64-encoded payload; `decoded` is the already-decoded
/// JSON object. Exactly one is expected; when both are present the encoded
/// form wins.
pub fn decode_request(
    x402_version: u32,
    header: Option<&str>,
    decoded: Option<&Value>,
    config: &NetworkConfig,
) -> Result<PaymentPayload, ErrorReason> {
    if x402_version != X402_VERSION {
        return Err(ErrorReason::InvalidX402Version);
    }
    match (header, decoded) {
        (Some(h), _) => decode_header(h, config),
        (None, Some(v)) => decode_value(v.clone(), config),
        (None, None) => Err(ErrorReason::InvalidPayload),
    }
}

/// Decode a base64-encoded payment payload (the X-PAYMENT header form).
pub fn decode_header(header: &str, config: &NetworkConfig) -> Result<PaymentPayload, ErrorReason> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(header.trim())
        .map_err(|_| ErrorReason::InvalidPayload)?;
    let value: Value = serde_json::from_slice(&bytes).map_err(|_| ErrorReason::InvalidPayload)?;
    decode_value(value, config)
}

/// Structurally validate a decoded payment payload.
pub fn decode_value(value: Value, config: &NetworkConfig) -> Result<PaymentPayload, ErrorReason> {
    let obj = value.as_object().ok_or(ErrorReason::InvalidPayload)?;

    match obj.get("x402Version").and_then(Value::as_u64) {
        Some(v) if v == u64::from(X402_VERSION) => {}
        _ => return Err(ErrorReason::InvalidX402Version),
    }

    let scheme = obj
        .get("scheme")
        .and_then(Value::as_str)
        .ok_or(ErrorReason::InvalidScheme)?;
    if scheme != config.scheme_name {
        return Err(ErrorReason::InvalidScheme);
    }

    let network = obj
        .get("network")
        .and_then(Value::as_str)
        .ok_or(ErrorReason::InvalidNetwork)?;
    if !config.supports(scheme, network) {
        return Err(ErrorReason::InvalidNetwork);
    }

    if !obj.get("payload").map(Value::is_object).unwrap_or(false) {
        return Err(ErrorReason::InvalidPayload);
    }

    serde_json::from_value(value).map_err(|_| ErrorReason::InvalidPayload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "x402Version": 1,
            "scheme": "exact",
            "network": "meridian-testnet",
            "payload": {
                "source": "MSOURCE",
                "amount": "1000000",
                "destination": "MDEST",
                "asset": "native",
                "expiryLedger": 900,
                "nonce": 7
            }
        })
    }

    #[test]
    fn decodes_well_formed_payload() {
        let payload = decode_value(sample(), &NetworkConfig::default()).unwrap();
        assert_eq!(payload.scheme, "exact");
        assert_eq!(payload.payload.source, "MSOURCE");
        assert_eq!(payload.payload.nonce, 7);
    }

    #[test]
    fn decodes_base64_header_form() {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(serde_json::to_vec(&sample()).unwrap());
        let payload = decode_header(&encoded, &NetworkConfig::default()).unwrap();
        assert_eq!(payload.payload.amount, "1000000");
    }

    #[test]
    fn rejects_wrong_version() {
        let mut v = sample();
        v["x402Version"] = json!(2);
        assert_eq!(
            decode_value(v, &NetworkConfig::default()),
            Err(ErrorReason::InvalidX402Version)
        );
    }

    #[test]
    fn rejects_missing_version() {
        let mut v = sample();
        v.as_object_mut().unwrap().remove("x402Version");
        assert_eq!(
            decode_value(v, &NetworkConfig::default()),
            Err(ErrorReason::InvalidX402Version)
        );
    }

    #[test]
    fn rejects_unsupported_scheme() {
        let mut v = sample();
        v["scheme"] = json!("upto");
        assert_eq!(
            decode_value(v, &NetworkConfig::default()),
            Err(ErrorReason::InvalidScheme)
        );
    }

    #[test]
    fn rejects_unsupported_network() {
        let mut v = sample();
        v["network"] = json!("meridian-mainnet");
        assert_eq!(
            decode_value(v, &NetworkConfig::default()),
            Err(ErrorReason::InvalidNetwork)
        );
    }

    #[test]
    fn rejects_non_object_payload() {
        let mut v = sample();
        v["payload"] = json!("not an object");
        assert_eq!(
            decode_value(v, &NetworkConfig::default()),
            Err(ErrorReason::InvalidPayload)
        );
    }

    #[test]
    fn rejects_absent_payload() {
        let mut v = sample();
        v.as_object_mut().unwrap().remove("payload");
        assert_eq!(
            decode_value(v, &NetworkConfig::default()),
            Err(ErrorReason::InvalidPayload)
        );
    }

    #[test]
    fn rejects_invalid_base64() {
        assert_eq!(
            decode_header("%%%not-base64%%%", &NetworkConfig::default()),
            Err(ErrorReason::InvalidPayload)
        );
    }

    #[test]
    fn request_without_either_form_is_invalid() {
        assert_eq!(
            decode_request(1, None, None, &NetworkConfig::default()),
            Err(ErrorReason::InvalidPayload)
        );
    }

    #[test]
    fn request_with_wrong_outer_version_is_rejected() {
        let v = sample();
        assert_eq!(
            decode_request(2, None, Some(&v), &NetworkConfig::default()),
            Err(ErrorReason::InvalidX402Version)
        );
    }
}
