use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical machine-readable failure reasons for verification and
/// settlement. Serialized as snake_case strings; this is the single wire
/// contract, historical field-name variants are not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    InvalidX402Version,
    InvalidScheme,
    InvalidNetwork,
    InvalidPayload,
    InvalidMissingFields,
    InvalidDestinationMismatch,
    InvalidAmountMismatch,
    InvalidAssetMismatch,
    SourceAccountNotFound,
    InsufficientFunds,
    UnexpectedVerifyError,
    TransactionAlreadyUsed,
    TransactionRejected,
    UnexpectedSettleError,
}

impl ErrorReason {
    /// The wire string for this reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidX402Version => "invalid_x402_version",
            Self::InvalidScheme => "invalid_scheme",
            Self::InvalidNetwork => "invalid_network",
            Self::InvalidPayload => "invalid_payload",
            Self::InvalidMissingFields => "invalid_missing_fields",
            Self::InvalidDestinationMismatch => "invalid_destination_mismatch",
            Self::InvalidAmountMismatch => "invalid_amount_mismatch",
            Self::InvalidAssetMismatch => "invalid_asset_mismatch",
            Self::SourceAccountNotFound => "source_account_not_found",
            Self::InsufficientFunds => "insufficient_funds",
            Self::UnexpectedVerifyError => "unexpected_verify_error",
            Self::TransactionAlreadyUsed => "transaction_already_used",
            Self::TransactionRejected => "transaction_rejected",
            Self::UnexpectedSettleError => "unexpected_settle_error",
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response from the facilitator's `/verify` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<ErrorReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

impl VerifyResponse {
    pub fn valid(payer: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            invalid_reason: None,
            payer: Some(payer.into()),
        }
    }

    pub fn invalid(reason: ErrorReason) -> Self {
        Self {
            is_valid: false,
            invalid_reason: Some(reason),
            payer: None,
        }
    }

    pub fn invalid_with_payer(reason: ErrorReason, payer: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            invalid_reason: Some(reason),
            payer: Some(payer.into()),
        }
    }
}

/// Response from the facilitator's `/settle` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<ErrorReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    /// Transaction identity, if settlement succeeded. `None` on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    pub network: String,
}

impl SettleResponse {
    pub fn failure(reason: ErrorReason, network: impl Into<String>) -> Self {
        Self {
            success: false,
            error_reason: Some(reason),
            payer: None,
            transaction: None,
            network: network.into(),
        }
    }

    pub fn failure_with_payer(
        reason: ErrorReason,
        payer: impl Into<String>,
        network: impl Into<String>,
    ) -> Self {
        Self {
            payer: Some(payer.into()),
            ..Self::failure(reason, network)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_serialize_to_wire_strings() {
        for reason in [
            ErrorReason::InvalidX402Version,
            ErrorReason::InvalidDestinationMismatch,
            ErrorReason::TransactionAlreadyUsed,
            ErrorReason::UnexpectedSettleError,
        ] {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", reason.as_str()));
        }
    }

    #[test]
    fn verify_response_omits_absent_fields() {
        let json = serde_json::to_string(&VerifyResponse::valid("MSOURCE")).unwrap();
        assert_eq!(json, r#"{"isValid":true,"payer":"MSOURCE"}"#);
    }

    #[test]
    fn settle_failure_omits_transaction() {
        let resp = SettleResponse::failure(ErrorReason::InvalidPayload, "meridian-testnet");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["errorReason"], "invalid_payload");
        assert!(json.get("transaction").is_none());
    }
}
