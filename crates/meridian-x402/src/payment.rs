use serde::{Deserialize, Serialize};

/// Ledger-specific payment data embedded in a payment payload.
///
/// `transaction` carries the signed envelope bytes, base64-encoded. The
/// remaining fields are the caller's claimed terms; whenever an envelope is
/// present, verification trusts only the values extracted from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeridianPaymentData {
    /// Signed transaction envelope, base64-encoded. Optional at verify time;
    /// settlement requires it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    /// Claimed source account.
    #[serde(default)]
    pub source: String,
    /// Claimed amount in atomic units.
    #[serde(default)]
    pub amount: String,
    /// Claimed destination account.
    #[serde(default)]
    pub destination: String,
    /// Claimed asset identifier (`"native"` for the native unit).
    #[serde(default)]
    pub asset: String,
    /// Last ledger height at which the envelope is valid.
    #[serde(default)]
    pub expiry_ledger: u64,
    /// Source account sequence number consumed by the envelope.
    #[serde(default)]
    pub nonce: u64,
}

/// Wire-format payment payload (X-PAYMENT header, base64-encoded JSON).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub x402_version: u32,
    pub scheme: String,
    pub network: String,
    pub payload: MeridianPaymentData,
}

/// A single entry in the `accepts` array of a 402 response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: String,
    pub network: String,
    /// Required amount in atomic units, as a non-negative integer string.
    pub max_amount_required: String,
    /// URI of the resource this payment unlocks.
    pub resource: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mime_type: String,
    /// Account that must receive the payment.
    pub pay_to: String,
    pub max_timeout_seconds: u64,
    /// Required asset identifier. When unset, any asset passes the asset check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// The 402 response body returned by the resource server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredBody {
    pub x402_version: u32,
    pub accepts: Vec<PaymentRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
