//! The x402 payment protocol surface consumed by `PaymentPreAuth` and
//! `PaymentCapture`. Field names follow the x402
//! wire format used across the pack's payment-facilitator examples
//! (`PaymentRequirements`, the `authorization`/`signature` envelope).

mod codec;

pub use codec::{base_units_to_human, decode_payment_header, encode_settlement_response};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a server demands in exchange for a tool call, built from a picked
/// `PricingEntry`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequirements {
    pub scheme: String,
    pub network: String,
    pub resource: String,
    pub description: String,
    #[serde(rename = "payTo")]
    pub pay_to: String,
    /// Human-readable decimal string, e.g. `"0.05"`.
    #[serde(rename = "maxAmountRequired")]
    pub max_amount_required: String,
    pub asset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
}

/// The `authorization` envelope inside a decoded `X-PAYMENT` header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAuthorization {
    pub from: String,
    pub to: String,
    pub value: String,
    #[serde(rename = "validAfter")]
    pub valid_after: String,
    #[serde(rename = "validBefore")]
    pub valid_before: String,
    pub nonce: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPayload {
    pub authorization: PaymentAuthorization,
    pub signature: String,
}

/// What the `X-PAYMENT` header decodes to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedPayment {
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    pub scheme: String,
    pub network: String,
    pub payload: PaymentPayload,
}

/// Result of `Facilitator.settle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "errorReason")]
    pub error_reason: Option<String>,
}

/// Result of `AutoSigner.sign`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoSignResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "signedPaymentHeader")]
    pub signed_payment_header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "walletAddress")]
    pub wallet_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Input to `AutoSigner.sign`, computed from the picked pricing entry.
#[derive(Debug, Clone, Serialize)]
pub struct AutoSignIntent {
    #[serde(rename = "maxAmountRequired")]
    pub max_amount_required: String,
    pub network: String,
    pub asset: String,
    #[serde(rename = "payTo")]
    pub pay_to: String,
    pub resource: String,
    pub description: String,
}
