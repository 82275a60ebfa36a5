//! Client for the stablecoin payment facilitator. The facilitator's own
//! verify/settle RPC implementation lives in an external service; the
//! pipeline only depends on this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::FacilitatorError;
use crate::payment::{DecodedPayment, PaymentRequirements, SettleResponse};

/// Outcome of `Facilitator::verify`. A facilitator may answer with a
/// terminal HTTP response of its own (e.g. it is itself rate-limiting the
/// gateway); the pipeline mirrors that response verbatim.
pub enum VerifyOutcome {
    Verified,
    Rejected { reason: String },
    Terminal(actix_web::HttpResponse),
}

#[async_trait]
pub trait Facilitator: Send + Sync {
    async fn verify(
        &self,
        payment_header: &str,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyOutcome, FacilitatorError>;

    async fn settle(
        &self,
        decoded: &DecodedPayment,
        requirement: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError>;
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    payment_header: &'a str,
    payment_requirements: &'a PaymentRequirements,
}

#[derive(Deserialize)]
struct VerifyResponse {
    #[serde(rename = "isValid")]
    is_valid: bool,
    #[serde(default)]
    #[serde(rename = "invalidReason")]
    invalid_reason: Option<String>,
}

#[derive(Serialize)]
struct SettleRequest<'a> {
    payment_payload: &'a DecodedPayment,
    payment_requirements: &'a PaymentRequirements,
}

/// HTTP-backed facilitator client, hitting an external x402 facilitator
/// service's `/verify` and `/settle` endpoints.
pub struct HttpFacilitator {
    client: reqwest::Client,
    base_url: url::Url,
}

impl HttpFacilitator {
    pub fn new(client: reqwest::Client, base_url: url::Url) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl Facilitator for HttpFacilitator {
    async fn verify(
        &self,
        payment_header: &str,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyOutcome, FacilitatorError> {
        let url = self
            .base_url
            .join("verify")
            .map_err(|e| FacilitatorError::Network(e.into()))?;

        let resp = self
            .client
            .post(url)
            .json(&VerifyRequest {
                payment_header,
                payment_requirements: requirements,
            })
            .send()
            .await
            .map_err(|e| FacilitatorError::Network(e.into()))?;

        if resp.status().as_u16() >= 500 {
            vlog::warn!("facilitator verify returned {}", resp.status());
        }

        let body: VerifyResponse = resp
            .json()
            .await
            .map_err(|e| FacilitatorError::Network(e.into()))?;

        if body.is_valid {
            Ok(VerifyOutcome::Verified)
        } else {
            Ok(VerifyOutcome::Rejected {
                reason: body
                    .invalid_reason
                    .unwrap_or_else(|| "payment rejected by facilitator".to_string()),
            })
        }
    }

    async fn settle(
        &self,
        decoded: &DecodedPayment,
        requirement: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError> {
        let url = self
            .base_url
            .join("settle")
            .map_err(|e| FacilitatorError::Network(e.into()))?;

        let settle_response: SettleResponse = self
            .client
            .post(url)
            .json(&SettleRequest {
                payment_payload: decoded,
                payment_requirements: requirement,
            })
            .send()
            .await
            .map_err(|e| FacilitatorError::Network(e.into()))?
            .json()
            .await
            .map_err(|e| FacilitatorError::Network(e.into()))?;

        Ok(settle_response)
    }
}
