//! Error taxonomy. Each variant maps to exactly one HTTP response shape at
//! the pipeline boundary; stages raise these instead of panicking, and the
//! runner converts anything else (a stage panic or a downstream
//! `anyhow::Error`) into `PipelineUnhandled`.

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed request: {0}")]
    ClientMalformed(String),

    #[error("request body of {0} bytes exceeds the configured maximum")]
    BodyTooLarge(usize),

    #[error("upstream route could not be resolved")]
    NotFound,

    #[error("payment required: {0}")]
    PaymentRequired(PaymentRequiredBody),

    #[error("upstream is unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("pipeline stage {stage} failed: {source}")]
    Unhandled {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// Body for a `402` response.
#[derive(Debug)]
pub struct PaymentRequiredBody {
    pub x402_version: u32,
    pub error: String,
    pub accepts: Vec<crate::payment::PaymentRequirements>,
}

impl std::fmt::Display for PaymentRequiredBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl ResponseError for PipelineError {
    fn error_response(&self) -> HttpResponse {
        match self {
            PipelineError::ClientMalformed(msg) => {
                HttpResponse::BadRequest().json(json!({ "error": msg }))
            }
            PipelineError::BodyTooLarge(_) => HttpResponse::PayloadTooLarge()
                .json(json!({ "error": "request body exceeds the configured maximum" })),
            PipelineError::NotFound => {
                HttpResponse::NotFound().json(json!({ "error": "unknown server or tool" }))
            }
            PipelineError::PaymentRequired(body) => {
                HttpResponse::build(actix_web::http::StatusCode::PAYMENT_REQUIRED).json(json!({
                    "x402Version": body.x402_version,
                    "error": body.error,
                    "accepts": body.accepts,
                }))
            }
            PipelineError::UpstreamUnreachable(_) => HttpResponse::BadGateway()
                .json(json!({ "error": "upstream_unreachable" })),
            PipelineError::Unhandled { stage, source } => {
                HttpResponse::InternalServerError().json(json!({
                    "error": source.to_string(),
                    "stage": stage,
                }))
            }
        }
    }
}

pub fn payment_required(
    x402_version: u32,
    error: impl Into<String>,
    accepts: Vec<crate::payment::PaymentRequirements>,
) -> PipelineError {
    PipelineError::PaymentRequired(PaymentRequiredBody {
        x402_version,
        error: error.into(),
        accepts,
    })
}

pub fn unhandled(stage: &'static str, source: impl Into<anyhow::Error>) -> PipelineError {
    PipelineError::Unhandled {
        stage,
        source: source.into(),
    }
}

/// Store-access errors; isolated at call sites (a lookup failure is
/// logged and never fails the request on its own).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Errors from the `Facilitator` RPC.
#[derive(Debug, Error)]
pub enum FacilitatorError {
    #[error("facilitator network error: {0}")]
    Network(#[from] anyhow::Error),
}

/// Errors from the `AutoSigner` capability.
#[derive(Debug, Error)]
pub enum AutoSignerError {
    #[error("auto-signer error: {0}")]
    Signing(#[from] anyhow::Error),
}
