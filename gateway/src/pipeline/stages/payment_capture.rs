//! Stage 13: `PaymentCapture`. Settles a pre-authorized
//! payment only after a successful, non-cached upstream response, and
//! finalizes the mirrored client response — the only stage that
//! still needs to run for that is attaching `X-PAYMENT-RESPONSE`.

use std::sync::Arc;
use std::time::Instant;

use actix_web::ResponseError;
use mcpay_config::{CaptureFailurePolicy, PaymentConfig};
use serde_json::json;

use crate::errors::{payment_required, unhandled};
use crate::facilitator::Facilitator;
use crate::identity::SharedStore;
use crate::payment::encode_settlement_response;
use crate::pipeline::stages::mirror::mirror;
use crate::pipeline::{Stage, StageOutcome};
use crate::context::RequestContext;
use crate::store::PaymentRecord;

pub struct PaymentCaptureStage {
    pub store: SharedStore,
    pub facilitator: Arc<dyn Facilitator>,
    pub config: PaymentConfig,
}

impl PaymentCaptureStage {
    pub fn new(store: SharedStore, facilitator: Arc<dyn Facilitator>, config: PaymentConfig) -> Arc<Self> {
        Arc::new(Self { store, facilitator, config })
    }
}

#[async_trait::async_trait]
impl Stage for PaymentCaptureStage {
    fn name(&self) -> &'static str {
        "PaymentCapture"
    }

    async fn run(&self, ctx: &mut RequestContext) -> Result<StageOutcome, anyhow::Error> {
        if ctx.response.is_some() {
            return Ok(StageOutcome::Continue);
        }
        let Some(upstream) = ctx.upstream_response.clone() else {
            return Ok(StageOutcome::Continue);
        };

        let should_capture = ctx.payment.authorized && !upstream.from_cache && upstream.status.as_u16() < 500;
        if !should_capture {
            ctx.response = Some(mirror(&upstream, &[]));
            return Ok(StageOutcome::Continue);
        }

        let (Some(decoded), Some(requirements)) = (ctx.payment.decoded.clone(), ctx.payment.requirements.clone())
        else {
            ctx.response = Some(mirror(&upstream, &[]));
            return Ok(StageOutcome::Continue);
        };
        let requirement = requirements[0].clone();

        let settle_started = Instant::now();
        let settle_outcome = self.facilitator.settle(&decoded, &requirement).await;
        metrics::histogram!(
            "gateway.payment.settle_latency_ms",
            settle_started.elapsed().as_millis() as f64
        );

        match settle_outcome {
            Ok(settle) if settle.success => {
                let encoded = encode_settlement_response(&settle)?;

                if let Some(picked) = ctx.picked_pricing.clone() {
                    let record = PaymentRecord {
                        tool_id: ctx.tool_call.as_ref().and_then(|t| t.tool_id.clone()),
                        user_id: ctx.user.as_ref().map(|u| u.id.clone()),
                        amount_raw: picked.max_amount_required_raw.clone(),
                        token_decimals: picked.token_decimals,
                        currency: picked.asset_address.clone(),
                        network: picked.network.clone(),
                        transaction_hash: settle.transaction.clone(),
                        status: "completed".to_string(),
                        signature: ctx.payment.header.clone().unwrap_or_default(),
                        payment_data: json!({
                            "decoded": decoded,
                            "settleResponse": settle,
                            "pricingInfo": picked,
                        }),
                    };
                    if let Err(err) = self.store.create_payment(record).await {
                        vlog::warn!(request_id = %ctx.request_id, "failed to persist payment record: {}", err);
                    }
                }

                ctx.payment.captured = true;
                ctx.payment.settlement_response = Some(encoded.clone());
                ctx.response = Some(mirror(&upstream, &[("X-PAYMENT-RESPONSE".to_string(), encoded)]));
            }
            Ok(settle) => {
                let reason = settle.error_reason.unwrap_or_else(|| "settlement failed".to_string());
                let err = payment_required(self.config.x402_version, reason, requirements);
                ctx.response = Some(err.error_response());
            }
            Err(err) => {
                vlog::error!(request_id = %ctx.request_id, "facilitator settle failed: {}", err);
                ctx.response = Some(match self.config.capture_failure_policy {
                    CaptureFailurePolicy::FailClosed => unhandled("PaymentCapture", err).error_response(),
                    CaptureFailurePolicy::FailOpen => mirror(&upstream, &[]),
                    CaptureFailurePolicy::QueueForRetry => {
                        vlog::warn!(
                            request_id = %ctx.request_id,
                            "settlement queued for out-of-process retry after failure"
                        );
                        mirror(&upstream, &[])
                    }
                });
            }
        }

        Ok(StageOutcome::Continue)
    }
}
