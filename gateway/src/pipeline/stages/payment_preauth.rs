//! Stage 9: `PaymentPreAuth`. For billable tool calls,
//! acquires (directly or via auto-sign) a payment authorization and
//! verifies it with the `Facilitator` — but never settles here; settlement
//! is `PaymentCapture`'s job, after the upstream call has succeeded.

use std::sync::Arc;
use std::time::Instant;

use actix_web::ResponseError;
use mcpay_config::PaymentConfig;

use crate::auto_signer::AutoSigner;
use crate::context::{AuthMethod, RequestContext};
use crate::errors::{payment_required, PipelineError};
use crate::facilitator::{Facilitator, VerifyOutcome};
use crate::identity::{resolve_or_create_by_wallet, SharedStore};
use crate::payment::{decode_payment_header, AutoSignIntent, PaymentRequirements};
use crate::pipeline::{Stage, StageOutcome};

pub struct PaymentPreAuthStage {
    pub store: SharedStore,
    pub facilitator: Arc<dyn Facilitator>,
    pub auto_signer: Arc<dyn AutoSigner>,
    pub config: PaymentConfig,
}

impl PaymentPreAuthStage {
    pub fn new(
        store: SharedStore,
        facilitator: Arc<dyn Facilitator>,
        auto_signer: Arc<dyn AutoSigner>,
        config: PaymentConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            facilitator,
            auto_signer,
            config,
        })
    }
}

/// Auto-sign is allowed only for a signalled managed wallet or an
/// API-key-authenticated caller.
fn auto_sign_eligible(ctx: &RequestContext) -> bool {
    let managed_wallet = ctx.inbound.header("x-wallet-provider") == Some("coinbase-cdp")
        && ctx.inbound.header("x-wallet-type") == Some("managed");
    managed_wallet || ctx.auth_method == AuthMethod::ApiKey
}

#[async_trait::async_trait]
impl Stage for PaymentPreAuthStage {
    fn name(&self) -> &'static str {
        "PaymentPreAuth"
    }

    async fn run(&self, ctx: &mut RequestContext) -> Result<StageOutcome, anyhow::Error> {
        if ctx.upstream_response.is_some() {
            return Ok(StageOutcome::Continue);
        }

        let Some(tool_call) = ctx.tool_call.clone() else {
            return Ok(StageOutcome::Continue);
        };
        if !tool_call.is_paid {
            return Ok(StageOutcome::Continue);
        }
        let (Some(picked), Some(pay_to)) = (ctx.picked_pricing.clone(), tool_call.pay_to.clone()) else {
            return Ok(StageOutcome::Continue);
        };

        let human_amount =
            crate::payment::base_units_to_human(&picked.max_amount_required_raw, picked.token_decimals)?;

        let resource = format!("mcpay://{}", tool_call.tool_name);
        let description = format!("Execution of {}", tool_call.tool_name);

        let mut payment_header = ctx
            .payment
            .header
            .clone()
            .or_else(|| ctx.inbound.header("x-payment").map(str::to_string));

        if payment_header.is_none() && auto_sign_eligible(ctx) {
            let intent = AutoSignIntent {
                max_amount_required: human_amount.clone(),
                network: picked.network.clone(),
                asset: picked.asset_address.clone(),
                pay_to: pay_to.clone(),
                resource: resource.clone(),
                description: description.clone(),
            };
            match self.auto_signer.sign(&intent, ctx.user.as_ref()).await {
                Ok(result) if result.success => {
                    payment_header = result.signed_payment_header.clone();
                    if ctx.user.is_none() {
                        if let Some(address) = &result.wallet_address {
                            ctx.user = resolve_or_create_by_wallet(self.store.as_ref(), address).await;
                        }
                    }
                }
                Ok(_) => {}
                Err(err) => vlog::warn!(request_id = %ctx.request_id, "auto-sign failed: {}", err),
            }
        }

        let requirements = vec![PaymentRequirements {
            scheme: "exact".to_string(),
            network: picked.network.clone(),
            resource,
            description,
            pay_to,
            max_amount_required: human_amount,
            asset: picked.asset_address.clone(),
            extra: None,
            x402_version: self.config.x402_version,
        }];
        ctx.payment.requirements = Some(requirements.clone());

        let Some(header) = payment_header else {
            let err = payment_required(self.config.x402_version, "payment required", requirements);
            ctx.response = Some(err.error_response());
            return Ok(StageOutcome::Continue);
        };

        let decoded = match decode_payment_header(&header) {
            Ok(decoded) => decoded,
            Err(err) => {
                let pipeline_err =
                    payment_required(self.config.x402_version, format!("invalid X-PAYMENT header: {err}"), requirements);
                ctx.response = Some(pipeline_err.error_response());
                return Ok(StageOutcome::Continue);
            }
        };

        if ctx.user.is_none() {
            ctx.user = resolve_or_create_by_wallet(self.store.as_ref(), &decoded.payload.authorization.from).await;
        }

        ctx.payment.header = Some(header.clone());
        ctx.payment.decoded = Some(decoded);

        let verify_started = Instant::now();
        let verify_outcome = self.facilitator.verify(&header, &requirements[0]).await;
        metrics::histogram!(
            "gateway.payment.verify_latency_ms",
            verify_started.elapsed().as_millis() as f64
        );

        match verify_outcome {
            Ok(VerifyOutcome::Verified) => {
                ctx.payment.authorized = true;
                Ok(StageOutcome::Continue)
            }
            Ok(VerifyOutcome::Rejected { reason }) => {
                let err = payment_required(self.config.x402_version, reason, requirements);
                ctx.response = Some(err.error_response());
                Ok(StageOutcome::Continue)
            }
            // A facilitator-produced terminal response (e.g. it is itself
            // rate-limiting the gateway) is still mirrored verbatim, but
            // `Analytics` (stage 14) must still see the request.
            Ok(VerifyOutcome::Terminal(response)) => {
                ctx.response = Some(response);
                Ok(StageOutcome::Continue)
            }
            Err(err) => {
                vlog::warn!(request_id = %ctx.request_id, "facilitator verify failed: {}", err);
                let pipeline_err = payment_required(
                    self.config.x402_version,
                    "facilitator unavailable",
                    requirements,
                );
                ctx.response = Some(pipeline_err.error_response());
                Ok(StageOutcome::Continue)
            }
        }
    }
}
