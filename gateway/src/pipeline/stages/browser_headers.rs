//! Stage 5: `BrowserHeaders`. Builds the outbound header set:
//! strips hop-by-hop and infra headers, then injects a rotated `User-Agent`,
//! `Accept`, `Accept-Language`, `Referer`/`Origin`, the caller's wallet
//! address, and the server's configured auth headers.

use std::sync::Arc;

use mcpay_config::HeaderPolicyConfig;
use rand::seq::SliceRandom;

use crate::context::RequestContext;
use crate::pipeline::{Stage, StageOutcome};

const HOP_BY_HOP: &[&str] = &[
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "cookie",
    "authorization",
];

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

fn is_blocked(name: &str, blocked_prefixes: &[String]) -> bool {
    let lower = name.to_ascii_lowercase();
    if HOP_BY_HOP.contains(&lower.as_str()) {
        return true;
    }
    if lower == "forwarded" || lower == "x-real-ip" || lower.starts_with("x-forwarded-") {
        return true;
    }
    blocked_prefixes.iter().any(|p| lower.starts_with(p.as_str()))
}

pub struct BrowserHeadersStage {
    pub headers_config: HeaderPolicyConfig,
    pub gateway_origin: url::Url,
}

impl BrowserHeadersStage {
    pub fn new(headers_config: HeaderPolicyConfig, gateway_origin: url::Url) -> Arc<Self> {
        Arc::new(Self {
            headers_config,
            gateway_origin,
        })
    }
}

#[async_trait::async_trait]
impl Stage for BrowserHeadersStage {
    fn name(&self) -> &'static str {
        "BrowserHeaders"
    }

    async fn run(&self, ctx: &mut RequestContext) -> Result<StageOutcome, anyhow::Error> {
        let mut headers: Vec<(String, String)> = ctx
            .inbound
            .headers
            .iter()
            .filter(|(k, _)| !is_blocked(k, &self.headers_config.blocked_header_prefixes))
            .cloned()
            .collect();
        headers.retain(|(k, _)| !k.eq_ignore_ascii_case("host"));

        if let Some(server) = &ctx.server {
            if let Some(host) = server.mcp_origin.host_str() {
                headers.push(("Host".to_string(), host.to_string()));
            }
        }

        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);
        headers.push(("User-Agent".to_string(), user_agent.to_string()));
        headers.push((
            "Accept".to_string(),
            "application/json, text/event-stream, text/plain, */*".to_string(),
        ));
        headers.push(("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()));
        headers.push(("Referer".to_string(), self.gateway_origin.to_string()));
        headers.push(("Origin".to_string(), self.gateway_origin.to_string()));

        let wallet_address = ctx
            .user
            .as_ref()
            .and_then(|u| u.wallet_address.clone())
            .unwrap_or_default();
        headers.push(("X-MCPay-Wallet-Address".to_string(), wallet_address));

        if let Some(server) = &ctx.server {
            if server.require_auth {
                if let Some(auth_headers) = &server.auth_headers {
                    for (name, value) in auth_headers {
                        headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
                        headers.push((name.clone(), value.clone()));
                    }
                }
            }
        }

        ctx.outbound_headers = Some(headers);
        Ok(StageOutcome::Continue)
    }
}
