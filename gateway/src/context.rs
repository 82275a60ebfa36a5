//! The mutable per-request context threaded through the pipeline. Modeled as a plain struct with explicit
//! optional fields rather than a dynamic map/bag, so stages never need
//! runtime type inspection to read what an earlier stage produced.

use std::time::Instant;

use actix_web::http::{Method, StatusCode};
use actix_web::HttpResponse;
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::payment::{DecodedPayment, PaymentRequirements};

/// Identity resolved at the `AuthResolve` stage.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub wallet_address: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// How the caller's identity was established; recorded even when `user`
/// ends up `None`, since it still matters for analytics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    ApiKey,
    Session,
    WalletHeader,
    None,
}

impl AuthMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthMethod::ApiKey => "api_key",
            AuthMethod::Session => "session",
            AuthMethod::WalletHeader => "wallet_header",
            AuthMethod::None => "none",
        }
    }
}

/// A single `(token, network, amount, active)` tuple attached to a tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingEntry {
    pub id: String,
    /// Non-negative decimal integer, in base units, as a string.
    pub max_amount_required_raw: String,
    pub token_decimals: u8,
    pub network: String,
    pub asset_address: String,
    pub active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// The decoded `tools/call` invocation plus the server/tool records needed
/// to route and price it.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub server_public_id: String,
    pub tool_name: String,
    pub args: Value,
    pub server_internal_id: Option<String>,
    pub tool_id: Option<String>,
    pub is_paid: bool,
    pub pay_to: Option<String>,
    pub pricing: Vec<PricingEntry>,
}

/// Resolved upstream server record.
#[derive(Debug, Clone)]
pub struct Server {
    pub internal_id: String,
    pub public_id: String,
    pub mcp_origin: url::Url,
    pub receiver_address: String,
    pub require_auth: bool,
    pub auth_headers: Option<HashMap<String, String>>,
    pub creator_id: Option<String>,
}

/// Resolved tool record.
#[derive(Debug, Clone)]
pub struct Tool {
    pub id: String,
    pub server_internal_id: String,
    pub name: String,
    pub input_schema: Value,
    pub is_monetized: bool,
    pub pricing: Vec<PricingEntry>,
}

/// The upstream request assembled by `Forward`, before the network call.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub url: url::Url,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// The upstream response, buffered enough to both mirror and cache.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// True when this response was served from `ResponseCache` rather than
    /// fetched over the network (PaymentCapture must not run for these).
    pub from_cache: bool,
}

/// Payment state threaded between `PaymentPreAuth` and `PaymentCapture`.
#[derive(Debug, Clone, Default)]
pub struct PaymentState {
    /// Raw `X-PAYMENT` header value, injected by auto-sign or read from
    /// the inbound request.
    pub header: Option<String>,
    pub decoded: Option<DecodedPayment>,
    pub requirements: Option<Vec<PaymentRequirements>>,
    pub authorized: bool,
    pub captured: bool,
    /// Encoded settlement response, mirrored as `X-PAYMENT-RESPONSE`.
    pub settlement_response: Option<String>,
}

/// Immutable snapshot of the inbound request, captured once at pipeline
/// entry so later stages never re-read the socket.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub method: Method,
    pub url: url::Url,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Inbound {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The per-request context. Exclusively owned by the runner for the
/// lifetime of one request; stages borrow it mutably one at a time.
pub struct RequestContext {
    pub inbound: Inbound,
    pub started_at: Instant,
    pub request_id: String,

    pub user: Option<User>,
    pub auth_method: AuthMethod,

    pub server: Option<Server>,
    pub tool: Option<Tool>,
    pub tool_call: Option<ToolCall>,
    pub picked_pricing: Option<PricingEntry>,

    /// Outbound header set assembled by `BrowserHeaders`, consumed by
    /// `Forward` once the upstream URL (and therefore `Host`) is known.
    pub outbound_headers: Option<Vec<(String, String)>>,
    pub upstream_request: Option<UpstreamRequest>,
    pub cache_key: Option<String>,

    pub payment: PaymentState,

    pub upstream_response: Option<UpstreamResponse>,

    /// Set by a stage to short-circuit the pipeline with a terminal
    /// response; once set, the runner stops advancing stages.
    pub response: Option<HttpResponse>,
}

impl RequestContext {
    pub fn new(inbound: Inbound, request_id: String) -> Self {
        Self {
            inbound,
            started_at: Instant::now(),
            request_id,
            user: None,
            auth_method: AuthMethod::None,
            server: None,
            tool: None,
            tool_call: None,
            picked_pricing: None,
            outbound_headers: None,
            upstream_request: None,
            cache_key: None,
            payment: PaymentState::default(),
            upstream_response: None,
            response: None,
        }
    }

    pub fn is_short_circuited(&self) -> bool {
        self.response.is_some()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}
