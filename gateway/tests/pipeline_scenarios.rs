//! End-to-end pipeline scenarios from spec.md §8, driven directly against
//! `Pipeline::run` with in-memory/mock leaf dependencies — the same shape
//! of test the teacher uses for its `rpc_server` integration suite, minus
//! an actual TCP listener.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use mcpay_config::{
    CacheConfig, GatewayConfig, HeaderPolicyConfig, InspectConfig, PaymentConfig, RateLimitConfig,
    RetryConfig, ServerConfig, UpstreamConfig,
};
use mcpay_gateway::auto_signer::{AutoSigner, DisabledAutoSigner};
use mcpay_gateway::context::{Inbound, PricingEntry, RequestContext, Server, Tool, User};
use mcpay_gateway::errors::{AutoSignerError, FacilitatorError};
use mcpay_gateway::facilitator::{Facilitator, VerifyOutcome};
use mcpay_gateway::identity::NoSessionProvider;
use mcpay_gateway::payment::{AutoSignIntent, AutoSignResult, DecodedPayment, PaymentRequirements, SettleResponse};
use mcpay_gateway::pipeline::stages::build_default_pipeline;
use mcpay_gateway::store::InMemoryStore;
use mcpay_gateway::upstream::{RawUpstreamResponse, UpstreamClient};
use mcpay_gateway::AppState;

fn test_config() -> GatewayConfig {
    GatewayConfig {
        server: ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            gateway_origin: "https://gateway.test".parse().unwrap(),
            metrics_port: None,
        },
        rate_limit: RateLimitConfig {
            max_requests_per_minute: 1000,
            min_request_delay_ms: 0,
        },
        retry: RetryConfig {
            max_retries: 3,
            base_retry_delay_ms: 10,
        },
        cache: CacheConfig::default(),
        inspect: InspectConfig::default(),
        headers: HeaderPolicyConfig::default(),
        payment: PaymentConfig::default(),
        upstream: UpstreamConfig { timeout_ms: 5_000 },
    }
}

struct ScriptedUpstream {
    responses: Mutex<VecDeque<(u16, &'static str)>>,
    calls: AtomicUsize,
}

impl ScriptedUpstream {
    fn new(responses: Vec<(u16, &'static str)>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamClient for ScriptedUpstream {
    async fn execute(&self, _request: &mcpay_gateway::context::UpstreamRequest) -> Result<RawUpstreamResponse, anyhow::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut queue = self.responses.lock().unwrap();
        let (status, body) = if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            *queue.front().unwrap()
        };
        Ok(RawUpstreamResponse {
            status,
            status_text: String::new(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Bytes::from_static(body.as_bytes()),
        })
    }
}

struct MockFacilitator {
    verify_ok: bool,
    settle_success: bool,
    settle_transaction: Option<String>,
}

impl MockFacilitator {
    fn accepting() -> Self {
        Self {
            verify_ok: true,
            settle_success: true,
            settle_transaction: Some("0xsettledtx".to_string()),
        }
    }
}

#[async_trait]
impl Facilitator for MockFacilitator {
    async fn verify(
        &self,
        _payment_header: &str,
        _requirements: &PaymentRequirements,
    ) -> Result<VerifyOutcome, FacilitatorError> {
        if self.verify_ok {
            Ok(VerifyOutcome::Verified)
        } else {
            Ok(VerifyOutcome::Rejected { reason: "signature invalid".to_string() })
        }
    }

    async fn settle(
        &self,
        _decoded: &DecodedPayment,
        _requirement: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError> {
        Ok(SettleResponse {
            success: self.settle_success,
            transaction: self.settle_transaction.clone(),
            error_reason: None,
        })
    }
}

struct MockAutoSigner {
    header: String,
    wallet_address: String,
}

#[async_trait]
impl AutoSigner for MockAutoSigner {
    async fn sign(&self, _intent: &AutoSignIntent, _user: Option<&User>) -> Result<AutoSignResult, AutoSignerError> {
        Ok(AutoSignResult {
            success: true,
            signed_payment_header: Some(self.header.clone()),
            wallet_address: Some(self.wallet_address.clone()),
            strategy: Some("managed-wallet".to_string()),
            error: None,
        })
    }
}

fn paid_pricing() -> PricingEntry {
    PricingEntry {
        id: "price-1".to_string(),
        max_amount_required_raw: "50000".to_string(),
        token_decimals: 6,
        network: "base-sepolia".to_string(),
        asset_address: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".to_string(),
        active: true,
        created_at: chrono::Utc::now(),
    }
}

fn server_record() -> Server {
    Server {
        internal_id: "srv1-internal".to_string(),
        public_id: "srv1".to_string(),
        mcp_origin: "https://srv1.example/rpc".parse().unwrap(),
        receiver_address: "0xreceiver0000000000000000000000000000000".to_string(),
        require_auth: false,
        auth_headers: None,
        creator_id: None,
    }
}

fn tool_call_body(tool_name: &str) -> Bytes {
    Bytes::from(
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": tool_name, "arguments": { "x": 1 } },
        })
        .to_string(),
    )
}

fn rpc_inbound(method: actix_web::http::Method, path_and_query: &str, body: Bytes) -> Inbound {
    let url = format!("https://gateway.test{path_and_query}").parse().unwrap();
    let headers = vec![
        ("content-type".to_string(), "application/json".to_string()),
        (
            "accept".to_string(),
            "application/json, text/event-stream".to_string(),
        ),
    ];
    Inbound { method, url, headers, body }
}

async fn body_text(response: actix_web::HttpResponse) -> String {
    let bytes = actix_web::body::to_bytes(response.into_body()).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn build_state(
    store: Arc<InMemoryStore>,
    facilitator: Arc<dyn Facilitator>,
    auto_signer: Arc<dyn AutoSigner>,
    upstream: Arc<dyn UpstreamClient>,
) -> AppState {
    AppState::new(
        test_config(),
        store,
        facilitator,
        auto_signer,
        Arc::new(NoSessionProvider),
        upstream,
    )
}

#[actix_rt::test]
async fn unmonetized_tool_call_is_mirrored_and_recorded() {
    let store = InMemoryStore::new().with_server(server_record()).with_tool(Tool {
        id: "tool-echo".to_string(),
        server_internal_id: "srv1-internal".to_string(),
        name: "echo".to_string(),
        input_schema: serde_json::json!({}),
        is_monetized: false,
        pricing: vec![],
    });
    let store = Arc::new(store);
    let upstream = Arc::new(ScriptedUpstream::new(vec![(200, r#"{"ok":true}"#)]));
    let state = build_state(
        store.clone(),
        Arc::new(MockFacilitator::accepting()),
        Arc::new(DisabledAutoSigner),
        upstream.clone(),
    );

    let pipeline = build_default_pipeline(&state);
    let inbound = rpc_inbound(actix_web::http::Method::POST, "/mcp/srv1/rpc", tool_call_body("echo"));
    let mut ctx = RequestContext::new(inbound, "req-1".to_string());
    let response = pipeline.run(&mut ctx).await;

    assert_eq!(response.status(), actix_web::http::StatusCode::OK);
    assert_eq!(upstream.call_count(), 1);

    let usages = store.recorded_usages();
    assert_eq!(usages.len(), 1);
    assert_eq!(usages[0].response_status, "200");
    assert!(store.recorded_payments().is_empty());
}

#[actix_rt::test]
async fn paid_tool_with_valid_payment_settles_and_mirrors() {
    let store = InMemoryStore::new().with_server(server_record()).with_tool(Tool {
        id: "tool-paid".to_string(),
        server_internal_id: "srv1-internal".to_string(),
        name: "paid_echo".to_string(),
        input_schema: serde_json::json!({}),
        is_monetized: true,
        pricing: vec![paid_pricing()],
    });
    let upstream = Arc::new(ScriptedUpstream::new(vec![(200, r#"{"ok":true}"#)]));
    let payment_header = base64::encode(
        serde_json::json!({
            "x402Version": 1,
            "scheme": "exact",
            "network": "base-sepolia",
            "payload": {
                "authorization": {
                    "from": "0xcaller00000000000000000000000000000000",
                    "to": "0xreceiver0000000000000000000000000000000",
                    "value": "50000",
                    "validAfter": "0",
                    "validBefore": "9999999999",
                    "nonce": "0x01",
                },
                "signature": "0xsig",
            },
        })
        .to_string(),
    );

    let store = Arc::new(store);
    let state = build_state(
        store.clone(),
        Arc::new(MockFacilitator::accepting()),
        Arc::new(DisabledAutoSigner),
        upstream.clone(),
    );

    let pipeline = build_default_pipeline(&state);
    let mut inbound = rpc_inbound(
        actix_web::http::Method::POST,
        "/mcp/srv1/rpc",
        tool_call_body("paid_echo"),
    );
    inbound.headers.push(("x-payment".to_string(), payment_header));
    let mut ctx = RequestContext::new(inbound, "req-2".to_string());
    let response = pipeline.run(&mut ctx).await;

    assert_eq!(response.status(), actix_web::http::StatusCode::OK);
    assert!(response.headers().contains_key("x-payment-response"));
    assert_eq!(upstream.call_count(), 1);

    let payments = store.recorded_payments();
    assert_eq!(payments.len(), 1);
}

#[actix_rt::test]
async fn paid_tool_without_payment_is_rejected_with_402() {
    let store = InMemoryStore::new().with_server(server_record()).with_tool(Tool {
        id: "tool-paid".to_string(),
        server_internal_id: "srv1-internal".to_string(),
        name: "paid_echo".to_string(),
        input_schema: serde_json::json!({}),
        is_monetized: true,
        pricing: vec![paid_pricing()],
    });
    let store = Arc::new(store);
    let upstream = Arc::new(ScriptedUpstream::new(vec![(200, r#"{"ok":true}"#)]));
    let state = build_state(
        store.clone(),
        Arc::new(MockFacilitator::accepting()),
        Arc::new(DisabledAutoSigner),
        upstream.clone(),
    );

    let pipeline = build_default_pipeline(&state);
    let inbound = rpc_inbound(
        actix_web::http::Method::POST,
        "/mcp/srv1/rpc",
        tool_call_body("paid_echo"),
    );
    let mut ctx = RequestContext::new(inbound, "req-3".to_string());
    let response = pipeline.run(&mut ctx).await;

    assert_eq!(response.status(), actix_web::http::StatusCode::PAYMENT_REQUIRED);
    assert_eq!(upstream.call_count(), 0);
    let body = body_text(response).await;
    assert!(body.contains("accepts"));

    let usages = store.recorded_usages();
    assert_eq!(usages.len(), 1);
    assert_eq!(usages[0].response_status, "payment_failed");
}

#[actix_rt::test]
async fn managed_wallet_auto_sign_injects_payment_header() {
    let store = InMemoryStore::new().with_server(server_record()).with_tool(Tool {
        id: "tool-paid".to_string(),
        server_internal_id: "srv1-internal".to_string(),
        name: "paid_echo".to_string(),
        input_schema: serde_json::json!({}),
        is_monetized: true,
        pricing: vec![paid_pricing()],
    });

    let signed_header = base64::encode(
        serde_json::json!({
            "x402Version": 1,
            "scheme": "exact",
            "network": "base-sepolia",
            "payload": {
                "authorization": {
                    "from": "0xmanagedwallet000000000000000000000000",
                    "to": "0xreceiver0000000000000000000000000000000",
                    "value": "50000",
                    "validAfter": "0",
                    "validBefore": "9999999999",
                    "nonce": "0x02",
                },
                "signature": "0xautosigned",
            },
        })
        .to_string(),
    );

    let upstream = Arc::new(ScriptedUpstream::new(vec![(200, r#"{"ok":true}"#)]));
    let auto_signer = Arc::new(MockAutoSigner {
        header: signed_header,
        wallet_address: "0xmanagedwallet000000000000000000000000".to_string(),
    });

    let state = build_state(
        Arc::new(store),
        Arc::new(MockFacilitator::accepting()),
        auto_signer,
        upstream.clone(),
    );

    let pipeline = build_default_pipeline(&state);
    let mut inbound = rpc_inbound(
        actix_web::http::Method::POST,
        "/mcp/srv1/rpc",
        tool_call_body("paid_echo"),
    );
    inbound.headers.push(("x-wallet-provider".to_string(), "coinbase-cdp".to_string()));
    inbound.headers.push(("x-wallet-type".to_string(), "managed".to_string()));
    inbound.headers.push((
        "x-wallet-address".to_string(),
        "0xmanagedwallet000000000000000000000000".to_string(),
    ));
    let mut ctx = RequestContext::new(inbound, "req-4".to_string());
    let response = pipeline.run(&mut ctx).await;

    assert_eq!(response.status(), actix_web::http::StatusCode::OK);
    assert!(response.headers().contains_key("x-payment-response"));
}

#[actix_rt::test]
async fn upstream_429_then_200_retries_once() {
    let store = InMemoryStore::new().with_server(server_record()).with_tool(Tool {
        id: "tool-echo".to_string(),
        server_internal_id: "srv1-internal".to_string(),
        name: "echo".to_string(),
        input_schema: serde_json::json!({}),
        is_monetized: false,
        pricing: vec![],
    });
    let upstream = Arc::new(ScriptedUpstream::new(vec![(429, ""), (200, r#"{"ok":true}"#)]));
    let state = build_state(
        Arc::new(store),
        Arc::new(MockFacilitator::accepting()),
        Arc::new(DisabledAutoSigner),
        upstream.clone(),
    );

    let pipeline = build_default_pipeline(&state);
    let inbound = rpc_inbound(actix_web::http::Method::POST, "/mcp/srv1/rpc", tool_call_body("echo"));
    let mut ctx = RequestContext::new(inbound, "req-5".to_string());

    let started = std::time::Instant::now();
    let response = pipeline.run(&mut ctx).await;

    assert_eq!(response.status(), actix_web::http::StatusCode::OK);
    assert_eq!(upstream.call_count(), 2);
    assert!(started.elapsed() >= std::time::Duration::from_millis(10));
}

#[actix_rt::test]
async fn repeated_get_is_served_from_cache_without_a_second_upstream_call() {
    let mut coingecko_server = server_record();
    coingecko_server.public_id = "srv2".to_string();
    coingecko_server.internal_id = "srv2-internal".to_string();
    coingecko_server.mcp_origin = "https://api.coingecko.com/api/v3".parse().unwrap();

    let store = InMemoryStore::new().with_server(coingecko_server);
    let upstream = Arc::new(ScriptedUpstream::new(vec![(200, r#"{"price":1}"#)]));
    let state = build_state(
        Arc::new(store),
        Arc::new(MockFacilitator::accepting()),
        Arc::new(DisabledAutoSigner),
        upstream.clone(),
    );
    let pipeline = build_default_pipeline(&state);

    let inbound1 = rpc_inbound(actix_web::http::Method::GET, "/mcp/srv2/coins", Bytes::new());
    let mut ctx1 = RequestContext::new(inbound1, "req-6a".to_string());
    let response1 = pipeline.run(&mut ctx1).await;
    assert_eq!(response1.status(), actix_web::http::StatusCode::OK);

    let inbound2 = rpc_inbound(actix_web::http::Method::GET, "/mcp/srv2/coins", Bytes::new());
    let mut ctx2 = RequestContext::new(inbound2, "req-6b".to_string());
    let response2 = pipeline.run(&mut ctx2).await;
    assert_eq!(response2.status(), actix_web::http::StatusCode::OK);

    assert_eq!(upstream.call_count(), 1);
    assert_eq!(body_text(response1).await, body_text(response2).await);
}
