//! Process entry point: load configuration, wire the leaf dependencies
//!, then serve until a shutdown signal
//! arrives.

use std::sync::Arc;

use mcpay_config::GatewayConfig;
use mcpay_gateway::auto_signer::DisabledAutoSigner;
use mcpay_gateway::facilitator::HttpFacilitator;
use mcpay_gateway::identity::NoSessionProvider;
use mcpay_gateway::store::InMemoryStore;
use mcpay_gateway::upstream::ReqwestUpstreamClient;
use mcpay_gateway::{http_server, AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let _vlog_guard = vlog::init();

    let config = GatewayConfig::from_env();

    if let Some(port) = config.server.metrics_port {
        mcpay_gateway::metrics_exporter::run(port);
        vlog::info!(port, "prometheus exporter listening");
    }

    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_millis(config.upstream.timeout_ms))
        .build()
        .expect("failed to build HTTP client");

    let facilitator_base = mcpay_utils::get_env("FACILITATOR_URL")
        .parse()
        .expect("FACILITATOR_URL must be an absolute URL");

    let state = AppState::new(
        config,
        Arc::new(InMemoryStore::new()),
        Arc::new(HttpFacilitator::new(http_client.clone(), facilitator_base)),
        Arc::new(DisabledAutoSigner),
        Arc::new(NoSessionProvider),
        Arc::new(ReqwestUpstreamClient::new(http_client)),
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let shutdown_tx = std::sync::Mutex::new(Some(shutdown_tx));
    ctrlc::set_handler(move || {
        vlog::info!("received shutdown signal");
        if let Some(tx) = shutdown_tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
    })
    .expect("failed to install signal handler");

    tokio::select! {
        result = http_server::run(state) => result,
        _ = shutdown_rx => {
            vlog::info!("shutting down gracefully");
            Ok(())
        }
    }
}
