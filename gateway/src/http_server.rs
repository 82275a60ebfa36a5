//! The actix-web HTTP surface: `GET|POST|DELETE
//! /mcp/:publicId/*` runs every inbound request through the pipeline;
//! `GET /healthz` is a supplemented liveness probe.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use bytes::Bytes;

use crate::context::{Inbound, RequestContext};
use crate::pipeline::stages::build_default_pipeline;
use crate::pipeline::Pipeline;
use crate::state::AppState;

struct GatewayData {
    pipeline: Arc<Pipeline>,
}

fn build_inbound(req: &HttpRequest, body: Bytes) -> Inbound {
    let conn = req.connection_info();
    let scheme = conn.scheme().to_string();
    let host = conn.host().to_string();
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| req.uri().path());
    let raw = format!("{scheme}://{host}{path_and_query}");
    let url = raw
        .parse()
        .unwrap_or_else(|_| "http://invalid.mcpay.local/".parse().expect("static URL parses"));

    let headers = req
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    Inbound {
        method: req.method().clone(),
        url,
        headers,
        body,
    }
}

async fn proxy(req: HttpRequest, body: Bytes, data: web::Data<GatewayData>) -> HttpResponse {
    let inbound = build_inbound(&req, body);
    let request_id = inbound
        .header("x-request-id")
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut ctx = RequestContext::new(inbound, request_id.clone());
    let mut response = data.pipeline.run(&mut ctx).await;
    if !response.headers().contains_key("x-request-id") {
        if let Ok(value) = actix_web::http::header::HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(
                actix_web::http::header::HeaderName::from_static("x-request-id"),
                value,
            );
        }
    }
    response
}

async fn healthz() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Binds and runs the gateway HTTP server. Blocks until the server shuts
/// down (graceful shutdown is driven by the caller cancelling via a signal
/// handler wired around this future — see `main`).
pub async fn run(state: AppState) -> std::io::Result<()> {
    let bind_addr = state.config.server.bind_addr;
    let pipeline = Arc::new(build_default_pipeline(&state));
    let data = web::Data::new(GatewayData { pipeline });

    vlog::info!(%bind_addr, "starting mcpay gateway");

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(data.clone())
            .app_data(web::PayloadConfig::new(state.config.inspect.max_request_body_bytes * 2))
            .route("/healthz", web::get().to(healthz))
            .service(
                web::resource("/mcp/{public_id}/{tail:.*}")
                    .route(web::get().to(proxy))
                    .route(web::post().to(proxy))
                    .route(web::delete().to(proxy)),
            )
            .service(
                web::resource("/mcp/{public_id}")
                    .route(web::get().to(proxy))
                    .route(web::post().to(proxy))
                    .route(web::delete().to(proxy)),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}
