use mcpay_utils::{get_env, parse_env};
use std::net::SocketAddr;
use url::Url;

/// Process-wide bind address and the gateway's own public origin, used as
/// the `Referer`/`Origin` pair injected at the `BrowserHeaders` stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub gateway_origin: Url,
    pub metrics_port: Option<u16>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: parse_env("GATEWAY_BIND_ADDR"),
            gateway_origin: get_env("GATEWAY_ORIGIN")
                .parse()
                .expect("GATEWAY_ORIGIN must be an absolute URL"),
            metrics_port: std::env::var("METRICS_PORT")
                .ok()
                .map(|v| v.parse().expect("METRICS_PORT must be a u16")),
        }
    }
}
