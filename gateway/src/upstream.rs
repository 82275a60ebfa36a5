//! The single-attempt upstream HTTP client. `Retry`
//! wraps repeated calls to `execute`; this module only knows how to issue
//! one request and buffer its response.

use async_trait::async_trait;
use bytes::Bytes;

use crate::context::UpstreamRequest;

#[derive(Debug, Clone)]
pub struct RawUpstreamResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn execute(&self, request: &UpstreamRequest) -> Result<RawUpstreamResponse, anyhow::Error>;
}

pub struct ReqwestUpstreamClient {
    client: reqwest::Client,
}

impl ReqwestUpstreamClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UpstreamClient for ReqwestUpstreamClient {
    async fn execute(&self, request: &UpstreamRequest) -> Result<RawUpstreamResponse, anyhow::Error> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())?;
        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let body = response.bytes().await?;

        Ok(RawUpstreamResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}
