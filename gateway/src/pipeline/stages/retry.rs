//! `Retry`. Implemented as the function the
//! `Upstream` stage (position 11) calls to issue its request, rather than
//! a standalone pipeline position: retrying is a property of *how* the
//! one upstream attempt in `Upstream` is carried out, not a separate
//! transition on `RequestContext` — there is nothing for an intermediate
//! stage to read or write between one 429 and the next attempt.

use std::time::Duration;

use mcpay_config::RetryConfig;
use rand::Rng;

use crate::context::UpstreamRequest;
use crate::upstream::{RawUpstreamResponse, UpstreamClient};

/// Issues `request` through `client`, retrying only on `429` with
/// exponential backoff plus jitter, up to `config.max_retries` additional
/// attempts (`MAX_RETRIES + 1` total). Network errors propagate
/// immediately without retry.
pub async fn fetch_with_retry(
    client: &dyn UpstreamClient,
    request: &UpstreamRequest,
    config: &RetryConfig,
) -> Result<RawUpstreamResponse, anyhow::Error> {
    let mut attempt = 0u32;
    loop {
        let response = client.execute(request).await?;
        if response.status != 429 || attempt >= config.max_retries {
            return Ok(response);
        }

        let backoff_ms = config.base_retry_delay_ms.saturating_mul(1u64 << attempt);
        let jitter_ms: u64 = rand::thread_rng().gen_range(0..1000);
        tokio::time::sleep(Duration::from_millis(backoff_ms + jitter_ms)).await;
        attempt += 1;
        metrics::increment_counter!("gateway.upstream.retry_attempt");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedClient {
        statuses: Vec<u16>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl UpstreamClient for ScriptedClient {
        async fn execute(&self, _request: &UpstreamRequest) -> Result<RawUpstreamResponse, anyhow::Error> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            let status = *self.statuses.get(i).unwrap_or(self.statuses.last().unwrap());
            Ok(RawUpstreamResponse {
                status,
                status_text: String::new(),
                headers: vec![],
                body: Bytes::new(),
            })
        }
    }

    fn sample_request() -> UpstreamRequest {
        UpstreamRequest {
            url: "https://example.com/".parse().unwrap(),
            method: actix_web::http::Method::GET,
            headers: vec![],
            body: Bytes::new(),
        }
    }

    #[tokio::test]
    async fn stops_immediately_on_non_429() {
        let client = ScriptedClient { statuses: vec![200], calls: AtomicU32::new(0) };
        let config = RetryConfig { max_retries: 3, base_retry_delay_ms: 1 };
        let response = fetch_with_retry(&client, &sample_request(), &config).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_429_up_to_max_retries_then_returns_last() {
        let client = ScriptedClient { statuses: vec![429, 429, 429, 429], calls: AtomicU32::new(0) };
        let config = RetryConfig { max_retries: 3, base_retry_delay_ms: 1 };
        let response = fetch_with_retry(&client, &sample_request(), &config).await.unwrap();
        assert_eq!(response.status, 429);
        assert_eq!(client.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn recovers_after_one_429() {
        let client = ScriptedClient { statuses: vec![429, 200], calls: AtomicU32::new(0) };
        let config = RetryConfig { max_retries: 3, base_retry_delay_ms: 1 };
        let response = fetch_with_retry(&client, &sample_request(), &config).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }
}
