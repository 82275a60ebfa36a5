//! Shared helper for mirroring a buffered `UpstreamResponse` back to the
//! client verbatim: status, headers and body copied as-is,
//! plus whatever extra headers the caller (cache hit or `PaymentCapture`)
//! wants appended, such as `X-PAYMENT-RESPONSE`.

use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::HttpResponse;

use crate::context::UpstreamResponse;

const SUPPRESSED: &[&str] = &["content-length", "transfer-encoding", "connection"];

pub fn mirror(resp: &UpstreamResponse, extra_headers: &[(String, String)]) -> HttpResponse {
    let mut builder = HttpResponse::build(resp.status);
    for (name, value) in resp.headers.iter().chain(extra_headers.iter()) {
        if SUPPRESSED.contains(&name.to_ascii_lowercase().as_str()) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            builder.append_header((name, value));
        }
    }
    builder.body(resp.body.clone())
}
