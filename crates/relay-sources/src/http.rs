//! Shared HTTP response helpers for source adapters.
//!
//! Maps status codes onto the error taxonomy (401, 403, 429 with
//! `Retry-After` parsing, other non-success) and reads the rate-limit
//! headers sources attach to successful pages.

use relay_core::errors::SyncError;
use reqwest::header::HeaderMap;
use serde_json::{Value, json};

use crate::adapter::RateLimitHint;

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Check an HTTP response for error statuses.
///
/// Returns the response unchanged on success. Otherwise:
/// - **401** → [`SyncError::Authentication`]
/// - **403** → [`SyncError::Authorization`]
/// - **429** → rate-limited [`SyncError::RemoteApi`], `Retry-After` parsed
///   as seconds (60 s if absent or unparseable)
/// - **other non-success** → [`SyncError::RemoteApi`] with the status and
///   response body attached
pub async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, SyncError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let code = status.as_u16();
    let retry_after = parse_retry_after(resp.headers());
    let body = resp.text().await.unwrap_or_default();

    Err(match code {
        401 => SyncError::authentication(error_text(code, &body)),
        403 => SyncError::authorization(error_text(code, &body)),
        429 => SyncError::rate_limited(retry_after, response_data(&body)),
        _ => SyncError::remote_api(code, error_text(code, &body), response_data(&body)),
    })
}

/// Classify a transport-level failure. Timeouts and connection errors are
/// retryable network failures; a body that is not JSON is a decode failure.
pub fn transport_error(error: &reqwest::Error) -> SyncError {
    if error.is_decode() {
        SyncError::sync_operation("decode_page", error.to_string(), false)
    } else {
        SyncError::network(error.to_string())
    }
}

/// Read `X-RateLimit-Remaining` / `X-RateLimit-Reset`. `None` when neither
/// header is present.
pub fn parse_rate_limit(headers: &HeaderMap) -> Option<RateLimitHint> {
    let remaining = header_u64(headers, "x-ratelimit-remaining");
    let reset_after_secs = header_u64(headers, "x-ratelimit-reset");
    if remaining.is_none() && reset_after_secs.is_none() {
        return None;
    }
    Some(RateLimitHint {
        remaining,
        reset_after_secs,
    })
}

fn parse_retry_after(headers: &HeaderMap) -> u64 {
    header_u64(headers, reqwest::header::RETRY_AFTER.as_str()).unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// JSON error bodies are kept as-is; anything else is wrapped as text.
fn response_data(body: &str) -> Option<Value> {
    if body.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(body).unwrap_or_else(|_| json!({ "body": body })))
}

fn error_text(status: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("source returned HTTP {status}")
    } else {
        format!("source returned HTTP {status}: {body}")
    }
}
