use std::fmt;
use std::time::Duration;

use relay_config::SourceConfig;
use relay_core::errors::SyncError;
use serde_json::Value;

use crate::adapter::RateLimitHint;
use crate::http::{check_response, parse_rate_limit, transport_error};

/// Authenticated HTTP client for one source API.
#[derive(Clone)]
pub struct SourceClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl fmt::Debug for SourceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl SourceClient {
    /// Create a client for `config`. `timeout` bounds each request end to end.
    ///
    /// # Panics
    ///
    /// Panics if the underlying `reqwest::Client` fails to build.
    #[must_use]
    pub fn new(config: &SourceConfig, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .user_agent(concat!("relay/", env!("CARGO_PKG_VERSION")))
                .timeout(timeout)
                .build()
                .expect("reqwest client should build"),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `path` must start with `/` and carry its own (encoded) query string.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET `path` and decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the classified [`SyncError`] for transport failures, error
    /// statuses, and bodies that are not JSON.
    pub async fn get_json(&self, path: &str) -> Result<(Value, Option<RateLimitHint>), SyncError> {
        let url = self.url(path);
        tracing::debug!(%url, "source request");

        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| transport_error(&e))?;
        let resp = check_response(resp).await?;
        let hint = parse_rate_limit(resp.headers());

        let bytes = resp.bytes().await.map_err(|e| transport_error(&e))?;
        let body = serde_json::from_slice(&bytes).map_err(|e| {
            SyncError::sync_operation(
                "decode_page",
                format!("response from {url} is not valid JSON: {e}"),
                false,
            )
        })?;
        Ok((body, hint))
    }
}
