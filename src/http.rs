//! Plain request/response HTTP GET with timeouts and retry.
//!
//! A single [`HttpClient`] is shared by every fetch client. It sends browser-like
//! headers, applies a per-request timeout, and classifies failures into
//! [`NetworkError`] so the [`RetryPolicy`] can tell transient from permanent
//! errors. Connections are owned by the request future and are released when it
//! completes or is dropped.

use crate::error::NetworkError;
use crate::retry::{RetryPolicy, is_transient_status};
use crate::utils::truncate_for_log;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};
use url::Url;

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(user_agent: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .default_headers(headers)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to a default HTTP client");
                reqwest::Client::new()
            });
        Self { client }
    }

    /// One GET attempt returning the body text.
    #[instrument(level = "debug", skip_all, fields(%url))]
    pub async fn get_once(
        &self,
        url: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<String, NetworkError> {
        let parsed = Url::parse(url).map_err(|e| NetworkError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let t0 = Instant::now();
        let resp = self
            .client
            .get(parsed)
            .query(query)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let code = status.as_u16();
            return Err(if is_transient_status(code) {
                NetworkError::RetryableStatus {
                    url: url.to_string(),
                    status: code,
                }
            } else {
                NetworkError::Status {
                    url: url.to_string(),
                    status: code,
                }
            });
        }

        let body = resp.text().await.map_err(|e| classify(url, e))?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            preview = %truncate_for_log(&body, 120),
            "Fetched page"
        );
        Ok(body)
    }

    /// GET under `policy`, returning the body of the first successful attempt.
    pub async fn get_text(
        &self,
        url: &str,
        query: &[(&str, String)],
        timeout: Duration,
        policy: &RetryPolicy,
    ) -> Result<String, NetworkError> {
        policy.execute(|| self.get_once(url, query, timeout)).await
    }
}

fn classify(url: &str, e: reqwest::Error) -> NetworkError {
    let url = url.to_string();
    if e.is_timeout() {
        NetworkError::Timeout { url }
    } else if e.is_builder() {
        NetworkError::InvalidUrl {
            url,
            message: e.to_string(),
        }
    } else if e.is_body() || e.is_decode() {
        NetworkError::Body {
            url,
            message: e.to_string(),
        }
    } else {
        NetworkError::Connect {
            url,
            message: e.to_string(),
        }
    }
}
