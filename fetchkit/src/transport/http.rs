//! reqwest-backed transport.

use std::time::Duration;

use futures_util::StreamExt;
use tracing::debug;

use super::error::TransportError;
use super::types::{BoxFuture, ProgressSink, Response, Transport};

/// Default overall timeout for a single request in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Real transport implementation using the async reqwest client.
///
/// The timeout applies per request, not per logical download.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Creates a transport with the default timeout and user agent.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a transport with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        Self::with_options(timeout, &default_user_agent())
    }

    /// Creates a transport with a custom timeout and user agent.
    pub fn with_options(timeout: Duration, user_agent: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| TransportError::Network {
                url: String::new(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, timeout })
    }

    /// The configured per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn map_error(url: &str, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
            }
        } else {
            TransportError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }

    async fn fetch(
        &self,
        url: &str,
        headers: &[(String, String)],
        progress: ProgressSink,
    ) -> Result<Response, TransportError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| Self::map_error(url, e))?;

        let status = response.status().as_u16();
        let total_size = response.content_length();
        let response_headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let mut body = Vec::with_capacity(total_size.unwrap_or(0).min(16 * 1024 * 1024) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    TransportError::Body {
                        url: url.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;
            body.extend_from_slice(&chunk);
            progress(body.len() as u64, total_size);
        }

        debug!(url, status, bytes = body.len(), "GET finished");

        Ok(Response {
            status,
            headers: response_headers,
            body: body.into(),
        })
    }
}

impl Transport for ReqwestTransport {
    fn get<'a>(
        &'a self,
        url: &'a str,
        headers: &'a [(String, String)],
        progress: ProgressSink,
    ) -> BoxFuture<'a, Result<Response, TransportError>> {
        Box::pin(self.fetch(url, headers, progress))
    }
}

fn default_user_agent() -> String {
    format!("fetchkit/{}", crate::VERSION)
}
