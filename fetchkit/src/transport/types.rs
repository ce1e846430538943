//! Transport trait and response type.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

use super::error::TransportError;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Receives cumulative byte progress: `(bytes_received, total_size)`.
///
/// `total_size` is `None` when the server did not announce a length.
pub type ProgressSink = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// A complete HTTP response, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response headers in arrival order.
    pub headers: Vec<(String, String)>,
    /// Full response body.
    pub body: Bytes,
}

impl Response {
    /// Create a response with no headers.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Add a header, builder style.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The `Content-Type` header, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// True for statuses in `[200, 300)`.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP GET transport used by the download manager.
///
/// Implementations handle redirects, timeouts and connection reuse. They
/// report progress through the sink as body bytes arrive and return the
/// response for every status code; only failures that prevent a complete
/// response become [`TransportError`]s.
pub trait Transport: Send + Sync {
    /// Perform a GET request.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    /// * `headers` - Fully merged request headers
    /// * `progress` - Called with cumulative byte counts
    fn get<'a>(
        &'a self,
        url: &'a str,
        headers: &'a [(String, String)],
        progress: ProgressSink,
    ) -> BoxFuture<'a, Result<Response, TransportError>>;
}
