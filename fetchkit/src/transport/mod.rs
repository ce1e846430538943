//! HTTP transport abstraction.
//!
//! The download layer only needs GET-with-progress plus status and header
//! inspection. [`Transport`] is that seam: [`ReqwestTransport`] talks to the
//! network, while [`crate::mock::MockService`] stands in for it in tests.
//!
//! The trait uses `Pin<Box<dyn Future>>` so it can live behind
//! `Arc<dyn Transport>` inside the download manager.

mod error;
mod headers;
mod http;
mod types;

pub use error::TransportError;
pub use headers::{merge_headers, Headers};
pub use http::{ReqwestTransport, DEFAULT_TIMEOUT_SECS};
pub use types::{BoxFuture, ProgressSink, Response, Transport};
