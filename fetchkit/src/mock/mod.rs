//! Simulated REST service.
//!
//! [`MockService`] answers requests from registered [`MockMapping`]s after a
//! random latency, failing a configurable fraction of them. It also
//! implements [`Transport`](crate::transport::Transport), so a
//! [`DownloadManager`](crate::download::DownloadManager) or an image cache can
//! run against it without a network.
//!
//! ```ignore
//! let service = MockService::new().with_failure_probability(0.1);
//! service.register(
//!     MockMapping::new("POST", "/update")
//!         .precondition("age", 17)
//!         .success(MockContent::json(&json!({"ok": true})))
//!         .failure(MockContent::json(&json!({"error": "too young"}))),
//! );
//! let response = service.request("POST", "/update", json!({"age": 17})).await;
//! assert!(!response.success);
//! ```

mod mapping;
mod service;

pub use mapping::{MockContent, MockMapping, MockResponse};
pub use service::MockService;
