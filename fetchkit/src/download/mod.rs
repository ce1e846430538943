//! Tracked HTTP downloads.
//!
//! This module provides:
//! - [`Download`]: a handle for one GET, with state, byte counters and a
//!   terminal error
//! - [`DownloadManager`]: starts downloads through a [`Transport`] and keeps
//!   the pending set
//! - [`DownloadGroup`]: aggregates progress and completion over N downloads
//!
//! # Architecture
//!
//! ```text
//! DownloadManager ──► pending: RwLock<Vec<Download>>
//!     │
//!     ├── download(url) ──► tokio task ──► Transport::get
//!     │                          │
//!     │                          ├── progress ──► handle hooks + call hooks
//!     │                          └── finish   ──► classify, release, notify
//!     │
//!     └── create_group() ──► DownloadGroup ──► notify_progress on every event
//! ```
//!
//! Progress and completion fan out to every subscriber: hooks registered on
//! the handle, the hooks passed in [`DownloadOptions`], and `watch` receivers
//! from [`Download::subscribe`].
//!
//! [`Transport`]: crate::transport::Transport

mod error;
mod group;
mod handle;
mod manager;
mod state;

pub use error::DownloadError;
pub use group::{DownloadGroup, GroupCompletionCallback, GroupProgressCallback};
pub use handle::{CompletionCallback, Download, ProgressCallback};
pub use manager::{DownloadManager, DownloadOptions, DownloadStart};
pub use state::{DownloadProgress, DownloadState};
