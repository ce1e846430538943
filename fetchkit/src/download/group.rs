//! Download groups.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::debug;

use super::error::DownloadError;
use super::handle::Download;
use super::manager::{DownloadManager, DownloadOptions};
use crate::transport::{Headers, Response};

/// Group progress hook: `(total_bytes_downloaded, progress)`, progress in [0, 1].
pub type GroupProgressCallback = Arc<dyn Fn(u64, f64) + Send + Sync>;

/// Group completion hook: `(error_count)`.
pub type GroupCompletionCallback = Arc<dyn Fn(usize) + Send + Sync>;

/// Aggregate over the members at one instant.
struct Summary {
    total_bytes: u64,
    progress: f64,
    error_count: usize,
    all_terminal: bool,
}

pub(crate) struct GroupInner {
    manager: DownloadManager,
    downloads: RwLock<Vec<Download>>,
    progress_callback: RwLock<Option<GroupProgressCallback>>,
    completion_callback: RwLock<Option<GroupCompletionCallback>>,
    completion_fired: AtomicBool,
}

impl GroupInner {
    fn summary(&self) -> Summary {
        let downloads = self.downloads.read();
        let count = downloads.len();

        let mut total_bytes = 0u64;
        let mut fraction_sum = 0.0;
        let mut error_count = 0;
        let mut all_terminal = count > 0;

        for download in downloads.iter() {
            let progress = download.progress();
            total_bytes += progress.bytes_downloaded;
            fraction_sum += progress.fraction();
            if download.error().is_some() {
                error_count += 1;
            }
            if !progress.state.is_terminal() {
                all_terminal = false;
            }
        }

        let progress = if count == 0 {
            0.0
        } else {
            fraction_sum / count as f64
        };

        Summary {
            total_bytes,
            progress,
            error_count,
            all_terminal,
        }
    }

    /// Fire the completion hook if every member is terminal and it has not
    /// fired yet.
    fn maybe_complete(&self, summary: &Summary) {
        if !summary.all_terminal {
            return;
        }
        let Some(callback) = self.completion_callback.read().clone() else {
            return;
        };
        if self.completion_fired.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(
            members = self.downloads.read().len(),
            errors = summary.error_count,
            "Download group completed"
        );
        callback(summary.error_count);
    }

    /// Recompute the aggregate and notify. Runs on every member event.
    fn notify_progress(&self) {
        let summary = self.summary();
        self.maybe_complete(&summary);

        // Release the lock first; the callback may replace itself
        let callback = self.progress_callback.read().clone();
        if let Some(callback) = callback {
            callback(summary.total_bytes, summary.progress);
        }
    }
}

/// A set of downloads reported as one.
///
/// Created by [`DownloadManager::create_group`]. Clones share the same group.
/// The group owns its members; each member holds only a weak back-reference.
#[derive(Clone)]
pub struct DownloadGroup {
    inner: Arc<GroupInner>,
}

impl DownloadGroup {
    pub(crate) fn new(manager: DownloadManager) -> Self {
        Self {
            inner: Arc::new(GroupInner {
                manager,
                downloads: RwLock::new(Vec::new()),
                progress_callback: RwLock::new(None),
                completion_callback: RwLock::new(None),
                completion_fired: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<GroupInner>) -> Self {
        Self { inner }
    }

    /// Set the progress callback, called on every member event.
    pub fn on_progress<F>(&self, callback: F)
    where
        F: Fn(u64, f64) + Send + Sync + 'static,
    {
        *self.inner.progress_callback.write() = Some(Arc::new(callback));
    }

    /// Set the completion callback.
    ///
    /// It fires exactly once, when every member is `Completed` or `Failed`.
    /// If that is already the case it fires immediately.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        *self.inner.completion_callback.write() = Some(Arc::new(callback));
        let summary = self.inner.summary();
        self.inner.maybe_complete(&summary);
    }

    /// Start a download through the owning manager and add it to the group.
    ///
    /// The download is listed before its transfer starts.
    pub fn download(&self, url: &str, headers: Headers) -> Download {
        let manager = &self.inner.manager;
        let download = manager.prepare(url);
        download.set_group(Arc::downgrade(&self.inner));
        self.inner.downloads.write().push(download.clone());
        manager.register(&download);

        let on_progress = Arc::downgrade(&self.inner);
        let on_complete = Weak::clone(&on_progress);
        let options = DownloadOptions::new()
            .with_headers(headers)
            .on_progress(move |_, _| {
                if let Some(group) = on_progress.upgrade() {
                    group.notify_progress();
                }
            })
            .on_complete(move |_, _| {
                if let Some(group) = on_complete.upgrade() {
                    group.notify_progress();
                }
            });

        manager.start(download.clone(), options);
        download
    }

    /// Wait for every current member, returning outcomes in member order.
    ///
    /// Members added while waiting are not included.
    pub async fn wait_all(&self) -> Vec<Result<Arc<Response>, DownloadError>> {
        let downloads = self.downloads();
        futures::future::join_all(downloads.iter().map(Download::wait)).await
    }

    /// Members, in the order they were added.
    pub fn downloads(&self) -> Vec<Download> {
        self.inner.downloads.read().clone()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.inner.downloads.read().len()
    }

    /// Returns true if the group has no members.
    pub fn is_empty(&self) -> bool {
        self.inner.downloads.read().is_empty()
    }

    /// Sum of `bytes_downloaded` over members.
    pub fn total_bytes_downloaded(&self) -> u64 {
        self.inner.summary().total_bytes
    }

    /// Mean of the members' clamped fractions. A member with an unknown total
    /// contributes 0. An empty group reports 0.
    pub fn progress(&self) -> f64 {
        self.inner.summary().progress
    }

    /// Number of members that failed.
    pub fn error_count(&self) -> usize {
        self.inner.summary().error_count
    }

    /// True iff the group is non-empty and every member is `Completed` or
    /// `Failed`. Uses the same definition as the completion callback; check
    /// [`error_count`](Self::error_count) to tell success from failure.
    pub fn completed(&self) -> bool {
        self.inner.summary().all_terminal
    }

    /// The manager this group starts downloads on.
    pub fn manager(&self) -> &DownloadManager {
        &self.inner.manager
    }
}

impl fmt::Debug for DownloadGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadGroup")
            .field("members", &self.len())
            .field("completed", &self.completed())
            .finish()
    }
}
