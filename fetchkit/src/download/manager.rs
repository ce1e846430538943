//! Download manager.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::error::DownloadError;
use super::group::DownloadGroup;
use super::handle::{CompletionCallback, Download, ProgressCallback};
use crate::transport::{merge_headers, Headers, ProgressSink, Response, Transport};

/// Call-level headers and callbacks for [`DownloadManager::download`].
#[derive(Clone, Default)]
pub struct DownloadOptions {
    /// Extra request headers; these win over global headers of the same name.
    pub headers: Headers,
    /// Called on every progress event, after the handle-level hooks.
    pub on_progress: Option<ProgressCallback>,
    /// Called once on completion, after the handle-level hooks.
    pub on_complete: Option<CompletionCallback>,
}

impl DownloadOptions {
    /// Options with no headers and no callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the request headers.
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Set the call-level progress callback.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(u64, Option<u64>) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Set the call-level completion callback.
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(Option<&DownloadError>, Option<&Response>) + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(callback));
        self
    }
}

/// Result of [`DownloadManager::download_unique`].
#[derive(Debug, Clone)]
pub enum DownloadStart {
    /// A new download was registered and started.
    Started(Download),
    /// A download for the URL was already pending; nothing was started.
    AlreadyPending(Download),
}

impl DownloadStart {
    /// The started or already-pending download.
    pub fn download(&self) -> &Download {
        match self {
            DownloadStart::Started(d) | DownloadStart::AlreadyPending(d) => d,
        }
    }

    /// Returns true if this call started the download.
    pub fn is_started(&self) -> bool {
        matches!(self, DownloadStart::Started(_))
    }
}

struct ManagerInner {
    transport: Arc<dyn Transport>,
    pending: RwLock<Vec<Download>>,
    global_headers: RwLock<Headers>,
    next_id: AtomicU64,
}

impl ManagerInner {
    /// Remove a download from the pending set. Returns false if absent.
    fn release(&self, id: u64) -> bool {
        let mut pending = self.pending.write();
        match pending.iter().position(|d| d.id() == id) {
            Some(index) => {
                pending.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Starts downloads and tracks them while they are pending.
///
/// Cloning yields another handle to the same manager. Construct one per
/// logical client and pass it to consumers; there is no process-wide
/// default instance.
///
/// Downloads run as Tokio tasks, so starting one requires a Tokio runtime.
#[derive(Clone)]
pub struct DownloadManager {
    inner: Arc<ManagerInner>,
}

impl DownloadManager {
    /// Create a manager on top of a transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                transport,
                pending: RwLock::new(Vec::new()),
                global_headers: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.inner.transport)
    }

    /// Set a header sent with every download, replacing any of the same name.
    pub fn set_global_header(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let mut headers = self.inner.global_headers.write();
        headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        headers.push((name, value.into()));
    }

    /// Remove a global header. Returns true if it was present.
    pub fn remove_global_header(&self, name: &str) -> bool {
        let mut headers = self.inner.global_headers.write();
        let before = headers.len();
        headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        headers.len() != before
    }

    /// Current global headers.
    pub fn global_headers(&self) -> Headers {
        self.inner.global_headers.read().clone()
    }

    /// True iff a pending download has this exact URL.
    ///
    /// Advisory: checking and then calling [`download`](Self::download) is
    /// not atomic. Use [`download_unique`](Self::download_unique) to start at
    /// most one download per URL.
    pub fn has_pending_download(&self, url: &str) -> bool {
        self.inner.pending.read().iter().any(|d| d.url() == url)
    }

    /// Number of pending downloads.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.read().len()
    }

    /// URLs of pending downloads, in start order.
    pub fn pending_urls(&self) -> Vec<String> {
        self.inner
            .pending
            .read()
            .iter()
            .map(|d| d.url().to_string())
            .collect()
    }

    /// Create an empty group bound to this manager. No I/O.
    pub fn create_group(&self) -> DownloadGroup {
        DownloadGroup::new(self.clone())
    }

    /// Start a GET download.
    ///
    /// The returned handle is already `Starting` and listed as pending.
    pub fn download(&self, url: &str, options: DownloadOptions) -> Download {
        let download = self.prepare(url);
        self.register(&download);
        self.start(download.clone(), options);
        download
    }

    /// Start a download unless one for the same URL is already pending.
    ///
    /// The check and the insert happen under one write lock, so concurrent
    /// callers for the same URL start exactly one download between them.
    pub fn download_unique(&self, url: &str, options: DownloadOptions) -> DownloadStart {
        let download = {
            let mut pending = self.inner.pending.write();
            if let Some(existing) = pending.iter().find(|d| d.url() == url) {
                return DownloadStart::AlreadyPending(existing.clone());
            }
            let download = self.prepare(url);
            download.mark_starting();
            pending.push(download.clone());
            download
        };

        self.start(download.clone(), options);
        DownloadStart::Started(download)
    }

    /// Allocate a handle without registering it.
    pub(crate) fn prepare(&self, url: &str) -> Download {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        Download::new(id, url)
    }

    /// Mark a handle `Starting` and add it to the pending set.
    pub(crate) fn register(&self, download: &Download) {
        download.mark_starting();
        self.inner.pending.write().push(download.clone());
    }

    /// Spawn the transfer for a registered handle.
    pub(crate) fn start(&self, download: Download, options: DownloadOptions) {
        let headers = merge_headers(&self.global_headers(), &options.headers);
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            let progress_target = download.clone();
            let call_progress = options.on_progress.clone();
            let sink: ProgressSink = Arc::new(move |bytes, total| {
                progress_target.record_progress(bytes, total, call_progress.as_ref());
            });

            debug!(id = download.id(), url = download.url(), "Download started");
            let outcome = inner.transport.get(download.url(), &headers, sink).await;

            download.finish(outcome);
            inner.release(download.id());

            match download.error() {
                Some(error) => warn!(
                    id = download.id(),
                    url = download.url(),
                    error = %error,
                    "Download failed"
                ),
                None => debug!(
                    id = download.id(),
                    url = download.url(),
                    bytes = download.bytes_downloaded(),
                    "Download completed"
                ),
            }

            download.notify_complete(options.on_complete.as_ref());
        });
    }
}

impl fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadManager")
            .field("pending", &self.pending_count())
            .field("global_headers", &self.global_headers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use parking_lot::Mutex;

    use crate::download::DownloadState;
    use crate::mock::{MockContent, MockMapping, MockService};
    use crate::transport::{BoxFuture, TransportError};

    /// Transport that records request headers and answers from a closure.
    struct RecordingTransport {
        seen_headers: Mutex<Vec<Headers>>,
        respond: Box<dyn Fn(&str) -> Result<Response, TransportError> + Send + Sync>,
    }

    impl Transport for RecordingTransport {
        fn get<'a>(
            &'a self,
            url: &'a str,
            headers: &'a [(String, String)],
            progress: ProgressSink,
        ) -> BoxFuture<'a, Result<Response, TransportError>> {
            Box::pin(async move {
                self.seen_headers.lock().push(headers.to_vec());
                let result = (self.respond)(url);
                if let Ok(response) = &result {
                    progress(response.body.len() as u64, Some(response.body.len() as u64));
                }
                result
            })
        }
    }

    fn recording(
        respond: impl Fn(&str) -> Result<Response, TransportError> + Send + Sync + 'static,
    ) -> Arc<RecordingTransport> {
        Arc::new(RecordingTransport {
            seen_headers: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        })
    }

    #[tokio::test]
    async fn test_download_completes_and_is_released() {
        let transport = recording(|_| {
            Ok(Response::new(200, vec![1, 2, 3, 4]).with_header("Content-Type", "image/png"))
        });
        let manager = DownloadManager::new(transport);

        let download = manager.download("http://x/a.png", DownloadOptions::new());
        let response = download.wait().await.unwrap();

        assert_eq!(response.body.len(), 4);
        assert_eq!(download.state(), DownloadState::Completed);
        assert_eq!(download.content_type().as_deref(), Some("image/png"));
        assert_eq!(download.bytes_downloaded(), 4);
        assert!(!manager.has_pending_download("http://x/a.png"));
        assert_eq!(manager.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_bad_status_fails_with_bad_response() {
        let manager = DownloadManager::new(recording(|_| Ok(Response::new(503, Vec::new()))));

        let download = manager.download("http://x/a.png", DownloadOptions::new());
        let err = download.wait().await.unwrap_err();

        assert_eq!(err, DownloadError::BadResponse { status: 503 });
        assert_eq!(download.state(), DownloadState::Failed);
    }

    #[tokio::test]
    async fn test_transport_error_fails() {
        let manager = DownloadManager::new(recording(|url| {
            Err(TransportError::Timeout {
                url: url.to_string(),
            })
        }));

        let download = manager.download("http://x/slow.png", DownloadOptions::new());
        let err = download.wait().await.unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(manager.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_caller_headers_override_global() {
        let transport = recording(|_| Ok(Response::new(200, Vec::new())));
        let manager = DownloadManager::new(transport.clone());
        manager.set_global_header("User-Agent", "global");
        manager.set_global_header("Accept", "image/*");

        let options = DownloadOptions::new().with_header("user-agent", "caller");
        manager
            .download("http://x/a.png", options)
            .wait()
            .await
            .unwrap();

        let seen = transport.seen_headers.lock();
        assert_eq!(
            seen[0],
            vec![
                ("Accept".to_string(), "image/*".to_string()),
                ("user-agent".to_string(), "caller".to_string()),
            ]
        );
    }

    #[test]
    fn test_global_header_replace_and_remove() {
        let manager = DownloadManager::new(recording(|_| Ok(Response::new(200, Vec::new()))));
        manager.set_global_header("X-Token", "a");
        manager.set_global_header("x-token", "b");
        assert_eq!(
            manager.global_headers(),
            vec![("x-token".to_string(), "b".to_string())]
        );

        assert!(manager.remove_global_header("X-TOKEN"));
        assert!(!manager.remove_global_header("X-TOKEN"));
        assert!(manager.global_headers().is_empty());
    }

    #[tokio::test]
    async fn test_both_callback_levels_fire() {
        let manager = DownloadManager::new(recording(|_| Ok(Response::new(200, vec![0u8; 8]))));

        let handle_progress = Arc::new(AtomicUsize::new(0));
        let call_progress = Arc::new(AtomicUsize::new(0));
        let call_complete = Arc::new(AtomicUsize::new(0));

        let call_progress_clone = Arc::clone(&call_progress);
        let call_complete_clone = Arc::clone(&call_complete);
        let options = DownloadOptions::new()
            .on_progress(move |bytes, total| {
                assert_eq!((bytes, total), (8, Some(8)));
                call_progress_clone.fetch_add(1, Ordering::SeqCst);
            })
            .on_complete(move |error, response| {
                assert!(error.is_none());
                assert_eq!(response.map(|r| r.status), Some(200));
                call_complete_clone.fetch_add(1, Ordering::SeqCst);
            });

        let download = manager.download("http://x/a.png", options);
        let handle_progress_clone = Arc::clone(&handle_progress);
        download.on_progress(move |_, _| {
            handle_progress_clone.fetch_add(1, Ordering::SeqCst);
        });

        download.wait().await.unwrap();
        // The completion callback runs right after the watch update
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(call_progress.load(Ordering::SeqCst), 1);
        assert_eq!(call_complete.load(Ordering::SeqCst), 1);
        assert!(handle_progress.load(Ordering::SeqCst) <= 1);
    }

    #[tokio::test]
    async fn test_download_unique_dedupes_pending_url() {
        let service = MockService::new()
            .with_latency(Duration::from_millis(50), Duration::from_millis(50));
        service.register(
            MockMapping::new("GET", "/img.png").success(MockContent::bytes("image/png", vec![1])),
        );
        let manager = DownloadManager::new(Arc::new(service.clone()));

        let first = manager.download_unique("http://x/img.png", DownloadOptions::new());
        let second = manager.download_unique("http://x/img.png", DownloadOptions::new());

        assert!(first.is_started());
        assert!(!second.is_started());
        assert_eq!(first.download().id(), second.download().id());

        first.download().wait().await.unwrap();
        assert_eq!(service.request_count("/img.png"), 1);
        assert!(!manager.has_pending_download("http://x/img.png"));
    }

    #[tokio::test]
    async fn test_plain_download_does_not_dedupe() {
        let service = MockService::new()
            .with_latency(Duration::from_millis(20), Duration::from_millis(20));
        service.register(
            MockMapping::new("GET", "/img.png").success(MockContent::bytes("image/png", vec![1])),
        );
        let manager = DownloadManager::new(Arc::new(service.clone()));

        let a = manager.download("http://x/img.png", DownloadOptions::new());
        assert!(manager.has_pending_download("http://x/img.png"));
        let b = manager.download("http://x/img.png", DownloadOptions::new());
        assert_ne!(a.id(), b.id());
        assert_eq!(manager.pending_count(), 2);

        a.wait().await.unwrap();
        b.wait().await.unwrap();
        assert_eq!(service.request_count("/img.png"), 2);
    }
}
