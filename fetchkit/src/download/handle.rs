//! Download handle.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use super::error::DownloadError;
use super::group::{DownloadGroup, GroupInner};
use super::state::{DownloadProgress, DownloadState};
use crate::transport::{Response, TransportError};

/// Progress hook: `(bytes_downloaded, total_size)`.
pub type ProgressCallback = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Completion hook: `(error, raw_response)`.
///
/// Bad responses carry both the error and the response that caused it.
pub type CompletionCallback = Arc<dyn Fn(Option<&DownloadError>, Option<&Response>) + Send + Sync>;

#[derive(Debug)]
struct Record {
    state: DownloadState,
    bytes_downloaded: u64,
    total_size: Option<u64>,
    content_type: Option<String>,
    error: Option<DownloadError>,
    response: Option<Arc<Response>>,
}

#[derive(Default)]
struct CompletionHooks {
    fired: bool,
    hooks: Vec<CompletionCallback>,
}

pub(crate) struct DownloadInner {
    id: u64,
    url: String,
    record: RwLock<Record>,
    progress_hooks: Mutex<Vec<ProgressCallback>>,
    completion: Mutex<CompletionHooks>,
    status: watch::Sender<DownloadProgress>,
    group: Mutex<Option<Weak<GroupInner>>>,
}

/// Handle to one HTTP GET.
///
/// Cloning is cheap and every clone observes the same download. The manager
/// keeps a clone while the download is pending and drops it once the
/// download is terminal; callers may keep theirs to inspect the final state.
#[derive(Clone)]
pub struct Download {
    inner: Arc<DownloadInner>,
}

impl Download {
    pub(crate) fn new(id: u64, url: impl Into<String>) -> Self {
        let (status, _) = watch::channel(DownloadProgress::default());
        Self {
            inner: Arc::new(DownloadInner {
                id,
                url: url.into(),
                record: RwLock::new(Record {
                    state: DownloadState::NotInitialized,
                    bytes_downloaded: 0,
                    total_size: None,
                    content_type: None,
                    error: None,
                    response: None,
                }),
                progress_hooks: Mutex::new(Vec::new()),
                completion: Mutex::new(CompletionHooks::default()),
                status,
                group: Mutex::new(None),
            }),
        }
    }

    /// Manager-assigned identifier, unique per manager.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The requested URL.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DownloadState {
        self.inner.record.read().state
    }

    /// Returns true once the download is `Completed` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Body bytes received so far.
    pub fn bytes_downloaded(&self) -> u64 {
        self.inner.record.read().bytes_downloaded
    }

    /// Announced body size, if known.
    pub fn total_size(&self) -> Option<u64> {
        self.inner.record.read().total_size
    }

    /// `Content-Type` of the response, available once terminal.
    pub fn content_type(&self) -> Option<String> {
        self.inner.record.read().content_type.clone()
    }

    /// Terminal error, if the download failed.
    pub fn error(&self) -> Option<DownloadError> {
        self.inner.record.read().error.clone()
    }

    /// Raw response, if one was received.
    pub fn response(&self) -> Option<Arc<Response>> {
        self.inner.record.read().response.clone()
    }

    /// Snapshot of state and byte counters.
    pub fn progress(&self) -> DownloadProgress {
        let record = self.inner.record.read();
        DownloadProgress {
            state: record.state,
            bytes_downloaded: record.bytes_downloaded,
            total_size: record.total_size,
        }
    }

    /// The group this download belongs to, if it is still alive.
    pub fn group(&self) -> Option<DownloadGroup> {
        self.inner
            .group
            .lock()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(DownloadGroup::from_inner)
    }

    /// Register a progress hook on this handle.
    pub fn on_progress<F>(&self, hook: F)
    where
        F: Fn(u64, Option<u64>) + Send + Sync + 'static,
    {
        self.inner.progress_hooks.lock().push(Arc::new(hook));
    }

    /// Register a completion hook on this handle.
    ///
    /// Fires exactly once. If the download is already terminal the hook runs
    /// immediately on the calling thread.
    pub fn on_complete<F>(&self, hook: F)
    where
        F: Fn(Option<&DownloadError>, Option<&Response>) + Send + Sync + 'static,
    {
        let mut completion = self.inner.completion.lock();
        if completion.fired {
            drop(completion);
            let (error, response) = self.outcome();
            hook(error.as_ref(), response.as_deref());
        } else {
            completion.hooks.push(Arc::new(hook));
        }
    }

    /// Watch state and byte counters.
    ///
    /// The receiver reaches a terminal state only after the manager has
    /// released the download from its pending set.
    pub fn subscribe(&self) -> watch::Receiver<DownloadProgress> {
        self.inner.status.subscribe()
    }

    /// Wait until the download is terminal and return its outcome.
    pub async fn wait(&self) -> Result<Arc<Response>, DownloadError> {
        let mut rx = self.subscribe();
        let _ = rx.wait_for(|p| p.state.is_terminal()).await;

        match self.outcome() {
            (Some(error), _) => Err(error),
            (None, Some(response)) => Ok(response),
            (None, None) => Err(DownloadError::Transport(TransportError::Network {
                url: self.url().to_string(),
                reason: "download finished without a response".to_string(),
            })),
        }
    }

    fn outcome(&self) -> (Option<DownloadError>, Option<Arc<Response>>) {
        let record = self.inner.record.read();
        (record.error.clone(), record.response.clone())
    }

    pub(crate) fn set_group(&self, group: Weak<GroupInner>) {
        *self.inner.group.lock() = Some(group);
    }

    /// Apply a state transition; returns false if it would break monotonicity.
    fn transition(record: &mut Record, next: DownloadState) -> bool {
        if record.state.can_transition_to(next) {
            record.state = next;
            true
        } else {
            false
        }
    }

    pub(crate) fn mark_starting(&self) {
        let progress = {
            let mut record = self.inner.record.write();
            if !Self::transition(&mut record, DownloadState::Starting) {
                return;
            }
            DownloadProgress {
                state: record.state,
                bytes_downloaded: record.bytes_downloaded,
                total_size: record.total_size,
            }
        };
        self.inner.status.send_replace(progress);
    }

    /// Record a progress event and fan it out.
    pub(crate) fn record_progress(
        &self,
        bytes_downloaded: u64,
        total_size: Option<u64>,
        call_hook: Option<&ProgressCallback>,
    ) {
        let progress = {
            let mut record = self.inner.record.write();
            if !Self::transition(&mut record, DownloadState::InProgress) {
                return;
            }
            record.bytes_downloaded = bytes_downloaded;
            if total_size.is_some() {
                record.total_size = total_size;
            }
            DownloadProgress {
                state: record.state,
                bytes_downloaded: record.bytes_downloaded,
                total_size: record.total_size,
            }
        };
        self.inner.status.send_replace(progress);

        let hooks = self.inner.progress_hooks.lock().clone();
        for hook in hooks.iter().chain(call_hook) {
            hook(progress.bytes_downloaded, progress.total_size);
        }
    }

    /// Classify the transport outcome and store it. Does not notify.
    ///
    /// Returns false if the download was already terminal.
    pub(crate) fn finish(&self, outcome: Result<Response, TransportError>) -> bool {
        let mut record = self.inner.record.write();
        if record.state.is_terminal() {
            return false;
        }

        match outcome {
            Ok(response) => {
                record.content_type = response.content_type().map(str::to_string);
                if record.total_size.is_none() {
                    record.total_size = Some(response.body.len() as u64);
                }
                record.bytes_downloaded = record.bytes_downloaded.max(response.body.len() as u64);
                if response.is_success() {
                    record.state = DownloadState::Completed;
                } else {
                    record.error = Some(DownloadError::BadResponse {
                        status: response.status,
                    });
                    record.state = DownloadState::Failed;
                }
                record.response = Some(Arc::new(response));
            }
            Err(e) => {
                record.error = Some(DownloadError::Transport(e));
                record.state = DownloadState::Failed;
            }
        }
        true
    }

    /// Publish the terminal state and fire completion hooks exactly once.
    pub(crate) fn notify_complete(&self, call_hook: Option<&CompletionCallback>) {
        self.inner.status.send_replace(self.progress());

        let hooks = {
            let mut completion = self.inner.completion.lock();
            if completion.fired {
                return;
            }
            completion.fired = true;
            std::mem::take(&mut completion.hooks)
        };

        let (error, response) = self.outcome();
        for hook in hooks.iter().chain(call_hook) {
            hook(error.as_ref(), response.as_deref());
        }
    }
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.inner.record.read();
        f.debug_struct("Download")
            .field("id", &self.inner.id)
            .field("url", &self.inner.url)
            .field("state", &record.state)
            .field("bytes_downloaded", &record.bytes_downloaded)
            .field("total_size", &record.total_size)
            .finish()
    }
}
