//! Serial disk queue.
//!
//! Every disk operation of one cache runs through its queue, one at a time,
//! in submission order. A single worker task pulls jobs off an unbounded
//! channel and runs each on the blocking pool before taking the next.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone)]
pub(crate) struct DiskQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl DiskQueue {
    /// Start the worker. Must be called within a Tokio runtime.
    ///
    /// The worker exits once every handle to the queue has been dropped and
    /// the remaining jobs have run.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if let Err(e) = tokio::task::spawn_blocking(job).await {
                    warn!(error = %e, "Disk job panicked");
                }
            }
            debug!("Disk queue worker stopped");
        });
        Self { tx }
    }

    /// Queue `f`; the receiver yields its result once it has run.
    pub fn run<T, F>(&self, f: F) -> oneshot::Receiver<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            let _ = tx.send(f());
        });
        if self.tx.send(job).is_err() {
            warn!("Disk queue worker is gone, job dropped");
        }
        rx
    }

    /// Wait until every job queued before this call has finished.
    pub async fn flush(&self) {
        let _ = self.run(|| ()).await;
    }
}
