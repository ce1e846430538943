//! Cache notifications.

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::warn;

/// A change in the memory tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// The image for `key` entered the memory tier, from disk, network,
    /// an explicit put or a thumbnail decode.
    Loaded { key: String },
    /// A network load for `key` failed. Disk misses never produce this.
    LoadFailed { key: String, reason: String },
}

impl CacheEvent {
    pub fn key(&self) -> &str {
        match self {
            CacheEvent::Loaded { key } | CacheEvent::LoadFailed { key, .. } => key,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, CacheEvent::Loaded { .. })
    }
}

/// Receiver for cache events, optionally filtered to one key.
///
/// Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct CacheSubscription {
    rx: broadcast::Receiver<CacheEvent>,
    key: Option<String>,
}

impl CacheSubscription {
    pub(crate) fn new(rx: broadcast::Receiver<CacheEvent>, key: Option<String>) -> Self {
        Self { rx, key }
    }

    /// The key this subscription is filtered to, if any.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn wants(&self, event: &CacheEvent) -> bool {
        self.key.as_deref().map_or(true, |key| key == event.key())
    }

    /// Next matching event. `None` once the cache is gone.
    ///
    /// Events missed because the subscriber fell behind are skipped.
    pub async fn recv(&mut self) -> Option<CacheEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Cache subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event if one is already queued.
    pub fn try_recv(&mut self) -> Option<CacheEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Cache subscriber lagged, events dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(key: &str) -> CacheEvent {
        CacheEvent::Loaded {
            key: key.to_string(),
        }
    }

    #[test]
    fn test_event_key() {
        assert_eq!(loaded("a").key(), "a");
        let failed = CacheEvent::LoadFailed {
            key: "b".to_string(),
            reason: "404".to_string(),
        };
        assert_eq!(failed.key(), "b");
        assert!(!failed.is_loaded());
    }

    #[tokio::test]
    async fn test_keyed_subscription_filters() {
        let (tx, _) = broadcast::channel(16);
        let mut all = CacheSubscription::new(tx.subscribe(), None);
        let mut only_b = CacheSubscription::new(tx.subscribe(), Some("b".to_string()));

        tx.send(loaded("a")).unwrap();
        tx.send(loaded("b")).unwrap();

        assert_eq!(all.recv().await, Some(loaded("a")));
        assert_eq!(all.recv().await, Some(loaded("b")));
        assert_eq!(only_b.recv().await, Some(loaded("b")));
        assert_eq!(only_b.try_recv(), None);
    }

    #[tokio::test]
    async fn test_lagged_subscriber_keeps_receiving() {
        let (tx, _) = broadcast::channel(2);
        let mut sub = CacheSubscription::new(tx.subscribe(), None);

        for key in ["a", "b", "c", "d"] {
            tx.send(loaded(key)).unwrap();
        }

        assert_eq!(sub.recv().await, Some(loaded("c")));
        assert_eq!(sub.recv().await, Some(loaded("d")));
    }

    #[tokio::test]
    async fn test_closed_channel_ends() {
        let (tx, rx) = broadcast::channel::<CacheEvent>(2);
        let mut sub = CacheSubscription::new(rx, None);
        drop(tx);
        assert_eq!(sub.recv().await, None);
    }
}
