//! Download state and progress snapshots.

use serde::Serialize;

/// Lifecycle state of a download.
///
/// Transitions are monotonic:
/// `NotInitialized → Starting → InProgress* → {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    /// Created but not yet registered with a manager.
    NotInitialized,
    /// Registered; the request has not produced bytes yet.
    Starting,
    /// Receiving body bytes.
    InProgress,
    /// Failed with a transport error or bad status.
    Failed,
    /// Finished with a 2xx response.
    Completed,
}

impl DownloadState {
    /// Returns true for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadState::Completed | DownloadState::Failed)
    }

    /// Whether moving from `self` to `next` respects the lifecycle.
    ///
    /// `InProgress → InProgress` is allowed (repeated progress events);
    /// nothing leaves a terminal state.
    pub fn can_transition_to(&self, next: DownloadState) -> bool {
        use DownloadState::*;
        match (self, next) {
            (Completed | Failed, _) => false,
            (InProgress, InProgress) => true,
            (InProgress, Completed | Failed) => true,
            (InProgress, _) => false,
            (Starting, InProgress | Completed | Failed) => true,
            (Starting, _) => false,
            (NotInitialized, NotInitialized) => false,
            (NotInitialized, _) => true,
        }
    }
}

/// Point-in-time view of a download.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DownloadProgress {
    /// Current state.
    pub state: DownloadState,
    /// Body bytes received so far.
    pub bytes_downloaded: u64,
    /// Announced body size, if known.
    pub total_size: Option<u64>,
}

impl DownloadProgress {
    /// Fraction in `[0, 1]`; 0 when the total size is unknown or zero.
    pub fn fraction(&self) -> f64 {
        match self.total_size {
            Some(total) if total > 0 => (self.bytes_downloaded as f64 / total as f64).min(1.0),
            _ => 0.0,
        }
    }
}

impl Default for DownloadProgress {
    fn default() -> Self {
        Self {
            state: DownloadState::NotInitialized,
            bytes_downloaded: 0,
            total_size: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(DownloadState::Completed.is_terminal());
        assert!(DownloadState::Failed.is_terminal());
        assert!(!DownloadState::Starting.is_terminal());
        assert!(!DownloadState::InProgress.is_terminal());
        assert!(!DownloadState::NotInitialized.is_terminal());
    }

    #[test]
    fn test_transitions_are_monotonic() {
        use DownloadState::*;
        assert!(NotInitialized.can_transition_to(Starting));
        assert!(Starting.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(Starting.can_transition_to(Failed));

        assert!(!InProgress.can_transition_to(Starting));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(InProgress));
    }

    #[test]
    fn test_fraction() {
        let mut progress = DownloadProgress {
            state: DownloadState::InProgress,
            bytes_downloaded: 500,
            total_size: Some(1000),
        };
        assert_eq!(progress.fraction(), 0.5);

        progress.total_size = None;
        assert_eq!(progress.fraction(), 0.0);

        progress.total_size = Some(0);
        assert_eq!(progress.fraction(), 0.0);

        // Servers occasionally under-announce; never report past 100%
        progress.total_size = Some(100);
        assert_eq!(progress.fraction(), 1.0);
    }
}
