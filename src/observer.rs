//! Observer trait for session events.
//!
//! Inject an [`Arc<dyn SessionObserver>`] via
//! [`crate::config::SessionConfigBuilder::observer`] to receive events as
//! files are admitted, animated and analysed. The core never shows toasts or
//! progress bars itself; a shell forwards these events to whatever it draws
//! with.
//!
//! # Example
//!
//! ```rust
//! use scanalyze::{SessionConfig, SessionObserver};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct RemovalCounter {
//!     removed: AtomicUsize,
//! }
//!
//! impl SessionObserver for RemovalCounter {
//!     fn on_file_removed(&self, _file: &scanalyze::FileSummary) {
//!         self.removed.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(RemovalCounter { removed: AtomicUsize::new(0) });
//! let config = SessionConfig::builder()
//!     .observer(counter as Arc<dyn SessionObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::IntakeError;
use crate::file::{FileId, FileSummary};
use std::sync::Arc;

/// Called by the session as its state changes.
///
/// Implementations must be `Send + Sync`: progress ticks arrive from spawned
/// tokio tasks. All methods have default no-op implementations so callers
/// only override what they care about.
///
/// The session never holds its state lock while calling an observer, so an
/// implementation may call back into the session.
pub trait SessionObserver: Send + Sync {
    /// A file passed intake and joined the working set.
    fn on_file_admitted(&self, file: &FileSummary) {
        let _ = file;
    }

    /// A candidate was turned away. The batch continues.
    fn on_file_rejected(&self, error: &IntakeError) {
        let _ = error;
    }

    /// A file was explicitly removed from the working set.
    fn on_file_removed(&self, file: &FileSummary) {
        let _ = file;
    }

    /// The simulated upload of a file advanced.
    ///
    /// # Arguments
    /// * `id`: the file being animated
    /// * `percent`: 0 to 100
    fn on_upload_progress(&self, id: FileId, percent: u8) {
        let _ = (id, percent);
    }

    /// A request entered `running`.
    fn on_analysis_start(&self, target: &FileSummary) {
        let _ = target;
    }

    /// The simulated analysis progress advanced.
    fn on_analysis_progress(&self, percent: u8) {
        let _ = percent;
    }

    /// The current request succeeded.
    ///
    /// # Arguments
    /// * `result`: the text returned by the analyzer
    fn on_analysis_complete(&self, result: &str) {
        let _ = result;
    }

    /// The current request failed.
    ///
    /// # Arguments
    /// * `message`: the user-facing message
    /// * `detail`: the underlying analyzer error
    fn on_analysis_failed(&self, message: &str, detail: &str) {
        let _ = (message, detail);
    }

    /// The session was dismissed back to `idle`.
    fn on_reset(&self) {}
}

/// A no-op implementation for callers that don't need events.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::SessionConfig`].
pub type ObserverRef = Arc<dyn SessionObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingObserver {
        admitted: AtomicUsize,
        rejected: AtomicUsize,
        ticks: AtomicUsize,
        last_percent: AtomicUsize,
    }

    impl SessionObserver for TrackingObserver {
        fn on_file_admitted(&self, _file: &FileSummary) {
            self.admitted.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_rejected(&self, _error: &IntakeError) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
        }

        fn on_analysis_progress(&self, percent: u8) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            self.last_percent.store(percent as usize, Ordering::SeqCst);
        }
    }

    fn summary() -> FileSummary {
        FileSummary {
            id: FileId(0),
            name: "doc.pdf".into(),
            media_type: "application/pdf".into(),
            size: 10,
            has_preview: false,
            progress: 0,
            completed: false,
            error: None,
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let obs = NoopObserver;
        obs.on_file_admitted(&summary());
        obs.on_upload_progress(FileId(0), 50);
        obs.on_analysis_complete("done");
        obs.on_analysis_failed("failed", "timeout");
        obs.on_reset();
    }

    #[test]
    fn tracking_observer_receives_events() {
        let tracker = TrackingObserver::default();
        tracker.on_file_admitted(&summary());
        tracker.on_file_rejected(&IntakeError::FileTooLarge {
            name: "big.pdf".into(),
            limit_mb: 20,
        });
        tracker.on_analysis_progress(5);
        tracker.on_analysis_progress(10);

        assert_eq!(tracker.admitted.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.rejected.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.ticks.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.last_percent.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn arc_dyn_observer_works() {
        let obs: ObserverRef = Arc::new(NoopObserver);
        obs.on_analysis_start(&summary());
        obs.on_analysis_progress(100);
    }
}
