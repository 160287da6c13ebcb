//! Progress-callback trait for the final upload.
//!
//! Inject a [`ProgressCallback`] into
//! [`crate::controller::Controller::submit`] to receive events while the
//! document body is being sent. The controller also mirrors every event into
//! the progress modal of [`crate::state::AppState`], so callers that only
//! read state can ignore callbacks entirely.
//!
//! # Example
//!
//! ```rust
//! use foliator_client::UploadProgressCallback;
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! struct LastSeen(AtomicU64);
//!
//! impl UploadProgressCallback for LastSeen {
//!     fn on_upload_progress(&self, loaded: u64, _total: Option<u64>) {
//!         self.0.store(loaded, Ordering::SeqCst);
//!     }
//! }
//! ```

use std::sync::Arc;

/// Called by a backend as the upload body is streamed.
///
/// Implementations must be `Send + Sync`: the body is pulled by the HTTP
/// client on whichever worker thread polls it. All methods default to no-ops.
pub trait UploadProgressCallback: Send + Sync {
    /// Called once before the first byte is sent.
    ///
    /// # Arguments
    /// * `total_bytes` — size of the file part, when known
    fn on_upload_start(&self, total_bytes: Option<u64>) {
        let _ = total_bytes;
    }

    /// Called after each chunk of the file has been handed to the transport.
    ///
    /// # Arguments
    /// * `loaded` — bytes sent so far
    /// * `total`  — total bytes, when known; percentages are only meaningful
    ///   when this is `Some`
    fn on_upload_progress(&self, loaded: u64, total: Option<u64>) {
        let _ = (loaded, total);
    }

    /// Called once the server has answered, with its status code.
    fn on_upload_complete(&self, status: u16) {
        let _ = status;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl UploadProgressCallback for NoopProgressCallback {}

/// Shared callback handle passed to backends.
pub type ProgressCallback = Arc<dyn UploadProgressCallback>;

/// Rounded percentage for a progress event, or `None` when the total is
/// unknown (the bar is left where it was).
pub fn percent(loaded: u64, total: Option<u64>) -> Option<u8> {
    let total = total.filter(|t| *t > 0)?;
    let pct = (loaded.min(total) as f64 / total as f64 * 100.0).round();
    Some(pct as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: AtomicUsize,
        last_loaded: AtomicU64,
        completed_with: AtomicU64,
    }

    impl UploadProgressCallback for TrackingCallback {
        fn on_upload_start(&self, _total: Option<u64>) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_upload_progress(&self, loaded: u64, _total: Option<u64>) {
            self.last_loaded.store(loaded, Ordering::SeqCst);
        }

        fn on_upload_complete(&self, status: u16) {
            self.completed_with.store(status as u64, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_upload_start(Some(10));
        cb.on_upload_progress(5, Some(10));
        cb.on_upload_complete(200);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let cb = TrackingCallback {
            starts: AtomicUsize::new(0),
            last_loaded: AtomicU64::new(0),
            completed_with: AtomicU64::new(0),
        };
        cb.on_upload_start(Some(100));
        cb.on_upload_progress(40, Some(100));
        cb.on_upload_progress(100, Some(100));
        cb.on_upload_complete(302);

        assert_eq!(cb.starts.load(Ordering::SeqCst), 1);
        assert_eq!(cb.last_loaded.load(Ordering::SeqCst), 100);
        assert_eq!(cb.completed_with.load(Ordering::SeqCst), 302);
    }

    #[test]
    fn percent_rounds_and_needs_a_total() {
        assert_eq!(percent(1, Some(3)), Some(33));
        assert_eq!(percent(2, Some(3)), Some(67));
        assert_eq!(percent(10, Some(10)), Some(100));
        assert_eq!(percent(10, None), None);
        assert_eq!(percent(10, Some(0)), None);
    }
}
