//! Error types for the foliator-client library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`FoliatorError`] — the current operation cannot proceed at all
//!   (file missing, file too large, a submission already running, the
//!   finished document could not be saved). Returned as `Err` from the
//!   controller and CLI entry points.
//!
//! * [`TransportError`] — the request never produced an HTTP response
//!   (connection refused, timeout, body stream broke). Backends return it
//!   and the orchestrators turn it into a terminal outcome: an inline
//!   message for previews, an alert plus reload for submissions.
//!
//! Non-2xx responses are neither: they are ordinary [`crate::backend::BackendResponse`]
//! values whose status the state machines interpret.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the foliator-client library.
#[derive(Debug, Error)]
pub enum FoliatorError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but its contents could not be loaded.
    #[error("Failed to read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The selected file violates a local constraint (currently: size).
    #[error("{reason}")]
    Rejected { reason: String, observed_size_mb: f64 },

    /// A submission was requested with no file in the primary input.
    #[error("No file selected")]
    NoFileSelected,

    /// An event named a control the form does not have.
    #[error("Unknown form control '{name}'")]
    UnknownControl { name: String },

    // ── Session errors ────────────────────────────────────────────────────
    /// A second submission was attempted while one is still running.
    #[error("An upload is already in progress")]
    UploadInFlight,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The stamped document came back but could not be written locally.
    #[error("Failed to save '{path}': {source}")]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A request that failed before any HTTP status was received.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// TCP/TLS connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The response started but its body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),

    /// Anything else reqwest (or a test backend) reports.
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_display_is_the_reason() {
        let e = FoliatorError::Rejected {
            reason: "too big".into(),
            observed_size_mb: 3000.0,
        };
        assert_eq!(e.to_string(), "too big");
    }

    #[test]
    fn file_not_found_display() {
        let e = FoliatorError::FileNotFound {
            path: PathBuf::from("/tmp/missing.pdf"),
        };
        assert!(e.to_string().contains("missing.pdf"));
    }

    #[test]
    fn timeout_display() {
        let e = TransportError::Timeout { secs: 60 };
        assert!(e.to_string().contains("60s"), "got: {e}");
    }

    #[test]
    fn save_failed_keeps_source() {
        use std::error::Error as _;
        let e = FoliatorError::SaveFailed {
            path: PathBuf::from("out/foliado.pdf"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert!(e.source().is_some());
        assert!(e.to_string().contains("disk full"));
    }
}
