//! Upload orchestration: the submission guard and the classification of a
//! finished submission into one of four terminal outcomes.
//!
//! | Response               | Outcome         | Alert | Then           |
//! |------------------------|-----------------|-------|----------------|
//! | 200                    | `Success`       | no    | save, reload   |
//! | 302                    | `Redirected`    | yes   | go to `/`      |
//! | any other status       | `Failed`        | yes   | reload         |
//! | no response            | `NetworkError`  | yes   | reload         |
//!
//! 302 is how the server reports a rejected upload (e.g. over its size
//! limit). Only that exact status is treated as a rejection; other 3xx codes
//! fall into `Failed`.

use crate::backend::BackendResponse;
use crate::error::TransportError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Filename used when the response does not name the document.
pub const DEFAULT_FILENAME: &str = "foliado.pdf";

pub const REJECTED_ALERT: &str = "The upload was rejected. Check the error message on the page.";
pub const NETWORK_ALERT: &str = "Network error or connection failed.";

static RE_FILENAME: Lazy<Regex> = Lazy::new(|| Regex::new(r#"filename="?([^";]+)"?"#).unwrap());

/// Where the page goes after a terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Reload the current page.
    Reload,
    /// Navigate to the site root.
    Root,
}

/// How a submission ended.
#[derive(Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Success { filename: String, document: Vec<u8> },
    Redirected { location: Option<String> },
    Failed { status: u16 },
    NetworkError { detail: String },
}

impl UploadOutcome {
    /// Classify a backend result. Redirect bodies are never inspected.
    pub fn classify(result: Result<BackendResponse, TransportError>) -> Self {
        match result {
            Ok(response) => match response.status {
                200 => UploadOutcome::Success {
                    filename: filename_from_disposition(response.content_disposition.as_deref()),
                    document: response.body,
                },
                302 => UploadOutcome::Redirected {
                    location: response.location,
                },
                status => UploadOutcome::Failed { status },
            },
            Err(e) => UploadOutcome::NetworkError {
                detail: e.to_string(),
            },
        }
    }

    /// The blocking message to show the user, if any.
    pub fn alert(&self) -> Option<String> {
        match self {
            UploadOutcome::Success { .. } => None,
            UploadOutcome::Redirected { .. } => Some(REJECTED_ALERT.to_string()),
            UploadOutcome::Failed { status } => Some(format!(
                "Error {status} on the server while processing the file. Please check its format and size."
            )),
            UploadOutcome::NetworkError { .. } => Some(NETWORK_ALERT.to_string()),
        }
    }

    pub fn navigation(&self) -> Navigation {
        match self {
            UploadOutcome::Redirected { .. } => Navigation::Root,
            _ => Navigation::Reload,
        }
    }
}

impl fmt::Debug for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadOutcome::Success { filename, document } => f
                .debug_struct("Success")
                .field("filename", filename)
                .field("document_len", &document.len())
                .finish(),
            UploadOutcome::Redirected { location } => f
                .debug_struct("Redirected")
                .field("location", location)
                .finish(),
            UploadOutcome::Failed { status } => {
                f.debug_struct("Failed").field("status", status).finish()
            }
            UploadOutcome::NetworkError { detail } => f
                .debug_struct("NetworkError")
                .field("detail", detail)
                .finish(),
        }
    }
}

/// Pick the download name out of a `Content-Disposition` header.
///
/// Only `attachment` dispositions are considered; quotes are stripped. Falls
/// back to [`DEFAULT_FILENAME`].
pub fn filename_from_disposition(header: Option<&str>) -> String {
    header
        .filter(|h| h.contains("attachment"))
        .and_then(|h| RE_FILENAME.captures(h))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace(['\'', '"'], ""))
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

/// At most one submission at a time.
#[derive(Debug, Default)]
pub struct UploadGuard {
    active: Arc<AtomicBool>,
}

impl UploadGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the guard. `None` while another ticket is alive.
    pub fn try_begin(&self) -> Option<UploadTicket> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| UploadTicket {
                active: Arc::clone(&self.active),
            })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Releases the guard when dropped, on every exit path.
#[derive(Debug)]
pub struct UploadTicket {
    active: Arc<AtomicBool>,
}

impl Drop for UploadTicket {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}
