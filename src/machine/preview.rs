//! Debounced preview requester.
//!
//! Every trigger (file change, control change or keystroke, drag arrival)
//! restarts a single debounce timer. When the timer fires, one request is
//! built from the state at that moment and tagged with a fresh id. A
//! response is applied only if its id is still the one in flight; anything
//! else is a stale answer to a superseded request and is dropped.

use crate::backend::BackendResponse;
use crate::error::TransportError;
use crate::form::{snapshot, FormControls, PreviewRequest, SelectedFile};
use crate::validate::{validate, Validation};
use image::{ImageFormat, ImageReader};
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

pub const PLACEHOLDER_MESSAGE: &str = "Upload a PDF to preview the first page.";
pub const GENERATING_MESSAGE: &str = "Generating preview… Loading.";
pub const RENDERED_CAPTION: &str = "Preview of the first stamped page:";

/// Detail shown for any 500 from the preview endpoint, whatever its body.
pub const SERVER_ERROR_DETAIL: &str = "Internal server error (check the server log).";

/// Detail shown when the request never got a response.
pub const NETWORK_ERROR_DETAIL: &str = "Unknown error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewPhase {
    Idle,
    Pending { deadline: Instant },
    InFlight { request_id: u64 },
    Rendered { request_id: u64 },
    Failed,
}

/// What a trigger decided.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerDecision {
    /// No usable file: show the placeholder, no request.
    Placeholder,
    /// The file fails the size constraint; the caller runs the full reset.
    Rejected { reason: String },
    /// A request will be issued at `deadline` unless another trigger comes
    /// first.
    Armed { deadline: Instant },
}

/// A preview image held by the preview pane.
#[derive(Clone)]
pub struct PreviewImage {
    pub request_id: u64,
    pub bytes: Arc<[u8]>,
    /// Detected format, when the body is a recognisable image.
    pub format: Option<ImageFormat>,
    /// Pixel dimensions, when the header could be decoded.
    pub dimensions: Option<(u32, u32)>,
}

impl PreviewImage {
    /// Wrap an opaque image body, probing its format and size on a best
    /// effort basis.
    pub fn from_body(request_id: u64, body: Vec<u8>) -> Self {
        let format = image::guess_format(&body).ok();
        let dimensions = ImageReader::new(Cursor::new(&body[..]))
            .with_guessed_format()
            .ok()
            .and_then(|r| r.into_dimensions().ok());
        Self {
            request_id,
            bytes: Arc::from(body),
            format,
            dimensions,
        }
    }
}

impl fmt::Debug for PreviewImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewImage")
            .field("request_id", &self.request_id)
            .field("len", &self.bytes.len())
            .field("format", &self.format)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

/// Exactly one of these is shown in the preview pane at any time.
#[derive(Debug, Clone)]
pub enum PreviewDisplay {
    Placeholder,
    Generating,
    Image(PreviewImage),
    Error(String),
}

/// The requester's state: current phase plus the id counter.
#[derive(Debug, Clone)]
pub struct PreviewRequester {
    phase: PreviewPhase,
    debounce: Duration,
    last_issued: u64,
}

impl PreviewRequester {
    pub fn new(debounce: Duration) -> Self {
        Self {
            phase: PreviewPhase::Idle,
            debounce,
            last_issued: 0,
        }
    }

    pub fn phase(&self) -> PreviewPhase {
        self.phase
    }

    /// Id of the most recent request issued, 0 before the first.
    pub fn last_issued(&self) -> u64 {
        self.last_issued
    }

    /// When the pending timer is due, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        match self.phase {
            PreviewPhase::Pending { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Whether the last burst has fully settled into an image or an error.
    pub fn is_settled(&self) -> bool {
        matches!(
            self.phase,
            PreviewPhase::Idle | PreviewPhase::Rendered { .. } | PreviewPhase::Failed
        )
    }

    /// React to a trigger. Any pending timer is cancelled and any in-flight
    /// request is superseded, whatever the decision.
    pub fn trigger(
        &mut self,
        file: Option<&SelectedFile>,
        max_bytes: u64,
        now: Instant,
    ) -> TriggerDecision {
        let Some(file) = file.filter(|f| f.is_pdf()) else {
            debug!("Preview trigger without a PDF selected");
            self.phase = PreviewPhase::Failed;
            return TriggerDecision::Placeholder;
        };

        if let Validation::Rejected { reason, .. } = validate(Some(file), max_bytes) {
            self.phase = PreviewPhase::Failed;
            return TriggerDecision::Rejected { reason };
        }

        let deadline = now + self.debounce;
        self.phase = PreviewPhase::Pending { deadline };
        TriggerDecision::Armed { deadline }
    }

    /// Issue the request if the timer is due. The snapshot is taken here,
    /// not at trigger time.
    pub fn fire(
        &mut self,
        now: Instant,
        file: Option<&SelectedFile>,
        controls: &FormControls,
    ) -> Option<PreviewRequest> {
        let PreviewPhase::Pending { deadline } = self.phase else {
            return None;
        };
        if now < deadline {
            return None;
        }
        let Some(file) = file.filter(|f| f.is_pdf()) else {
            self.phase = PreviewPhase::Failed;
            return None;
        };

        self.last_issued += 1;
        let id = self.last_issued;
        self.phase = PreviewPhase::InFlight { request_id: id };
        debug!("Issuing preview request #{}", id);

        Some(PreviewRequest {
            id,
            file: file.clone(),
            snapshot: snapshot(controls),
        })
    }

    /// Apply the outcome of request `id`. Returns what to display, or `None`
    /// when the response is stale.
    pub fn resolve(
        &mut self,
        id: u64,
        result: Result<BackendResponse, TransportError>,
    ) -> Option<PreviewDisplay> {
        if self.phase != (PreviewPhase::InFlight { request_id: id }) {
            warn!(
                "Dropping stale preview response #{} (current phase: {:?})",
                id, self.phase
            );
            return None;
        }

        let display = match result {
            Ok(response) if response.is_success() => {
                self.phase = PreviewPhase::Rendered { request_id: id };
                PreviewDisplay::Image(PreviewImage::from_body(id, response.body))
            }
            Ok(response) => {
                self.phase = PreviewPhase::Failed;
                let detail = failure_detail(response.status, &response.body_text());
                warn!("Preview #{} failed with HTTP {}: {}", id, response.status, detail);
                PreviewDisplay::Error(error_message(&detail))
            }
            Err(e) => {
                self.phase = PreviewPhase::Failed;
                warn!("Preview #{} failed: {}", id, e);
                PreviewDisplay::Error(error_message(NETWORK_ERROR_DETAIL))
            }
        };
        Some(display)
    }

    /// Forget the current phase but keep the id counter, so a response to a
    /// request issued before the reset can never match a later one.
    pub fn reset(&mut self) {
        self.phase = PreviewPhase::Idle;
    }
}

/// Diagnostic for a non-2xx preview response.
pub fn failure_detail(status: u16, body: &str) -> String {
    if status == 500 {
        return SERVER_ERROR_DETAIL.to_string();
    }
    let body = body.trim();
    if body.is_empty() {
        format!("Status: {status}")
    } else {
        body.to_string()
    }
}

/// The inline error line shown in the preview pane.
pub fn error_message(detail: &str) -> String {
    format!("Error: could not generate the preview. ({detail})")
}
