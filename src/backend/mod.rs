//! The seam between the orchestration state machines and the stamping
//! server.
//!
//! [`FoliationBackend`] is the only place network I/O happens. The state
//! machines in [`crate::machine`] never see reqwest types: they get a
//! [`BackendResponse`] (any status, including redirects and errors) or a
//! [`TransportError`] (no status at all) and decide what to show.
//!
//! [`http::HttpBackend`] is the real implementation. Tests implement the
//! trait in memory.

pub mod http;

use crate::error::TransportError;
use crate::form::{PreviewRequest, UploadRequest};
use crate::progress::ProgressCallback;
use async_trait::async_trait;
use std::fmt;

pub use http::HttpBackend;

/// A response as the orchestrators need it: status, the two headers that
/// matter, and the raw body.
#[derive(Clone, PartialEq, Eq)]
pub struct BackendResponse {
    pub status: u16,
    /// Raw `Content-Disposition` header, if present.
    pub content_disposition: Option<String>,
    /// Raw `Location` header, if present.
    pub location: Option<String>,
    pub body: Vec<u8>,
}

impl BackendResponse {
    /// A response with no headers.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_disposition: None,
            location: None,
            body: body.into(),
        }
    }

    pub fn with_content_disposition(mut self, value: impl Into<String>) -> Self {
        self.content_disposition = Some(value.into());
        self
    }

    pub fn with_location(mut self, value: impl Into<String>) -> Self {
        self.location = Some(value.into());
        self
    }

    /// 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body as text, for diagnostics.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl fmt::Debug for BackendResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendResponse")
            .field("status", &self.status)
            .field("content_disposition", &self.content_disposition)
            .field("location", &self.location)
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// The two calls the stamping server offers.
#[async_trait]
pub trait FoliationBackend: Send + Sync {
    /// Stamp the first selected page and return it as an image.
    async fn preview(&self, request: &PreviewRequest) -> Result<BackendResponse, TransportError>;

    /// Stamp the whole document. Implementations report upload progress
    /// through `progress` while the file is sent.
    async fn stamp(
        &self,
        request: &UploadRequest,
        progress: ProgressCallback,
    ) -> Result<BackendResponse, TransportError>;
}
