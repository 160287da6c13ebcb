//! Configuration types for the foliation client.
//!
//! Two structs cover everything that can be tuned:
//!
//! * [`ClientConfig`] — where the server lives and how the orchestration
//!   behaves (debounce and transition delays, size limit, timeouts). Built
//!   via [`ClientConfigBuilder`].
//! * [`StampSettings`] — the stamping parameters a user would type into the
//!   form. Converted into [`crate::form::FormControls`] so the same values
//!   flow through both the preview and the final submission.

use crate::error::FoliatorError;
use crate::form::{Control, ControlKind, FormControls};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Largest upload the server accepts: 2 GiB.
///
/// Must stay numerically identical to the server's own limit. A smaller value
/// rejects files the server would take; a larger one lets the user wait for a
/// full upload that the server then refuses.
pub const MAX_FILE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Runtime configuration for a [`crate::controller::Controller`] and the
/// HTTP backend.
///
/// # Example
/// ```rust
/// use foliator_client::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://localhost:5000")
///     .debounce_ms(300)
///     .build()
///     .unwrap();
/// assert_eq!(config.preview_url(), "http://localhost:5000/preview");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server origin, without a trailing slash. Default: `http://localhost:5000`.
    pub base_url: String,

    /// Path of the preview endpoint. Default: `/preview`.
    pub preview_path: String,

    /// Path the form posts to for the full stamp. Default: `/`.
    pub form_action: String,

    /// Quiet period after the last change before a preview is requested.
    /// Default: 750 ms.
    pub debounce_ms: u64,

    /// Minimum duration of the dropzone's "processing" state. Default: 500 ms.
    pub transition_ms: u64,

    /// Local size limit in bytes. Default: [`MAX_FILE_BYTES`].
    pub max_file_bytes: u64,

    /// Timeout for a single preview call in seconds. Default: 60.
    ///
    /// The final submission has no overall timeout: a 2 GiB upload on a slow
    /// link legitimately takes longer than any fixed bound.
    pub request_timeout_secs: u64,

    /// TCP connect timeout in seconds, applied to every call. Default: 10.
    pub connect_timeout_secs: u64,

    /// Request previews automatically on file and control changes.
    /// Default: true. Headless stamping turns this off so selecting a file
    /// does not cost an extra preview round trip.
    pub auto_preview: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            preview_path: "/preview".to_string(),
            form_action: "/".to_string(),
            debounce_ms: 750,
            transition_ms: 500,
            max_file_bytes: MAX_FILE_BYTES,
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
            auto_preview: true,
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    /// Absolute URL of the preview endpoint.
    pub fn preview_url(&self) -> String {
        join_url(&self.base_url, &self.preview_path)
    }

    /// Absolute URL the final form is posted to.
    pub fn submit_url(&self) -> String {
        join_url(&self.base_url, &self.form_action)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn preview_path(mut self, path: impl Into<String>) -> Self {
        self.config.preview_path = path.into();
        self
    }

    pub fn form_action(mut self, path: impl Into<String>) -> Self {
        self.config.form_action = path.into();
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.debounce_ms = ms;
        self
    }

    pub fn transition_ms(mut self, ms: u64) -> Self {
        self.config.transition_ms = ms;
        self
    }

    pub fn max_file_bytes(mut self, bytes: u64) -> Self {
        self.config.max_file_bytes = bytes;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs.max(1);
        self
    }

    pub fn auto_preview(mut self, enabled: bool) -> Self {
        self.config.auto_preview = enabled;
        self
    }

    /// Start from a JSON file instead of the defaults. Missing keys keep
    /// their default values.
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self, FoliatorError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            FoliatorError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = serde_json::from_str(&text).map_err(|e| {
            FoliatorError::InvalidConfig(format!("invalid config {}: {e}", path.display()))
        })?;
        Ok(ClientConfigBuilder { config })
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, FoliatorError> {
        let c = &self.config;
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(FoliatorError::InvalidConfig(format!(
                "server URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if c.max_file_bytes == 0 {
            return Err(FoliatorError::InvalidConfig(
                "maximum file size must be > 0".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Stamping parameters ──────────────────────────────────────────────────

/// Page corner the folio is stamped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

impl Corner {
    pub fn as_str(self) -> &'static str {
        match self {
            Corner::TopLeft => "top-left",
            Corner::TopRight => "top-right",
            Corner::BottomLeft => "bottom-left",
            Corner::BottomRight => "bottom-right",
        }
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Corner {
    type Err = FoliatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top-left" => Ok(Corner::TopLeft),
            "top-right" => Ok(Corner::TopRight),
            "bottom-left" => Ok(Corner::BottomLeft),
            "bottom-right" => Ok(Corner::BottomRight),
            other => Err(FoliatorError::InvalidConfig(format!(
                "unknown corner '{other}' (expected top-left, top-right, bottom-left or bottom-right)"
            ))),
        }
    }
}

/// Direction the folio text runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Horizontal => "horizontal",
            Orientation::Vertical => "vertical",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Orientation {
    type Err = FoliatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "horizontal" => Ok(Orientation::Horizontal),
            "vertical" => Ok(Orientation::Vertical),
            other => Err(FoliatorError::InvalidConfig(format!(
                "unknown orientation '{other}' (expected horizontal or vertical)"
            ))),
        }
    }
}

/// Typed stamping parameters, mirroring the server form's fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StampSettings {
    /// First page (1-indexed) that receives a folio. Default: 1.
    pub start_page: u32,
    /// Last page to stamp; `None` stamps through the end. Default: `None`.
    pub end_page: Option<u32>,
    /// Number printed on the first stamped page. Default: 1.
    pub start_number: u32,
    /// Font size in points. Default: 16.
    pub font_size: u32,
    /// Distance from the page edges in centimetres. Default: 1.0.
    pub offset_cm: f32,
    pub corner: Corner,
    pub orientation: Orientation,
}

impl Default for StampSettings {
    fn default() -> Self {
        Self {
            start_page: 1,
            end_page: None,
            start_number: 1,
            font_size: 16,
            offset_cm: 1.0,
            corner: Corner::default(),
            orientation: Orientation::default(),
        }
    }
}

impl StampSettings {
    /// The controls a freshly loaded form would show for these settings,
    /// in the form's declaration order.
    pub fn to_controls(&self) -> FormControls {
        FormControls::new(vec![
            Control::new("start_page", ControlKind::Number, self.start_page.to_string()),
            Control::new(
                "end_page",
                ControlKind::Number,
                self.end_page.map(|p| p.to_string()).unwrap_or_default(),
            ),
            Control::new("start_number", ControlKind::Number, self.start_number.to_string()),
            Control::new("font_size", ControlKind::Number, self.font_size.to_string()),
            Control::new("offset", ControlKind::Number, format!("{:.1}", self.offset_cm)),
            Control::new("corner", ControlKind::Select, self.corner.as_str()),
            Control::new("orientation", ControlKind::Select, self.orientation.as_str()),
        ])
    }
}
