//! The application-state object.
//!
//! Everything a page would keep in its DOM lives here: both file inputs, the
//! controls, whether submit is enabled, which screen is showing, the preview
//! pane, the folio text, the progress modal, and the alerts and navigation
//! requests waiting for the host to act on. The controller owns one
//! `AppState` behind a mutex and mutates it only through these methods.

use crate::config::ClientConfig;
use crate::folio;
use crate::form::{FormControls, SelectedFile};
use crate::machine::dropzone::Dropzone;
use crate::machine::preview::{
    PreviewDisplay, PreviewImage, PreviewRequester, TriggerDecision, GENERATING_MESSAGE,
    PLACEHOLDER_MESSAGE, RENDERED_CAPTION,
};
use crate::machine::upload::Navigation;
use crate::progress::percent;
use crate::validate::{submit_allowed, validate, Validation};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Which half of the page is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// The dropzone.
    Upload,
    /// Controls plus live preview.
    Configure,
}

/// The preview area: one message line plus an optional image.
#[derive(Debug, Clone)]
pub struct PreviewPane {
    pub message: String,
    pub is_error: bool,
    pub image_visible: bool,
    image: Option<PreviewImage>,
}

impl Default for PreviewPane {
    fn default() -> Self {
        Self {
            message: PLACEHOLDER_MESSAGE.to_string(),
            is_error: false,
            image_visible: false,
            image: None,
        }
    }
}

impl PreviewPane {
    pub fn image(&self) -> Option<&PreviewImage> {
        self.image.as_ref()
    }

    /// Render a display. Returns the image that was replaced, which the
    /// caller drops to release it.
    pub fn apply(&mut self, display: PreviewDisplay) -> Option<PreviewImage> {
        self.is_error = false;
        self.image_visible = false;
        match display {
            PreviewDisplay::Placeholder => {
                self.message = PLACEHOLDER_MESSAGE.to_string();
                None
            }
            PreviewDisplay::Generating => {
                self.message = GENERATING_MESSAGE.to_string();
                None
            }
            PreviewDisplay::Image(image) => {
                self.message = RENDERED_CAPTION.to_string();
                self.image_visible = true;
                self.image.replace(image)
            }
            PreviewDisplay::Error(message) => {
                self.message = message;
                self.is_error = true;
                None
            }
        }
    }
}

/// The blocking upload modal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressModal {
    pub visible: bool,
    pub percent: u8,
}

impl ProgressModal {
    pub fn show(&mut self) {
        self.visible = true;
        self.percent = 0;
    }

    /// Move the bar; ignored when the total is unknown.
    pub fn update(&mut self, loaded: u64, total: Option<u64>) {
        if let Some(p) = percent(loaded, total) {
            self.percent = p;
        }
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// The hidden primary file input every request reads from.
    pub primary_input: Option<SelectedFile>,
    /// The visible dropzone input; mirrored into `primary_input`.
    pub drag_input: Option<SelectedFile>,
    pub controls: FormControls,
    pub submit_enabled: bool,
    pub screen: Screen,
    pub dropzone: Dropzone,
    pub preview: PreviewPane,
    pub requester: PreviewRequester,
    /// Text of the simulated folio, e.g. `#0001`.
    pub folio_text: String,
    pub progress: ProgressModal,
    /// Blocking messages not yet shown by the host.
    pub alerts: Vec<String>,
    /// The last navigation an outcome requested.
    pub navigation: Option<Navigation>,
    /// Preview images released so far by being replaced.
    pub released_images: u64,
    max_file_bytes: u64,
    initial_controls: FormControls,
}

impl AppState {
    /// The state of a freshly loaded page.
    pub fn new(config: &ClientConfig, controls: FormControls) -> Self {
        let folio_text = folio::render(controls.value("start_number").unwrap_or_default());
        Self {
            primary_input: None,
            drag_input: None,
            initial_controls: controls.clone(),
            controls,
            submit_enabled: false,
            screen: Screen::Upload,
            dropzone: Dropzone::new(config.transition()),
            preview: PreviewPane::default(),
            requester: PreviewRequester::new(config.debounce()),
            folio_text,
            progress: ProgressModal::default(),
            alerts: Vec::new(),
            navigation: None,
            released_images: 0,
            max_file_bytes: config.max_file_bytes,
        }
    }

    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_bytes
    }

    /// Recompute whether submit is enabled from the primary input.
    pub fn refresh_submit(&mut self) -> bool {
        self.submit_enabled = submit_allowed(self.primary_input.as_ref(), self.max_file_bytes);
        self.submit_enabled
    }

    pub fn refresh_folio(&mut self) {
        self.folio_text = folio::render(self.controls.value("start_number").unwrap_or_default());
    }

    /// Put a file into both inputs.
    pub fn select(&mut self, file: Option<SelectedFile>) {
        self.drag_input = file.clone();
        self.primary_input = file;
    }

    /// Handle a change on the primary input: validate, refresh submit, then
    /// (optionally) trigger a preview. Returns `false` if the file was
    /// rejected and the page reset.
    pub fn on_primary_change(&mut self, now: Instant, preview: bool) -> bool {
        if let Validation::Rejected { reason, .. } =
            validate(self.primary_input.as_ref(), self.max_file_bytes)
        {
            self.reject(reason);
            return false;
        }
        self.refresh_submit();
        if preview {
            self.trigger_preview(now);
        }
        true
    }

    /// Run the preview requester's trigger and render its immediate effect.
    pub fn trigger_preview(&mut self, now: Instant) {
        match self
            .requester
            .trigger(self.primary_input.as_ref(), self.max_file_bytes, now)
        {
            TriggerDecision::Placeholder => self.render_preview(PreviewDisplay::Placeholder),
            TriggerDecision::Rejected { reason } => self.reject(reason),
            TriggerDecision::Armed { deadline } => {
                debug!("Preview armed for {:?}", deadline - now);
                self.refresh_folio();
            }
        }
    }

    pub fn render_preview(&mut self, display: PreviewDisplay) {
        if let Some(old) = self.preview.apply(display) {
            debug!("Releasing preview image #{}", old.request_id);
            self.released_images += 1;
        }
    }

    /// The constraint-violation reset: both inputs cleared, submit disabled,
    /// back to the upload screen with the default preview and dropzone
    /// label, and the reason queued as an alert. All in one step.
    pub fn reject(&mut self, reason: String) {
        warn!("{}", reason);
        self.select(None);
        self.refresh_submit();
        self.screen = Screen::Upload;
        self.requester.reset();
        self.render_preview(PreviewDisplay::Placeholder);
        self.dropzone.reset();
        self.alerts.push(reason);
    }

    /// Act on a terminal navigation: both targets land on a freshly loaded
    /// page. Pending alerts and the navigation itself are kept for the host.
    pub fn navigate(&mut self, navigation: Navigation) {
        info!("Navigating: {:?}", navigation);
        let alerts = std::mem::take(&mut self.alerts);
        let released = self.released_images + u64::from(self.preview.image().is_some());
        let mut requester = self.requester.clone();
        requester.reset();

        self.primary_input = None;
        self.drag_input = None;
        self.controls = self.initial_controls.clone();
        self.submit_enabled = false;
        self.screen = Screen::Upload;
        self.dropzone.reset();
        self.preview = PreviewPane::default();
        self.requester = requester;
        self.progress = ProgressModal::default();
        self.refresh_folio();

        self.alerts = alerts;
        self.navigation = Some(navigation);
        self.released_images = released;
    }

    /// Hand pending alerts to the host.
    pub fn take_alerts(&mut self) -> Vec<String> {
        std::mem::take(&mut self.alerts)
    }
}
