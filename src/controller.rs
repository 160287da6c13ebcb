//! The async controller: owns the application state, the timers, and the
//! network calls.
//!
//! The state machines in [`crate::machine`] are pure and take `now` as an
//! argument. This module supplies the clock: a background worker sleeps
//! until the preview deadline (restarting whenever a trigger moves it),
//! dropzone transitions run on their own short-lived tasks, and every
//! backend call happens outside the state lock. Observers can poll
//! [`Controller::state`] or watch [`Controller::subscribe`] for a change
//! counter.

use crate::backend::{FoliationBackend, HttpBackend};
use crate::config::{ClientConfig, StampSettings};
use crate::download::DocumentSink;
use crate::error::FoliatorError;
use crate::form::{FormControls, SelectedFile, UploadRequest};
use crate::machine::dropzone::Dropzone;
use crate::machine::preview::PreviewDisplay;
use crate::machine::upload::{UploadGuard, UploadOutcome};
use crate::progress::{ProgressCallback, UploadProgressCallback};
use crate::state::{AppState, PreviewPane, Screen};
use crate::validate::{validate, Validation};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// Which DOM event a control value arrived with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// The value was committed (blur, select change).
    Change,
    /// A keystroke in a number or text input.
    Keystroke,
}

/// How [`Controller::submit`] ended. Every variant except `Downloaded`
/// has already queued an alert on the state.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitReport {
    Downloaded { path: PathBuf, bytes: usize },
    /// The server stamped the document but it could not be written locally.
    SaveFailed { filename: String, reason: String },
    /// The server refused the upload with a redirect.
    Rejected { location: Option<String> },
    ServerError { status: u16 },
    NetworkError { detail: String },
}

struct Shared {
    state: Mutex<AppState>,
    wake: Notify,
    changes: watch::Sender<u64>,
    backend: Arc<dyn FoliationBackend>,
    auto_preview: bool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, AppState> {
        // A panic while holding the lock leaves the state consistent enough
        // to keep serving reads.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn changed(&self) {
        self.changes.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// Mutate the state, then wake the preview worker and notify observers.
    fn update<R>(&self, f: impl FnOnce(&mut AppState) -> R) -> R {
        let r = f(&mut self.lock());
        self.wake.notify_one();
        self.changed();
        r
    }

    /// Finish a dropzone transition if it is due.
    fn finish_transition(&self) {
        self.update(|st| {
            let now = Instant::now();
            let Some(file) = st.dropzone.complete(now) else {
                return;
            };
            info!("Dropzone accepted '{}' ({} bytes)", file.name(), file.size());
            st.primary_input = Some(file);
            if st.on_primary_change(now, self.auto_preview) {
                st.screen = Screen::Configure;
            }
        });
    }
}

/// Runs for the controller's lifetime: sleeps until the preview deadline,
/// fires one request, and hands the response back to the requester.
async fn preview_worker(shared: Arc<Shared>) {
    loop {
        let deadline = shared.lock().requester.deadline();
        match deadline {
            Some(deadline) => tokio::select! {
                _ = sleep_until(deadline) => {}
                _ = shared.wake.notified() => continue,
            },
            None => {
                shared.wake.notified().await;
                continue;
            }
        }

        let request = {
            let mut guard = shared.lock();
            let st = &mut *guard;
            let request = st
                .requester
                .fire(Instant::now(), st.primary_input.as_ref(), &st.controls);
            if request.is_some() {
                st.render_preview(PreviewDisplay::Generating);
            }
            request
        };
        let Some(request) = request else {
            continue;
        };
        shared.changed();

        let shared = Arc::clone(&shared);
        tokio::spawn(async move {
            let result = shared.backend.preview(&request).await;
            {
                let mut st = shared.lock();
                if let Some(display) = st.requester.resolve(request.id, result) {
                    st.render_preview(display);
                }
            }
            shared.changed();
        });
    }
}

/// Mirrors upload progress into the modal, then forwards to the caller's
/// callback.
struct ModalProgress {
    shared: Arc<Shared>,
    forward: Option<ProgressCallback>,
}

impl UploadProgressCallback for ModalProgress {
    fn on_upload_start(&self, total_bytes: Option<u64>) {
        if let Some(cb) = &self.forward {
            cb.on_upload_start(total_bytes);
        }
    }

    fn on_upload_progress(&self, loaded: u64, total: Option<u64>) {
        self.shared.lock().progress.update(loaded, total);
        self.shared.changed();
        if let Some(cb) = &self.forward {
            cb.on_upload_progress(loaded, total);
        }
    }

    fn on_upload_complete(&self, status: u16) {
        if let Some(cb) = &self.forward {
            cb.on_upload_complete(status);
        }
    }
}

/// One page session against a foliation server.
pub struct Controller {
    shared: Arc<Shared>,
    guard: UploadGuard,
    worker: JoinHandle<()>,
}

impl Controller {
    /// Start a session with the given form controls. Must be called from
    /// inside a tokio runtime.
    pub fn new(
        config: &ClientConfig,
        backend: Arc<dyn FoliationBackend>,
        controls: FormControls,
    ) -> Self {
        let (changes, _) = watch::channel(0);
        let shared = Arc::new(Shared {
            state: Mutex::new(AppState::new(config, controls)),
            wake: Notify::new(),
            changes,
            backend,
            auto_preview: config.auto_preview,
        });
        let worker = tokio::spawn(preview_worker(Arc::clone(&shared)));
        Self {
            shared,
            guard: UploadGuard::new(),
            worker,
        }
    }

    /// Session against the HTTP server in `config`, with the form the
    /// server renders for `settings`.
    pub fn http(config: &ClientConfig, settings: &StampSettings) -> Result<Self, FoliatorError> {
        let backend = HttpBackend::new(config)?;
        Ok(Self::new(config, Arc::new(backend), settings.to_controls()))
    }

    /// A copy of the current state.
    pub fn state(&self) -> AppState {
        self.shared.lock().clone()
    }

    /// A counter bumped after every state change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.changes.subscribe()
    }

    pub fn is_submitting(&self) -> bool {
        self.guard.is_active()
    }

    /// Hand pending alerts to the host.
    pub fn take_alerts(&self) -> Vec<String> {
        self.shared.lock().take_alerts()
    }

    /// A selection on the primary file input (or clearing it).
    pub fn select_file(&self, file: Option<SelectedFile>) {
        let auto_preview = self.shared.auto_preview;
        self.shared.update(|st| {
            st.select(file);
            st.on_primary_change(Instant::now(), auto_preview);
        });
    }

    /// A new value for a named control.
    ///
    /// The value is stored whatever the event; the preview retriggers on a
    /// change of any tracked control, and on keystrokes in number and text
    /// inputs.
    pub fn control_event(
        &self,
        name: &str,
        value: impl Into<String>,
        event: ControlEvent,
    ) -> Result<(), FoliatorError> {
        let value = value.into();
        let auto_preview = self.shared.auto_preview;
        self.shared.update(|st| {
            let kind = st
                .controls
                .set(name, value)
                .ok_or_else(|| FoliatorError::UnknownControl {
                    name: name.to_string(),
                })?;
            if name == "start_number" {
                st.refresh_folio();
            }
            let fires = match event {
                ControlEvent::Change => kind.is_tracked(),
                ControlEvent::Keystroke => kind.fires_on_keystroke(),
            };
            if fires && auto_preview {
                st.trigger_preview(Instant::now());
            }
            Ok(())
        })
    }

    pub fn drag_over(&self) {
        self.shared.update(|st| st.dropzone.drag_over());
    }

    pub fn drag_leave(&self) {
        self.shared.update(|st| st.dropzone.drag_leave());
    }

    /// Files dropped on the dropzone.
    pub fn drop_files(&self, files: Vec<SelectedFile>) {
        self.arrive(|zone, now| zone.drop_files(files, now));
    }

    /// Files picked through the dropzone's own input.
    pub fn select_drag_files(&self, files: Vec<SelectedFile>) {
        self.arrive(|zone, now| zone.accept(files, now));
    }

    fn arrive(&self, f: impl FnOnce(&mut Dropzone, Instant) -> Option<SelectedFile>) {
        let deadline = self.shared.update(|st| {
            let file = f(&mut st.dropzone, Instant::now())?;
            st.select(Some(file));
            st.refresh_submit();
            st.dropzone.deadline()
        });
        if let Some(deadline) = deadline {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                sleep_until(deadline).await;
                shared.finish_transition();
            });
        }
    }

    /// Wait until the dropzone transition and the current preview burst
    /// have both settled, and return the preview pane.
    pub async fn preview_settled(&self) -> PreviewPane {
        let mut rx = self.shared.changes.subscribe();
        loop {
            {
                let st = self.shared.lock();
                if st.requester.is_settled() && !st.dropzone.is_loading() {
                    return st.preview.clone();
                }
            }
            if rx.changed().await.is_err() {
                return self.shared.lock().preview.clone();
            }
        }
    }

    /// Submit the form: upload the file with every control value, then save
    /// the stamped document through `sink`.
    ///
    /// Returns `Err` only when nothing was sent: the file fails validation
    /// (the page is reset), no file is selected, or another submission is
    /// still running. Everything the server or network does afterwards is a
    /// [`SubmitReport`].
    pub async fn submit(
        &self,
        sink: &dyn DocumentSink,
        progress: Option<ProgressCallback>,
    ) -> Result<SubmitReport, FoliatorError> {
        let request = {
            let mut st = self.shared.lock();
            if let Validation::Rejected {
                reason,
                observed_size_mb,
            } = validate(st.primary_input.as_ref(), st.max_file_bytes())
            {
                st.reject(reason.clone());
                drop(st);
                self.shared.changed();
                return Err(FoliatorError::Rejected {
                    reason,
                    observed_size_mb,
                });
            }
            let file = st
                .primary_input
                .clone()
                .ok_or(FoliatorError::NoFileSelected)?;
            UploadRequest::from_form(file, &st.controls)
        };

        let _ticket = self.guard.try_begin().ok_or_else(|| {
            warn!("Submit ignored: an upload is already in progress");
            FoliatorError::UploadInFlight
        })?;

        info!(
            "Uploading '{}' ({} bytes) with {} fields",
            request.file.name(),
            request.file.size(),
            request.fields().len()
        );
        self.shared.update(|st| st.progress.show());

        let callback: ProgressCallback = Arc::new(ModalProgress {
            shared: Arc::clone(&self.shared),
            forward: progress,
        });
        let result = self.shared.backend.stamp(&request, callback).await;

        self.shared.update(|st| st.progress.hide());
        let outcome = UploadOutcome::classify(result);
        debug!("Upload outcome: {:?}", outcome);
        let navigation = outcome.navigation();
        let alert = outcome.alert();

        let report = match outcome {
            UploadOutcome::Success { filename, document } => {
                let bytes = document.len();
                match sink.save(&filename, document).await {
                    Ok(path) => SubmitReport::Downloaded { path, bytes },
                    Err(e) => {
                        error!("{}", e);
                        self.shared
                            .lock()
                            .alerts
                            .push(format!("The stamped document could not be saved: {e}"));
                        SubmitReport::SaveFailed {
                            filename,
                            reason: e.to_string(),
                        }
                    }
                }
            }
            UploadOutcome::Redirected { location } => SubmitReport::Rejected { location },
            UploadOutcome::Failed { status } => SubmitReport::ServerError { status },
            UploadOutcome::NetworkError { detail } => SubmitReport::NetworkError { detail },
        };

        self.shared.update(|st| {
            if let Some(alert) = alert {
                st.alerts.push(alert);
            }
            st.navigate(navigation);
        });
        Ok(report)
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendResponse;
    use crate::error::TransportError;
    use crate::form::PreviewRequest;
    use async_trait::async_trait;

    /// Answers every call with a fixed status.
    struct FixedBackend(u16);

    #[async_trait]
    impl FoliationBackend for FixedBackend {
        async fn preview(&self, _: &PreviewRequest) -> Result<BackendResponse, TransportError> {
            Ok(BackendResponse::new(self.0, Vec::new()))
        }

        async fn stamp(
            &self,
            _: &UploadRequest,
            _: ProgressCallback,
        ) -> Result<BackendResponse, TransportError> {
            Ok(BackendResponse::new(self.0, Vec::new()))
        }
    }

    fn controller(status: u16) -> Controller {
        Controller::new(
            &ClientConfig::default(),
            Arc::new(FixedBackend(status)),
            StampSettings::default().to_controls(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_control_is_an_error() {
        let c = controller(200);
        let err = c
            .control_event("nope", "1", ControlEvent::Change)
            .unwrap_err();
        assert!(matches!(err, FoliatorError::UnknownControl { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn start_number_updates_folio_immediately() {
        let c = controller(200);
        c.control_event("start_number", "42", ControlEvent::Keystroke)
            .unwrap();
        assert_eq!(c.state().folio_text, "#0042");
    }

    #[tokio::test(start_paused = true)]
    async fn submit_without_file_is_refused() {
        let c = controller(200);
        let sink = crate::download::DirectorySink::new(std::env::temp_dir());
        let err = c.submit(&sink, None).await.unwrap_err();
        assert!(matches!(err, FoliatorError::NoFileSelected));
        assert!(!c.is_submitting());
    }

    #[tokio::test(start_paused = true)]
    async fn subscribe_sees_changes() {
        let c = controller(200);
        let mut rx = c.subscribe();
        c.drag_over();
        rx.changed().await.unwrap();
        assert!(c.state().dropzone.is_highlighted());
    }
}
