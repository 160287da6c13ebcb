//! Dropzone and the one-way transition from "pick a file" to "configure and
//! preview".
//!
//! A drop (or a pick through the dropzone's own file input) starts a short
//! `Loading` state so the user sees the file was taken. The file is mirrored
//! into the primary input on arrival; when the state expires the controller
//! runs the primary change handler and switches screens.

use crate::form::SelectedFile;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub const IDLE_LABEL: &str = "📁 Drag your PDF here or click to select.";
pub const PROCESSING_LABEL: &str = "⏳ Processing file…";

#[derive(Debug, Clone, PartialEq)]
pub enum DropzonePhase {
    AwaitingFile,
    Loading { file: SelectedFile, deadline: Instant },
    Configuring,
}

/// What the browser should do with a drag event's default action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultAction {
    /// Swallow it: never let the platform open the dropped file itself.
    Prevent,
}

/// Where a drag event landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragTarget {
    Dropzone,
    Elsewhere,
}

/// Drag events anywhere on the page are default-prevented, so a drop that
/// misses the zone does nothing instead of navigating to the file.
pub fn default_action(target: DragTarget) -> DefaultAction {
    match target {
        // The zone handles the drop itself.
        DragTarget::Dropzone => DefaultAction::Prevent,
        // A missed drop would otherwise open the file over the page.
        DragTarget::Elsewhere => DefaultAction::Prevent,
    }
}

#[derive(Debug, Clone)]
pub struct Dropzone {
    phase: DropzonePhase,
    highlighted: bool,
    label: &'static str,
    transition: Duration,
}

impl Dropzone {
    pub fn new(transition: Duration) -> Self {
        Self {
            phase: DropzonePhase::AwaitingFile,
            highlighted: false,
            label: IDLE_LABEL,
            transition,
        }
    }

    pub fn phase(&self) -> &DropzonePhase {
        &self.phase
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    /// The "file loaded" visual state, shown only while `Loading`.
    pub fn is_loading(&self) -> bool {
        matches!(self.phase, DropzonePhase::Loading { .. })
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.phase {
            DropzonePhase::Loading { deadline, .. } => Some(deadline),
            _ => None,
        }
    }

    pub fn drag_over(&mut self) {
        self.highlighted = true;
    }

    /// Unhighlight, except while `Loading` (avoids flicker mid-transition).
    pub fn drag_leave(&mut self) {
        if !self.is_loading() {
            self.highlighted = false;
        }
    }

    /// A drop on the zone: unhighlight, then accept the first file.
    pub fn drop_files(&mut self, files: Vec<SelectedFile>, now: Instant) -> Option<SelectedFile> {
        self.drag_leave();
        self.accept(files, now)
    }

    /// Files picked through the dropzone's own input. Only the first is
    /// kept. Returns it when accepted, so the caller can mirror it into the
    /// primary input right away.
    pub fn accept(&mut self, files: Vec<SelectedFile>, now: Instant) -> Option<SelectedFile> {
        if self.phase != DropzonePhase::AwaitingFile {
            debug!("Ignoring file arrival while dropzone is {}", self.phase_name());
            return None;
        }
        let file = files.into_iter().next()?;

        self.label = PROCESSING_LABEL;
        self.phase = DropzonePhase::Loading {
            file: file.clone(),
            deadline: now + self.transition,
        };
        Some(file)
    }

    /// Finish the transition if it is due. Returns the file whose arrival
    /// must now be announced to the primary input.
    pub fn complete(&mut self, now: Instant) -> Option<SelectedFile> {
        let DropzonePhase::Loading { file, deadline } = &self.phase else {
            return None;
        };
        if now < *deadline {
            return None;
        }
        let file = file.clone();
        self.phase = DropzonePhase::Configuring;
        Some(file)
    }

    /// Back to the initial "pick a file" state.
    pub fn reset(&mut self) {
        self.phase = DropzonePhase::AwaitingFile;
        self.highlighted = false;
        self.label = IDLE_LABEL;
    }

    fn phase_name(&self) -> &'static str {
        match self.phase {
            DropzonePhase::AwaitingFile => "AwaitingFile",
            DropzonePhase::Loading { .. } => "Loading",
            DropzonePhase::Configuring => "Configuring",
        }
    }
}
