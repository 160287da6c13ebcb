//! # foliator-client
//!
//! Client-side orchestration for a PDF foliation server: pick a PDF, tune
//! the stamping parameters against a live preview of the first stamped
//! page, then upload the whole document and save what comes back.
//!
//! ## Why this crate?
//!
//! The server does all the PDF work. What is left on the client is timing
//! and bookkeeping that is easy to get subtly wrong: debouncing previews so
//! a burst of keystrokes costs one request, dropping answers to superseded
//! requests, refusing oversize files before they are uploaded, keeping a
//! second submission from racing the first, and mapping every server answer
//! to exactly one user-visible outcome.
//!
//! ## Flow
//!
//! ```text
//! file arrives (input or drop)
//!  │
//!  ├─ 1. Dropzone   first file only, 500 ms "processing" transition
//!  ├─ 2. Validate   size ≤ 2 GiB, else full reset + alert
//!  ├─ 3. Preview    750 ms debounce → POST /preview → image or inline error
//!  ├─ 4. Submit     guarded, streamed upload with progress
//!  └─ 5. Outcome    200 save · 302 rejected · other error · network error
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use foliator_client::{
//!     ClientConfig, Controller, DirectorySink, SelectedFile, StampSettings,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .base_url("http://localhost:5000")
//!         .build()?;
//!     let controller = Controller::http(&config, &StampSettings::default())?;
//!
//!     controller.select_file(Some(SelectedFile::from_path("document.pdf").await?));
//!     let pane = controller.preview_settled().await;
//!     println!("{}", pane.message);
//!
//!     let report = controller.submit(&DirectorySink::new("."), None).await?;
//!     println!("{report:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `foliator` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! foliator-client = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod controller;
pub mod download;
pub mod error;
pub mod folio;
pub mod form;
pub mod machine;
pub mod progress;
pub mod state;
pub mod validate;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{BackendResponse, FoliationBackend, HttpBackend};
pub use config::{ClientConfig, ClientConfigBuilder, Corner, Orientation, StampSettings, MAX_FILE_BYTES};
pub use controller::{ControlEvent, Controller, SubmitReport};
pub use download::{DirectorySink, DocumentSink};
pub use error::{FoliatorError, TransportError};
pub use form::{ContentReader, Control, ControlKind, FormControls, SelectedFile};
pub use machine::preview::{PreviewDisplay, PreviewImage};
pub use machine::upload::{Navigation, UploadOutcome};
pub use progress::{NoopProgressCallback, ProgressCallback, UploadProgressCallback};
pub use state::{AppState, PreviewPane, Screen};
pub use validate::{validate, Validation};
