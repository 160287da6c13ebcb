//! Explicit state machines for the three interactive flows.
//!
//! Each machine is a plain struct with named states and transition methods
//! that take the current time as an argument. None of them spawn tasks,
//! sleep, or do I/O; [`crate::controller`] owns the timers and the network
//! and feeds results back in. That keeps every transition unit-testable
//! without a runtime.
//!
//! ```text
//!  dropzone:  AwaitingFile ──drop──▶ Loading(500ms) ──tick──▶ Configuring
//!
//!  preview:   Idle ──trigger──▶ Pending(750ms) ──fire──▶ InFlight ──▶ Rendered | Failed
//!              ▲                   ▲   │ trigger                │
//!              └───────────────────┴───┴────────────────────────┘
//!
//!  upload:    guard ──▶ progress modal ──▶ Success | Redirected | Failed | NetworkError
//! ```
//!
//! 1. [`dropzone`] — drag-and-drop ingestion and the one-way screen transition
//! 2. [`preview`]  — debounce, request ids, and mapping responses to a display
//! 3. [`upload`]   — submission guard and classification of terminal outcomes

pub mod dropzone;
pub mod preview;
pub mod upload;
