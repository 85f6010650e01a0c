//! Intake Session - Multi-Step Form Lifecycle
//!
//! Runtime for one in-progress intake form:
//! - Step navigation gated on validation, with a review terminal display
//! - Draft persistence through a pluggable `DraftStore`
//! - Debounced auto-save with an at-most-one-in-flight guard
//! - Submission to an external document generation service
//! - Fire-and-forget progress analytics
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              FormSession                │
//! │   (step machine, values, errors)        │
//! └───────┬──────────┬──────────┬───────────┘
//!         │          │          │
//!         ▼          ▼          ▼
//! ┌────────────┐ ┌──────────┐ ┌─────────────┐
//! │ DraftStore │ │ Document │ │ Analytics   │
//! │ (auto-save │ │ Generator│ │ Sink        │
//! │  + resume) │ │ (submit) │ │ (best-effort│
//! └────────────┘ └──────────┘ └─────────────┘
//! ```
//!
//! Validation itself is pure and lives in the `intake-schema` crate; this
//! crate wires it to time, storage and collaborators.

pub mod analytics;
pub mod autosave;
pub mod document;
pub mod draft;
pub mod error;
pub mod session;

// Re-export main types for convenience
pub use analytics::{AnalyticsEvent, AnalyticsReporter, AnalyticsSink, EventKind, MemorySink, NoopSink};
pub use autosave::AutoSaveScheduler;
pub use document::{DocumentError, DocumentGenerator, GeneratedDocument, MockGenerator};
pub use draft::{DraftError, DraftRecord, DraftStore, FormValues, MemoryDraftStore};
pub use error::{Result, SessionError};
pub use session::{FormSession, SessionConfig};
