//! Error types for form sessions.
//!
//! Nothing here is fatal. Field, step and submission errors are surfaced
//! to the UI and leave the session editable; draft persistence failures
//! never discard in-memory state; analytics failures are logged only and
//! never reach this module.

use std::collections::HashMap;

use crate::document::DocumentError;
use crate::draft::DraftError;

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Error types for the form session controller.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session reached its terminal submitted state
    #[error("session already submitted")]
    AlreadySubmitted,

    /// No step of the schema renders this field
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// Forward navigation blocked by the current step's errors
    #[error("step {step} has {} validation error(s)", errors.len())]
    StepBlocked {
        step: usize,
        errors: HashMap<String, String>,
    },

    /// Jumping ahead of the active step would skip validation gates
    #[error("cannot jump to step {requested} from step {active}")]
    JumpAhead { requested: usize, active: usize },

    /// Submission blocked by validation errors anywhere in the form
    #[error("form has {} validation error(s)", errors.len())]
    SubmissionBlocked { errors: HashMap<String, String> },

    /// The document generation collaborator failed
    #[error("submission failed: {0}")]
    Submission(#[from] DocumentError),

    /// Draft persistence failed on an explicit save or discard
    #[error("draft persistence failed: {0}")]
    Draft(#[from] DraftError),
}
