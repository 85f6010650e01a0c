//! Document generation collaborator.
//!
//! Invoked exactly once, on final submission; the actual rendering
//! (PDF templating, court-form assembly) lives in an external service
//! behind the `DocumentGenerator` trait.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::draft::FormValues;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Error types for document generation.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The service rejected the submission payload
    #[error("submission rejected: {0}")]
    Rejected(String),

    /// The service could not be reached
    #[error("document service unavailable: {0}")]
    Unavailable(String),
}

/// Receipt for a generated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct GeneratedDocument {
    /// Identifier assigned by the document service
    pub document_id: String,
}

/// External service that turns completed form values into a document.
#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    /// Generate a document from the final form payload.
    async fn generate(
        &self,
        template_id: &str,
        form_data: &FormValues,
    ) -> Result<GeneratedDocument, DocumentError>;
}

/// Mock generator for testing.
///
/// Configurable failure and call counting for unit tests.
#[derive(Default)]
pub struct MockGenerator {
    failing: AtomicBool,
    call_count: AtomicU32,
}

impl MockGenerator {
    /// Create a generator that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: make every call fail.
    pub fn with_failing(self, failing: bool) -> Self {
        self.failing.store(failing, Ordering::SeqCst);
        self
    }

    /// Make subsequent calls fail or succeed.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of times `generate` was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentGenerator for MockGenerator {
    async fn generate(
        &self,
        template_id: &str,
        _form_data: &FormValues,
    ) -> Result<GeneratedDocument, DocumentError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err(DocumentError::Unavailable(
                "mock generator disabled".to_string(),
            ));
        }

        Ok(GeneratedDocument {
            document_id: format!("{}-{}", template_id, uuid::Uuid::new_v4()),
        })
    }
}
