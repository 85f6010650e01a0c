//! Draft persistence for in-progress forms.
//!
//! This module defines the `DraftStore` trait - the abstraction over
//! wherever drafts live (device storage, a remote API, memory). The core
//! keeps at most one live draft per form type; a save overwrites the
//! previous snapshot.

pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use intake_schema::FieldValue;

#[cfg(feature = "typescript")]
use ts_rs::TS;

pub use memory::MemoryDraftStore;

/// Current values of a form, by field name.
pub type FormValues = HashMap<String, FieldValue>;

/// Error types for draft persistence.
///
/// Always recoverable: the in-memory session is the source of truth and
/// is never discarded because a save or load failed.
#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    /// The backing store rejected the operation (quota, network, ...)
    #[error("draft storage error: {0}")]
    Storage(String),

    /// Draft payload could not be (de)serialized
    #[error("draft serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A persisted snapshot of a form session's values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct DraftRecord {
    /// Form type this draft belongs to
    pub form_type: String,
    /// Field values at save time
    pub values: FormValues,
    /// When the snapshot was taken
    pub saved_at: DateTime<Utc>,
}

impl DraftRecord {
    /// Snapshot the given values now.
    pub fn snapshot(form_type: impl Into<String>, values: &FormValues) -> Self {
        Self {
            form_type: form_type.into(),
            values: values.clone(),
            saved_at: Utc::now(),
        }
    }
}

/// Key-value persistence for drafts, keyed by form type.
///
/// Implementations may be local-device storage or a remote API; the core
/// is agnostic and talks only to this trait.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Upsert the draft for a form type, stamping `saved_at`.
    async fn save(&self, form_type: &str, values: &FormValues) -> Result<DraftRecord, DraftError>;

    /// Load the draft for a form type, if one exists.
    async fn load(&self, form_type: &str) -> Result<Option<DraftRecord>, DraftError>;

    /// Delete the draft for a form type. Deleting a missing draft is a no-op.
    async fn clear(&self, form_type: &str) -> Result<(), DraftError>;
}
