//! In-memory draft store for tests and single-process use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{DraftError, DraftRecord, DraftStore, FormValues};

/// Draft store backed by a process-local map.
///
/// Configurable failure injection, save latency and save counting for
/// unit tests.
#[derive(Default)]
pub struct MemoryDraftStore {
    records: RwLock<HashMap<String, DraftRecord>>,
    failing: AtomicBool,
    save_latency_ms: AtomicU64,
    save_count: AtomicU32,
}

impl MemoryDraftStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save/load/clear fail with a storage error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Builder: start in the failing state.
    pub fn with_failing(self, failing: bool) -> Self {
        self.failing.store(failing, Ordering::SeqCst);
        self
    }

    /// Delay every subsequent save, modelling a slow backend.
    pub fn set_save_latency(&self, latency: Duration) {
        self.save_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> u32 {
        self.save_count.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), DraftError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(DraftError::Storage("store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn save(&self, form_type: &str, values: &FormValues) -> Result<DraftRecord, DraftError> {
        self.check_available()?;

        let latency = self.save_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let record = DraftRecord::snapshot(form_type, values);
        let mut records = self.records.write().await;
        records.insert(form_type.to_string(), record.clone());
        self.save_count.fetch_add(1, Ordering::SeqCst);

        Ok(record)
    }

    async fn load(&self, form_type: &str) -> Result<Option<DraftRecord>, DraftError> {
        self.check_available()?;

        let records = self.records.read().await;
        Ok(records.get(form_type).cloned())
    }

    async fn clear(&self, form_type: &str) -> Result<(), DraftError> {
        self.check_available()?;

        let mut records = self.records.write().await;
        records.remove(form_type);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_schema::FieldValue;

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let store = MemoryDraftStore::new();

        let mut values = FormValues::new();
        values.insert("name".to_string(), FieldValue::Text("Jane Doe".into()));
        values.insert("amount".to_string(), FieldValue::Number(500.0));

        let saved = store.save("small_claims", &values).await.unwrap();
        let loaded = store.load("small_claims").await.unwrap().unwrap();

        assert_eq!(loaded.values, values);
        assert_eq!(loaded.saved_at, saved.saved_at);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_draft() {
        let store = MemoryDraftStore::new();

        let mut values = FormValues::new();
        values.insert("name".to_string(), FieldValue::Text("v1".into()));
        store.save("fee_waiver", &values).await.unwrap();

        values.insert("name".to_string(), FieldValue::Text("v2".into()));
        store.save("fee_waiver", &values).await.unwrap();

        let loaded = store.load("fee_waiver").await.unwrap().unwrap();
        assert_eq!(loaded.values["name"], FieldValue::Text("v2".into()));
    }

    #[tokio::test]
    async fn test_clear_removes_draft() {
        let store = MemoryDraftStore::new();
        store.save("fee_waiver", &FormValues::new()).await.unwrap();

        store.clear("fee_waiver").await.unwrap();
        assert!(store.load("fee_waiver").await.unwrap().is_none());

        // Clearing again is a no-op
        store.clear("fee_waiver").await.unwrap();
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryDraftStore::new().with_failing(true);

        let result = store.save("fee_waiver", &FormValues::new()).await;
        assert!(matches!(result, Err(DraftError::Storage(_))));

        store.set_failing(false);
        store.save("fee_waiver", &FormValues::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_drafts_keyed_by_form_type() {
        let store = MemoryDraftStore::new();
        store.save("fee_waiver", &FormValues::new()).await.unwrap();

        assert!(store.load("eviction_response").await.unwrap().is_none());
        assert!(store.load("fee_waiver").await.unwrap().is_some());
    }
}
