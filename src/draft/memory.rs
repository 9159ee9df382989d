/// Process-local draft store
///
/// Useful for tests and for embedding the engine without a database. It can be
/// switched offline to exercise the storage-failure paths, or slowed down to
/// exercise writes that are still in flight.

use crate::draft::{
    snapshot::{DraftSnapshot, DraftSummary},
    storage::{DraftStore, LoadOutcome, StorageError},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryDraftStore {
    drafts: RwLock<HashMap<String, DraftSnapshot>>,
    offline: AtomicBool,
    writes: AtomicUsize,
    save_latency_ms: AtomicU64,
    saving: AtomicUsize,
    max_saving: AtomicUsize,
}

impl InMemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail until switched back
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of successful saves so far
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Delay every save by `latency` before it lands
    pub fn set_save_latency(&self, latency: Duration) {
        self.save_latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Highest number of saves seen in flight at once
    pub fn max_concurrent_saves(&self) -> usize {
        self.max_saving.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Offline("in-memory store switched offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DraftStore for InMemoryDraftStore {
    async fn save(&self, snapshot: &DraftSnapshot) -> Result<(), StorageError> {
        self.check_online()?;
        let saving = self.saving.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_saving.fetch_max(saving, Ordering::SeqCst);

        let latency = self.save_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        self.drafts
            .write()
            .await
            .insert(snapshot.session_id.clone(), snapshot.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.saving.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<LoadOutcome, StorageError> {
        self.check_online()?;
        Ok(match self.drafts.read().await.get(session_id) {
            Some(snapshot) => LoadOutcome::Found(snapshot.clone()),
            None => LoadOutcome::NotFound,
        })
    }

    async fn delete(&self, session_id: &str) -> Result<bool, StorageError> {
        self.check_online()?;
        Ok(self.drafts.write().await.remove(session_id).is_some())
    }

    async fn list(&self) -> Result<Vec<DraftSummary>, StorageError> {
        self.check_online()?;
        let mut drafts: Vec<DraftSummary> = self.drafts.read().await.values().map(DraftSnapshot::summary).collect();
        drafts.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(drafts)
    }
}
