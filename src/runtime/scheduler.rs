/// Background autosave scheduler
///
/// One scheduler per live workflow. A fixed-interval tokio task captures the
/// current snapshot on each tick and persists it only when its content differs
/// from the last persisted one. Scheduled ticks and explicit saves go through the
/// same write gate, so at most one write per session is in flight and the
/// snapshot is captured only after the gate is held. Discarding the draft takes
/// the gate too, and nothing is written after it.

use crate::draft::{
    snapshot::{DraftSnapshot, SnapshotContent},
    storage::{DraftStore, StorageError},
};
use chrono::{DateTime, Utc};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Default tick interval
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);

/// Accessor for the live snapshot, called at write time
pub type SnapshotSource = Arc<dyn Fn() -> DraftSnapshot + Send + Sync>;

/// What one scheduled tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Content equals the last persisted snapshot
    Unchanged,
    /// Nothing persisted yet and nothing worth persisting
    Empty,
    Persisted,
    /// Store failed; retried on the next tick
    Failed,
    /// Draft was discarded; nothing is written any more
    Discarded,
}

#[derive(Default)]
struct Persisted {
    /// Content of the last successful write
    content: Option<SnapshotContent>,
    discarded: bool,
}

struct WriteGate {
    store: Arc<dyn DraftStore>,
    persisted: Mutex<Persisted>,
}

impl WriteGate {
    async fn tick(&self, source: &SnapshotSource) -> TickOutcome {
        let mut persisted = self.persisted.lock().await;
        if persisted.discarded {
            return TickOutcome::Discarded;
        }
        let snapshot = source();
        let content = snapshot.content();

        match persisted.content.as_ref() {
            Some(previous) if *previous == content => return TickOutcome::Unchanged,
            None if !snapshot.has_payloads() => return TickOutcome::Empty,
            _ => {}
        }

        match self.store.save(&snapshot).await {
            Ok(()) => {
                tracing::debug!(
                    "Autosaved draft {} at phase '{}'",
                    snapshot.session_id,
                    snapshot.current_phase_id
                );
                persisted.content = Some(content);
                TickOutcome::Persisted
            }
            Err(e) => {
                tracing::warn!("Autosave of draft {} failed, retrying next tick: {}", snapshot.session_id, e);
                TickOutcome::Failed
            }
        }
    }

    async fn force(&self, source: &SnapshotSource) -> Result<DateTime<Utc>, StorageError> {
        let mut persisted = self.persisted.lock().await;
        let snapshot = source();
        if persisted.discarded {
            return Err(StorageError::Discarded(snapshot.session_id));
        }
        self.store.save(&snapshot).await?;
        persisted.content = Some(snapshot.content());
        Ok(snapshot.saved_at)
    }

    async fn discard(&self, session_id: &str) -> Result<bool, StorageError> {
        let mut persisted = self.persisted.lock().await;
        let existed = self.store.delete(session_id).await?;
        persisted.discarded = true;
        persisted.content = None;
        Ok(existed)
    }
}

pub struct AutoSaveScheduler {
    gate: Arc<WriteGate>,
    interval: Duration,
    cancel: CancellationToken,
    armed: AtomicBool,
}

impl AutoSaveScheduler {
    pub fn new(store: Arc<dyn DraftStore>, interval: Duration) -> Self {
        Self {
            gate: Arc::new(WriteGate {
                store,
                persisted: Mutex::new(Persisted::default()),
            }),
            interval,
            cancel: CancellationToken::new(),
            armed: AtomicBool::new(false),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Record content already known to be persisted (a resumed draft)
    pub async fn prime(&self, content: SnapshotContent) {
        self.gate.persisted.lock().await.content = Some(content);
    }

    /// Arm the recurring timer; later calls while armed are ignored
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, source: SnapshotSource) {
        if self.cancel.is_cancelled() {
            tracing::debug!("Autosave scheduler already cancelled, not arming");
            return;
        }
        if self.armed.swap(true, Ordering::SeqCst) {
            return;
        }

        let gate = Arc::clone(&self.gate);
        let cancel = self.cancel.clone();
        let period = self.interval;

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::debug!("Autosave timer stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        gate.tick(&source).await;
                    }
                }
            }
        });

        tracing::debug!("Autosave armed every {:?}", period);
    }

    /// Run one diff-checked save now, as a scheduled tick would
    pub async fn run_tick(&self, source: &SnapshotSource) -> TickOutcome {
        self.gate.tick(source).await
    }

    /// Persist immediately, bypassing the interval and the diff check
    pub async fn force_save(&self, source: &SnapshotSource) -> Result<DateTime<Utc>, StorageError> {
        self.gate.force(source).await
    }

    /// Delete the draft once any in-flight write has landed, then stop for good
    ///
    /// On success the timer is cancelled and later ticks and forced saves write
    /// nothing. On a store failure nothing changes.
    pub async fn discard(&self, session_id: &str) -> Result<bool, StorageError> {
        let existed = self.gate.discard(session_id).await?;
        self.cancel();
        Ok(existed)
    }

    /// Stop the timer. Synchronous and idempotent; an in-flight write completes.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            self.cancel.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for AutoSaveScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::{memory::InMemoryDraftStore, snapshot::fixtures::intake_draft, storage::LoadOutcome};
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    fn shared_source(draft: DraftSnapshot) -> (Arc<StdMutex<DraftSnapshot>>, SnapshotSource) {
        let live = Arc::new(StdMutex::new(draft));
        let reader = Arc::clone(&live);
        let source: SnapshotSource = Arc::new(move || {
            let mut snapshot = reader.lock().unwrap().clone();
            snapshot.saved_at = Utc::now();
            snapshot
        });
        (live, source)
    }

    fn scheduler(store: &Arc<InMemoryDraftStore>) -> AutoSaveScheduler {
        AutoSaveScheduler::new(Arc::clone(store) as Arc<dyn DraftStore>, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn identical_ticks_write_once() {
        let store = Arc::new(InMemoryDraftStore::new());
        let autosave = scheduler(&store);
        let (_, source) = shared_source(intake_draft("s-1"));

        assert_eq!(autosave.run_tick(&source).await, TickOutcome::Persisted);
        assert_eq!(autosave.run_tick(&source).await, TickOutcome::Unchanged);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn empty_draft_is_never_persisted_by_ticks() {
        let store = Arc::new(InMemoryDraftStore::new());
        let autosave = scheduler(&store);
        let mut empty = intake_draft("s-empty");
        empty.phase_payloads.clear();
        let (_, source) = shared_source(empty);

        assert_eq!(autosave.run_tick(&source).await, TickOutcome::Empty);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn edits_after_a_write_are_picked_up() {
        let store = Arc::new(InMemoryDraftStore::new());
        let autosave = scheduler(&store);
        let (live, source) = shared_source(intake_draft("s-1"));

        autosave.run_tick(&source).await;
        live.lock()
            .unwrap()
            .phase_payloads
            .insert("content".into(), json!({ "headline": "Breathe easier" }));

        assert_eq!(autosave.run_tick(&source).await, TickOutcome::Persisted);
        assert_eq!(store.writes(), 2);
    }

    #[tokio::test]
    async fn failed_tick_is_retried_and_force_save_surfaces_errors() {
        let store = Arc::new(InMemoryDraftStore::new());
        let autosave = scheduler(&store);
        let (_, source) = shared_source(intake_draft("s-1"));

        store.set_offline(true);
        assert_eq!(autosave.run_tick(&source).await, TickOutcome::Failed);
        assert!(autosave.force_save(&source).await.is_err());

        store.set_offline(false);
        assert_eq!(autosave.run_tick(&source).await, TickOutcome::Persisted);
    }

    #[tokio::test]
    async fn force_save_ignores_the_diff_check() {
        let store = Arc::new(InMemoryDraftStore::new());
        let autosave = scheduler(&store);
        let (_, source) = shared_source(intake_draft("s-1"));

        autosave.force_save(&source).await.unwrap();
        autosave.force_save(&source).await.unwrap();
        assert_eq!(store.writes(), 2);
        assert_eq!(autosave.run_tick(&source).await, TickOutcome::Unchanged);
    }

    #[tokio::test]
    async fn primed_content_suppresses_the_first_tick() {
        let store = Arc::new(InMemoryDraftStore::new());
        let autosave = scheduler(&store);
        let draft = intake_draft("s-resumed");
        autosave.prime(draft.content()).await;
        let (_, source) = shared_source(draft);

        assert_eq!(autosave.run_tick(&source).await, TickOutcome::Unchanged);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_writes_on_interval_until_cancelled() {
        let store = Arc::new(InMemoryDraftStore::new());
        let autosave = scheduler(&store);
        let (live, source) = shared_source(intake_draft("s-timer"));

        autosave.schedule(Arc::clone(&source));
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(store.writes(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.writes(), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.writes(), 1, "unchanged content is not rewritten");

        autosave.cancel();
        autosave.cancel();
        live.lock()
            .unwrap()
            .phase_payloads
            .insert("content".into(), json!({ "completedAt": "2024-05-02" }));
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(store.writes(), 1);
        assert!(autosave.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_scheduler_cannot_be_rearmed() {
        let store = Arc::new(InMemoryDraftStore::new());
        let autosave = scheduler(&store);
        let (_, source) = shared_source(intake_draft("s-1"));

        autosave.cancel();
        autosave.schedule(source);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn forced_save_racing_a_tick_writes_the_later_state() {
        let store = Arc::new(InMemoryDraftStore::new());
        store.set_save_latency(Duration::from_millis(500));
        let autosave = scheduler(&store);
        let (live, source) = shared_source(intake_draft("s-race"));

        let edit = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            live.lock()
                .unwrap()
                .phase_payloads
                .insert("content".into(), json!({ "headline": "Breathe easier" }));
        };
        let (tick, forced, _) = tokio::join!(autosave.run_tick(&source), autosave.force_save(&source), edit);

        assert_eq!(tick, TickOutcome::Persisted);
        assert!(forced.is_ok());
        assert_eq!(store.writes(), 2);
        assert_eq!(store.max_concurrent_saves(), 1);

        let LoadOutcome::Found(saved) = store.load("s-race").await.unwrap() else {
            panic!("draft should be stored");
        };
        assert_eq!(saved.phase_payloads["content"]["headline"], "Breathe easier");
        assert_eq!(autosave.run_tick(&source).await, TickOutcome::Unchanged);
    }

    #[tokio::test(start_paused = true)]
    async fn discard_waits_for_an_in_flight_tick() {
        let store = Arc::new(InMemoryDraftStore::new());
        store.set_save_latency(Duration::from_millis(500));
        let autosave = scheduler(&store);
        let (_, source) = shared_source(intake_draft("s-gone"));

        autosave.schedule(Arc::clone(&source));
        tokio::time::sleep(Duration::from_millis(30_100)).await;
        assert_eq!(store.writes(), 0, "tick is still writing");

        assert!(autosave.discard("s-gone").await.unwrap());
        assert_eq!(store.writes(), 1);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(store.load("s-gone").await.unwrap(), LoadOutcome::NotFound);
        assert!(autosave.is_cancelled());
        assert_eq!(autosave.run_tick(&source).await, TickOutcome::Discarded);
        assert!(matches!(autosave.force_save(&source).await, Err(StorageError::Discarded(_))));
    }

    #[tokio::test]
    async fn failed_discard_keeps_the_scheduler_running() {
        let store = Arc::new(InMemoryDraftStore::new());
        let autosave = scheduler(&store);
        let (_, source) = shared_source(intake_draft("s-1"));

        store.set_offline(true);
        assert!(autosave.discard("s-1").await.is_err());
        assert!(!autosave.is_cancelled());

        store.set_offline(false);
        assert_eq!(autosave.run_tick(&source).await, TickOutcome::Persisted);
    }
}
