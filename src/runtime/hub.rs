/// Session hub: the live orchestrators of one process
///
/// Keeps at most one live orchestrator per session id, so two requests resuming
/// the same draft share one state instead of racing. Across processes the draft
/// store remains last-write-wins.
///
/// Sessions a client simply walks away from are closed by the idle sweep; their
/// draft is flushed first, so they can still be resumed.

use crate::draft::snapshot::DraftSummary;
use crate::error::EngineError;
use crate::runtime::orchestrator::{StartOutcome, WorkflowEngine, WorkflowOrchestrator};
use crate::workflow::types::{FlowKind, FlowVariant};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Upper bound on the time between idle sweeps
const IDLE_SWEEP_PERIOD: Duration = Duration::from_secs(60);

pub struct SessionHub {
    engine: WorkflowEngine,
    live: RwLock<HashMap<String, Arc<WorkflowOrchestrator>>>,
}

impl SessionHub {
    pub fn new(engine: WorkflowEngine) -> Self {
        Self {
            engine,
            live: RwLock::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    /// Start or resume a session, reattaching to it if it is already live
    pub async fn start(
        &self,
        kind: FlowKind,
        variant: Option<FlowVariant>,
        resume_session_id: Option<&str>,
    ) -> Result<StartOutcome, EngineError> {
        let resume_id = resume_session_id.map(str::trim).filter(|id| !id.is_empty());

        if let Some(id) = resume_id {
            if let Some(existing) = self.get(id).await {
                if existing.flow_kind() != kind {
                    return Err(EngineError::configuration(format!(
                        "session {} belongs to flow '{}', not '{}'",
                        id,
                        existing.flow_kind(),
                        kind
                    )));
                }
                tracing::debug!("Reattaching to live session {}", id);
                return Ok(StartOutcome {
                    state: existing.state(),
                    orchestrator: existing,
                    notices: Vec::new(),
                    resumed: true,
                });
            }
        }

        let outcome = self.engine.start(kind, variant, resume_id).await?;
        let id = outcome.state.session_id.to_string();

        let mut live = self.live.write().await;
        if let Some(raced) = live.get(&id) {
            // Another request resumed the same draft while this one was loading
            outcome.orchestrator.teardown();
            return Ok(StartOutcome {
                state: raced.state(),
                orchestrator: Arc::clone(raced),
                notices: outcome.notices,
                resumed: true,
            });
        }
        live.insert(id, Arc::clone(&outcome.orchestrator));
        Ok(outcome)
    }

    /// Live orchestrator for a session; counts as client activity
    pub async fn get(&self, session_id: &str) -> Option<Arc<WorkflowOrchestrator>> {
        let orchestrator = self.live.read().await.get(session_id).cloned()?;
        orchestrator.touch();
        Some(orchestrator)
    }

    pub async fn live_count(&self) -> usize {
        self.live.read().await.len()
    }

    /// Tear down a live session, keeping its draft; returns whether it was live
    pub async fn close(&self, session_id: &str) -> bool {
        match self.live.write().await.remove(session_id) {
            Some(orchestrator) => {
                orchestrator.teardown();
                true
            }
            None => false,
        }
    }

    /// Delete the stored draft and tear down the session if it is live
    ///
    /// A live session leaves the hub only once the delete succeeded.
    pub async fn discard(&self, session_id: &str) -> Result<bool, EngineError> {
        let live = self.live.read().await.get(session_id).cloned();
        let Some(orchestrator) = live else {
            return Ok(self.engine.store().delete(session_id).await?);
        };

        let existed = orchestrator.discard().await?;
        let mut live = self.live.write().await;
        if live.get(session_id).is_some_and(|current| Arc::ptr_eq(current, &orchestrator)) {
            live.remove(session_id);
        }
        Ok(existed)
    }

    pub async fn list_drafts(&self) -> Result<Vec<DraftSummary>, EngineError> {
        Ok(self.engine.store().list().await?)
    }

    /// Close sessions with no client activity for `max_idle`; returns how many
    ///
    /// Each one gets a final diff-checked autosave before it is torn down.
    pub async fn close_idle(&self, max_idle: Duration) -> usize {
        let idle: Vec<_> = {
            let mut live = self.live.write().await;
            let ids: Vec<String> = live
                .iter()
                .filter(|(_, orchestrator)| orchestrator.idle_for() >= max_idle)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| live.remove(&id).map(|orchestrator| (id, orchestrator)))
                .collect()
        };

        for (id, orchestrator) in &idle {
            tracing::debug!("Closing idle session {} after {:?}", id, orchestrator.idle_for());
            orchestrator.flush().await;
            orchestrator.teardown();
        }
        if !idle.is_empty() {
            tracing::info!("🧹 Closed {} idle sessions", idle.len());
        }
        idle.len()
    }

    /// Run `close_idle` periodically until `cancel` fires
    pub fn spawn_idle_sweep(hub: &Arc<Self>, max_idle: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let hub = Arc::clone(hub);
        let period = max_idle.min(IDLE_SWEEP_PERIOD);

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        hub.close_idle(max_idle).await;
                    }
                }
            }
        })
    }

    /// Save every live session once and tear it down
    pub async fn shutdown(&self) {
        let sessions: Vec<_> = self.live.write().await.drain().collect();
        tracing::info!("💾 Saving and closing {} live sessions", sessions.len());

        for (id, orchestrator) in sessions {
            if let Err(e) = orchestrator.save_now().await {
                tracing::warn!("Final save of session {} skipped: {}", id, e);
            }
            orchestrator.teardown();
        }
    }
}
