/// Workflow orchestrator
///
/// `WorkflowEngine` starts or resumes sessions; each yields a
/// `WorkflowOrchestrator` that owns the live `WorkflowState` of one attempt and
/// ties together the phase state machine, the branch controller and autosave.
///
/// Navigation and payload edits are synchronous and never wait on persistence.
/// Infrastructure failures are downgraded to `Notice`s here; only explicit
/// callers ever see a storage error, and then as a warning.

use crate::draft::{
    snapshot::{DraftSnapshot, SNAPSHOT_VERSION},
    storage::{DraftStore, LoadOutcome},
};
use crate::error::{EngineError, NavigationRejection, Notice};
use crate::runtime::scheduler::{AutoSaveScheduler, SnapshotSource, TickOutcome, DEFAULT_AUTOSAVE_INTERVAL};
use crate::session::{SessionId, SessionIdentity};
use crate::workflow::{
    branch::{BranchReport, FlowBranchController},
    completion::is_complete,
    machine::{blocking_phase, PhaseStateMachine, Transition},
    registry::RegistryCatalog,
    types::{FlowKind, FlowVariant, PhasePayloads},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::time::Duration;
use tokio::time::Instant;

/// Per-phase view for rendering a stepper
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseView {
    pub id: String,
    pub title: String,
    pub required: bool,
    pub complete: bool,
    /// Nearest required predecessor satisfied, so the phase can be entered
    pub reachable: bool,
}

/// Live state of one workflow attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub session_id: SessionId,
    pub flow_kind: FlowKind,
    pub flow_variant: FlowVariant,
    pub current_phase_id: String,
    pub completed_phase_ids: BTreeSet<String>,
    pub phase_payloads: PhasePayloads,
    pub progress_percent: u8,
    pub finished: bool,
    pub phases: Vec<PhaseView>,
}

/// Result of `WorkflowEngine::start`
pub struct StartOutcome {
    pub orchestrator: Arc<WorkflowOrchestrator>,
    pub state: WorkflowState,
    pub notices: Vec<Notice>,
    /// Whether a stored draft was picked up
    pub resumed: bool,
}

/// Result of an explicit save
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaveStatus {
    Saved { saved_at: DateTime<Utc> },
    /// Not persisted; the in-memory state is unaffected
    Warning { notice: Notice },
}

/// Result of an accepted branch transition
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchOutcome {
    pub state: WorkflowState,
    pub report: BranchReport,
    pub notices: Vec<Notice>,
}

/// Factory for orchestrators sharing one catalog and one draft store
#[derive(Clone)]
pub struct WorkflowEngine {
    catalog: Arc<RegistryCatalog>,
    store: Arc<dyn DraftStore>,
    autosave_interval: Duration,
}

impl WorkflowEngine {
    pub fn new(catalog: Arc<RegistryCatalog>, store: Arc<dyn DraftStore>) -> Self {
        Self {
            catalog,
            store,
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
        }
    }

    pub fn with_autosave_interval(mut self, interval: Duration) -> Self {
        self.autosave_interval = interval;
        self
    }

    pub fn catalog(&self) -> &Arc<RegistryCatalog> {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<dyn DraftStore> {
        &self.store
    }

    /// Start a fresh attempt, or resume the draft named by `resume_session_id`
    ///
    /// A resume id with no stored draft degrades to a fresh start under that id.
    /// A store that cannot be read, or a draft that cannot be resumed here (another
    /// flow kind, or a variant no longer installed), degrades to a fresh start
    /// under a newly minted id, so the stored draft is never overwritten.
    pub async fn start(
        &self,
        kind: FlowKind,
        variant: Option<FlowVariant>,
        resume_session_id: Option<&str>,
    ) -> Result<StartOutcome, EngineError> {
        let requested = match variant {
            Some(variant) => variant,
            None => {
                let fallback = kind.default_variant();
                tracing::info!("No variant requested for {} flow, using '{}'", kind, fallback);
                fallback
            }
        };
        let registry = self.catalog.phases_for(kind, requested)?;
        let branches = FlowBranchController::new(Arc::clone(&self.catalog));

        let resume_id = resume_session_id.map(str::trim).filter(|id| !id.is_empty());
        let mut identity = SessionIdentity::from_route(resume_id);
        let mut notices = Vec::new();
        let mut resumed = None;

        if let Some(id) = resume_id {
            match self.store.load(id).await {
                Ok(LoadOutcome::Found(snapshot)) => match branches.resume(kind, requested, &snapshot) {
                    Ok((machine, point)) => {
                        if point.clamped {
                            tracing::warn!(
                                "Draft {} stored at '{}' resumed at '{}'",
                                id,
                                point.stored_phase_id,
                                point.resumed_at
                            );
                            notices.push(Notice::ResumeClamped {
                                requested: point.stored_phase_id,
                                resumed_at: point.resumed_at,
                            });
                        }
                        resumed = Some((machine, snapshot));
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Draft {} cannot be resumed as {}, starting over under a new session: {}",
                            id,
                            kind,
                            e
                        );
                        notices.push(Notice::DraftIncompatible {
                            session_id: id.to_string(),
                            message: e.to_string(),
                        });
                        identity = SessionIdentity::new();
                    }
                },
                Ok(LoadOutcome::NotFound) => {
                    tracing::warn!("No draft found for session {}, starting over", id);
                    notices.push(Notice::DraftNotFound { session_id: id.to_string() });
                }
                Err(e) => {
                    tracing::warn!("Could not load draft {}, starting over under a new session: {}", id, e);
                    notices.push(Notice::StorageUnavailable { message: e.to_string() });
                    identity = SessionIdentity::new();
                }
            }
        }

        let session = identity.ensure();
        let scheduler = AutoSaveScheduler::new(Arc::clone(&self.store), self.autosave_interval);
        let was_resumed = resumed.is_some();

        let live = match resumed {
            Some((machine, snapshot)) => {
                scheduler.prime(snapshot.content()).await;
                let finished_at = if machine.is_finished() { snapshot.finished_at } else { None };
                let mut live = Live {
                    session: session.clone(),
                    machine,
                    payloads: snapshot.phase_payloads,
                    finished_at,
                };
                live.sync_finish();
                live
            }
            None => Live {
                session: session.clone(),
                machine: PhaseStateMachine::new(registry),
                payloads: PhasePayloads::new(),
                finished_at: None,
            },
        };

        let orchestrator = Arc::new(WorkflowOrchestrator::new(
            session,
            live,
            scheduler,
            branches,
        ));
        orchestrator.arm();

        let state = orchestrator.state();
        tracing::info!(
            "Session {} {} on {}/{} at phase '{}'",
            state.session_id,
            if was_resumed { "resumed" } else { "started" },
            state.flow_kind,
            state.flow_variant,
            state.current_phase_id
        );

        Ok(StartOutcome {
            orchestrator,
            state,
            notices,
            resumed: was_resumed,
        })
    }
}

struct Live {
    session: SessionId,
    machine: PhaseStateMachine,
    payloads: PhasePayloads,
    finished_at: Option<DateTime<Utc>>,
}

impl Live {
    fn sync_finish(&mut self) {
        match (self.machine.is_finished(), self.finished_at) {
            (true, None) => self.finished_at = Some(Utc::now()),
            (false, Some(_)) => self.finished_at = None,
            _ => {}
        }
    }

    fn state(&self) -> WorkflowState {
        let registry = self.machine.registry();
        let phases = registry.phases();
        let views = phases
            .iter()
            .enumerate()
            .map(|(index, phase)| PhaseView {
                id: phase.id.clone(),
                title: phase.title.clone(),
                required: phase.required,
                complete: is_complete(phase, self.payloads.get(&phase.id)),
                reachable: blocking_phase(registry, index, &self.payloads).is_none(),
            })
            .collect();

        WorkflowState {
            session_id: self.session.clone(),
            flow_kind: registry.kind(),
            flow_variant: registry.variant(),
            current_phase_id: self.machine.current_phase_id().to_string(),
            completed_phase_ids: self.machine.completed().clone(),
            phase_payloads: self.payloads.clone(),
            progress_percent: self.machine.progress_percent(),
            finished: self.machine.is_finished(),
            phases: views,
        }
    }

    fn snapshot(&self) -> DraftSnapshot {
        let registry = self.machine.registry();
        DraftSnapshot {
            session_id: self.session.to_string(),
            version: SNAPSHOT_VERSION.to_string(),
            saved_at: Utc::now(),
            flow_kind: registry.kind(),
            flow_variant: registry.variant(),
            current_phase_id: self.machine.current_phase_id().to_string(),
            completed_phase_ids: self.machine.completed().clone(),
            phase_payloads: self.payloads.clone(),
            progress_percent: self.machine.progress_percent(),
            finished_at: self.finished_at,
        }
    }
}

fn read_live(live: &RwLock<Live>) -> RwLockReadGuard<'_, Live> {
    live.read().unwrap_or_else(PoisonError::into_inner)
}

/// Driver of one live workflow attempt
pub struct WorkflowOrchestrator {
    session: SessionId,
    live: Arc<RwLock<Live>>,
    scheduler: AutoSaveScheduler,
    source: SnapshotSource,
    branches: FlowBranchController,
    torn_down: AtomicBool,
    last_active: Mutex<Instant>,
}

impl WorkflowOrchestrator {
    fn new(
        session: SessionId,
        live: Live,
        scheduler: AutoSaveScheduler,
        branches: FlowBranchController,
    ) -> Self {
        let live = Arc::new(RwLock::new(live));
        let reader = Arc::clone(&live);
        let source: SnapshotSource = Arc::new(move || read_live(&reader).snapshot());

        Self {
            session,
            live,
            scheduler,
            source,
            branches,
            torn_down: AtomicBool::new(false),
            last_active: Mutex::new(Instant::now()),
        }
    }

    fn arm(&self) {
        self.scheduler.schedule(Arc::clone(&self.source));
    }

    fn write(&self) -> RwLockWriteGuard<'_, Live> {
        self.live.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session
    }

    pub fn flow_kind(&self) -> FlowKind {
        read_live(&self.live).machine.registry().kind()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Record client activity, resetting the idle clock
    pub fn touch(&self) {
        *self.last_active.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Time since the last edit, navigation, save or `touch`
    pub fn idle_for(&self) -> Duration {
        self.last_active.lock().unwrap_or_else(PoisonError::into_inner).elapsed()
    }

    pub fn state(&self) -> WorkflowState {
        read_live(&self.live).state()
    }

    /// Snapshot of the live state as it would be persisted now
    pub fn snapshot(&self) -> DraftSnapshot {
        (self.source)()
    }

    /// Replace one phase's payload; never saves and never navigates
    pub fn update_phase_payload(&self, phase_id: &str, payload: Value) -> Result<WorkflowState, EngineError> {
        if self.is_torn_down() {
            return Err(EngineError::Inactive(self.session.to_string()));
        }

        self.touch();
        let mut live = self.write();
        if !live.machine.registry().contains(phase_id) {
            return Err(EngineError::configuration(format!(
                "phase '{}' is not part of flow {}/{}",
                phase_id,
                live.machine.registry().kind(),
                live.machine.registry().variant()
            )));
        }

        live.payloads.insert(phase_id.to_string(), payload);
        let Live { machine, payloads, .. } = &mut *live;
        machine.reconcile(payloads);
        live.sync_finish();

        tracing::debug!("Session {} updated payload of phase '{}'", self.session, phase_id);
        Ok(live.state())
    }

    pub fn advance(&self) -> Result<WorkflowState, NavigationRejection> {
        self.navigate("advance", |machine, payloads| machine.next(payloads))
    }

    pub fn back(&self) -> Result<WorkflowState, NavigationRejection> {
        self.navigate("back", |machine, payloads| machine.previous(payloads))
    }

    pub fn jump_to(&self, phase_id: &str) -> Result<WorkflowState, NavigationRejection> {
        self.navigate("jump", |machine, payloads| machine.jump_to(phase_id, payloads))
    }

    fn navigate<F>(&self, action: &str, step: F) -> Result<WorkflowState, NavigationRejection>
    where
        F: FnOnce(&mut PhaseStateMachine, &PhasePayloads) -> Result<Transition, NavigationRejection>,
    {
        if self.is_torn_down() {
            return Err(NavigationRejection::Inactive);
        }

        self.touch();
        let mut guard = self.write();
        let live = &mut *guard;
        match step(&mut live.machine, &live.payloads) {
            Ok(Transition::Moved { from, to }) => {
                tracing::debug!("Session {} {}: '{}' -> '{}'", self.session, action, from, to);
            }
            Ok(Transition::WorkflowCompleted { phase_id }) => {
                tracing::info!("Session {} completed its workflow at '{}'", self.session, phase_id);
            }
            Err(rejection) => {
                tracing::debug!("Session {} {} rejected: {}", self.session, action, rejection);
                return Err(rejection);
            }
        }
        live.sync_finish();
        Ok(live.state())
    }

    /// Switch to another variant of the same flow, seeding its first phase
    ///
    /// On any error the current branch, position and payloads are left as they were.
    pub fn transition_branch(&self, target: FlowVariant, seed: &Value) -> Result<BranchOutcome, EngineError> {
        if self.is_torn_down() {
            return Err(EngineError::Inactive(self.session.to_string()));
        }

        self.touch();
        let mut live = self.write();
        let plan = self
            .branches
            .plan_transition(live.machine.registry(), &live.payloads, target, seed)?;

        let mut machine = PhaseStateMachine::new(plan.registry);
        machine.reconcile(&plan.payloads);
        live.machine = machine;
        live.payloads = plan.payloads;
        live.finished_at = None;

        tracing::info!(
            "Session {} branched {} -> {} (carried {:?}, dropped {} phase payloads)",
            self.session,
            plan.report.from,
            plan.report.to,
            plan.report.carried_fields,
            plan.report.dropped_phases.len()
        );

        Ok(BranchOutcome {
            state: live.state(),
            report: plan.report,
            notices: plan.notices,
        })
    }

    /// Persist now; a store failure comes back as a warning, not an error
    pub async fn save_now(&self) -> Result<SaveStatus, EngineError> {
        if self.is_torn_down() {
            return Err(EngineError::Inactive(self.session.to_string()));
        }

        self.touch();
        match self.scheduler.force_save(&self.source).await {
            Ok(saved_at) => {
                tracing::info!("Session {} saved", self.session);
                Ok(SaveStatus::Saved { saved_at })
            }
            Err(e) => {
                tracing::warn!("Explicit save of session {} failed: {}", self.session, e);
                Ok(SaveStatus::Warning {
                    notice: Notice::StorageUnavailable { message: e.to_string() },
                })
            }
        }
    }

    /// Run one diff-checked autosave now, as the timer would
    pub async fn flush(&self) -> TickOutcome {
        self.scheduler.run_tick(&self.source).await
    }

    /// Stop autosave; safe to call any number of times
    pub fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.scheduler.cancel();
        tracing::info!("Session {} torn down", self.session);
    }

    /// Delete the stored draft and tear down; returns whether a draft existed
    ///
    /// The delete waits for any write already in flight and no write follows it.
    /// If the store fails the session stays live and untouched.
    pub async fn discard(&self) -> Result<bool, EngineError> {
        let existed = self.scheduler.discard(self.session.as_str()).await?;
        self.teardown();
        tracing::info!("Session {} discarded (draft existed: {})", self.session, existed);
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::{memory::InMemoryDraftStore, snapshot::fixtures::intake_draft};
    use serde_json::json;

    fn engine() -> (WorkflowEngine, Arc<InMemoryDraftStore>) {
        let store = Arc::new(InMemoryDraftStore::new());
        let catalog = Arc::new(RegistryCatalog::with_builtin().unwrap());
        (WorkflowEngine::new(catalog, Arc::clone(&store) as Arc<dyn DraftStore>), store)
    }

    #[tokio::test]
    async fn unknown_variant_combination_is_a_configuration_error() {
        let (engine, _) = engine();
        let result = engine
            .start(FlowKind::Localization, Some(FlowVariant::Campaign), None)
            .await;
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[tokio::test]
    async fn missing_variant_uses_the_kind_default() {
        let (engine, _) = engine();
        let outcome = engine.start(FlowKind::GlocalAdaptation, None, None).await.unwrap();
        assert_eq!(outcome.state.flow_variant, FlowVariant::Default);
        assert_eq!(outcome.state.current_phase_id, "analysis");
        assert!(!outcome.resumed);
    }

    #[tokio::test]
    async fn payload_updates_do_not_save_or_navigate() {
        let (engine, store) = engine();
        let session = engine.start(FlowKind::Intake, None, None).await.unwrap().orchestrator;

        let state = session
            .update_phase_payload("basic", json!({ "capturedAt": "2024-05-01" }))
            .unwrap();
        assert_eq!(state.current_phase_id, "basic");
        assert!(state.completed_phase_ids.contains("basic"));
        assert!(state.phases[1].reachable);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn payload_for_unknown_phase_is_rejected() {
        let (engine, _) = engine();
        let session = engine.start(FlowKind::Intake, None, None).await.unwrap().orchestrator;
        let err = session.update_phase_payload("theme", json!({})).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[tokio::test]
    async fn advance_to_completion_records_finish() {
        let (engine, store) = engine();
        let session = engine.start(FlowKind::Intake, None, None).await.unwrap().orchestrator;

        for (phase, payload) in [
            ("basic", json!({ "capturedAt": "2024-05-01" })),
            ("assets", json!({ "assets": ["hcp-leaflet"] })),
            ("content", json!({ "completedAt": "2024-05-02" })),
            ("review", json!({ "reviewedAt": "2024-05-03" })),
        ] {
            session.update_phase_payload(phase, payload).unwrap();
            session.advance().unwrap();
        }

        let state = session.state();
        assert!(state.finished);
        assert_eq!(state.progress_percent, 100);

        session.save_now().await.unwrap();
        let LoadOutcome::Found(saved) = store.load(session.session_id().as_str()).await.unwrap() else {
            panic!("draft should be saved");
        };
        assert!(saved.finished_at.is_some());

        let reopened = session.back().unwrap();
        assert!(!reopened.finished);
        assert!(session.snapshot().finished_at.is_none());
    }

    #[tokio::test]
    async fn explicit_save_failure_is_a_warning() {
        let (engine, store) = engine();
        let session = engine.start(FlowKind::Intake, None, None).await.unwrap().orchestrator;
        session.update_phase_payload("basic", json!({ "brand": "Cardiora" })).unwrap();

        store.set_offline(true);
        match session.save_now().await.unwrap() {
            SaveStatus::Warning { notice } => assert!(matches!(notice, Notice::StorageUnavailable { .. })),
            other => panic!("expected a warning, got {other:?}"),
        }
        assert_eq!(session.state().phase_payloads["basic"]["brand"], "Cardiora");
    }

    #[tokio::test]
    async fn unreadable_store_starts_over_under_a_new_id() {
        let (engine, store) = engine();
        store.save(&intake_draft("s-keep")).await.unwrap();
        store.set_offline(true);

        let outcome = engine.start(FlowKind::Intake, None, Some("s-keep")).await.unwrap();
        assert_ne!(outcome.state.session_id.as_str(), "s-keep");
        assert!(matches!(outcome.notices[0], Notice::StorageUnavailable { .. }));
        assert!(!outcome.resumed);
    }

    #[tokio::test]
    async fn resume_clamp_is_reported() {
        let (engine, store) = engine();
        let mut draft = intake_draft("s-clamped");
        draft.phase_payloads.remove("assets");
        store.save(&draft).await.unwrap();

        let outcome = engine.start(FlowKind::Intake, None, Some("s-clamped")).await.unwrap();
        assert_eq!(outcome.state.current_phase_id, "assets");
        assert_eq!(
            outcome.notices,
            vec![Notice::ResumeClamped { requested: "content".into(), resumed_at: "assets".into() }]
        );
    }

    #[tokio::test]
    async fn campaign_resumes_on_first_outstanding_phase() {
        let (engine, store) = engine();
        let mut draft = intake_draft("s-campaign");
        draft.flow_variant = FlowVariant::Campaign;
        draft.current_phase_id = "campaign-setup".into();
        draft.phase_payloads = [
            ("campaign-setup".to_string(), json!({ "projectName": "Q3", "capturedAt": "2024-05-01" })),
            ("deliverables".to_string(), json!({ "deliverables": [{ "type": "email" }] })),
        ]
        .into();
        store.save(&draft).await.unwrap();

        let outcome = engine.start(FlowKind::Intake, None, Some("s-campaign")).await.unwrap();
        assert_eq!(outcome.state.flow_variant, FlowVariant::Campaign);
        assert_eq!(outcome.state.current_phase_id, "theme");
        assert!(outcome.notices.is_empty());
    }

    #[tokio::test]
    async fn branch_transition_replaces_live_state() {
        let (engine, _) = engine();
        let session = engine.start(FlowKind::Intake, None, None).await.unwrap().orchestrator;
        session
            .update_phase_payload("basic", json!({ "brand": "Cardiora", "capturedAt": "2024-05-01" }))
            .unwrap();

        let outcome = session
            .transition_branch(
                FlowVariant::SingleAsset,
                &json!({ "projectName": "Detail aid", "assetType": "leave-behind", "brand": "Cardiora" }),
            )
            .unwrap();

        assert_eq!(outcome.state.flow_variant, FlowVariant::SingleAsset);
        assert_eq!(outcome.state.current_phase_id, "asset-setup");
        assert_eq!(outcome.report.dropped_phases, vec!["basic".to_string()]);
        assert_eq!(outcome.notices, vec![Notice::MissingContext { field: "indication".into() }]);
        assert!(!outcome.state.phase_payloads.contains_key("basic"));
        assert!(!outcome.state.completed_phase_ids.contains("asset-setup"));
    }

    #[tokio::test]
    async fn torn_down_session_rejects_edits_and_navigation() {
        let (engine, _) = engine();
        let session = engine.start(FlowKind::Intake, None, None).await.unwrap().orchestrator;
        session.teardown();
        session.teardown();

        assert_eq!(session.advance().unwrap_err(), NavigationRejection::Inactive);
        assert!(matches!(
            session.update_phase_payload("basic", json!({})),
            Err(EngineError::Inactive(_))
        ));
        assert!(matches!(session.save_now().await, Err(EngineError::Inactive(_))));
    }

    #[tokio::test]
    async fn discard_deletes_the_draft() {
        let (engine, store) = engine();
        let session = engine.start(FlowKind::Intake, None, None).await.unwrap().orchestrator;
        session.update_phase_payload("basic", json!({ "brand": "Cardiora" })).unwrap();
        session.save_now().await.unwrap();

        assert!(session.discard().await.unwrap());
        assert!(session.is_torn_down());
        assert_eq!(
            store.load(session.session_id().as_str()).await.unwrap(),
            LoadOutcome::NotFound
        );
    }

    #[tokio::test(start_paused = true)]
    async fn discard_is_not_undone_by_an_in_flight_autosave() {
        let (engine, store) = engine();
        store.set_save_latency(Duration::from_millis(500));
        let session = engine.start(FlowKind::Intake, None, None).await.unwrap().orchestrator;
        session.update_phase_payload("basic", json!({ "brand": "Cardiora" })).unwrap();

        tokio::time::sleep(Duration::from_millis(30_100)).await;
        assert!(session.discard().await.unwrap());
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(
            store.load(session.session_id().as_str()).await.unwrap(),
            LoadOutcome::NotFound
        );
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn stepper_view_looks_through_optional_phases() {
        let (engine, _) = engine();
        let session = engine.start(FlowKind::GlocalAdaptation, None, None).await.unwrap().orchestrator;

        let reachable = |state: &WorkflowState| -> Vec<bool> { state.phases.iter().map(|p| p.reachable).collect() };
        assert_eq!(reachable(&session.state()), [true, false, false, false, false]);

        let state = session
            .update_phase_payload("analysis", json!({ "generatedAt": "2024-05-01" }))
            .unwrap();
        assert_eq!(reachable(&state), [true, true, true, false, false]);
    }

    #[tokio::test]
    async fn draft_of_another_flow_kind_starts_over_under_a_new_id() {
        let (engine, store) = engine();
        let stored = intake_draft("s-intake");
        store.save(&stored).await.unwrap();

        let outcome = engine.start(FlowKind::Localization, None, Some("s-intake")).await.unwrap();
        assert!(!outcome.resumed);
        assert_ne!(outcome.state.session_id.as_str(), "s-intake");
        assert_eq!(outcome.state.flow_kind, FlowKind::Localization);
        assert!(matches!(
            &outcome.notices[..],
            [Notice::DraftIncompatible { session_id, .. }] if session_id == "s-intake"
        ));
        assert_eq!(store.load("s-intake").await.unwrap(), LoadOutcome::Found(stored));
    }

    #[tokio::test]
    async fn draft_of_an_uninstalled_variant_starts_over_under_a_new_id() {
        let (engine, store) = engine();
        let mut draft = intake_draft("s-campaign");
        draft.flow_variant = FlowVariant::Campaign;
        draft.current_phase_id = "campaign-setup".into();
        store.save(&draft).await.unwrap();
        assert!(engine.catalog().remove(FlowKind::Intake, FlowVariant::Campaign));

        let outcome = engine.start(FlowKind::Intake, None, Some("s-campaign")).await.unwrap();
        assert!(!outcome.resumed);
        assert_ne!(outcome.state.session_id.as_str(), "s-campaign");
        assert_eq!(outcome.state.flow_variant, FlowVariant::Default);
        assert_eq!(outcome.state.current_phase_id, "basic");
        assert!(matches!(outcome.notices[0], Notice::DraftIncompatible { .. }));
        assert!(matches!(store.load("s-campaign").await.unwrap(), LoadOutcome::Found(_)));
    }
}
