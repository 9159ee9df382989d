/// Session runtime
///
/// This module drives live workflow attempts:
/// - Autosave scheduling on a fixed tokio interval
/// - The orchestrator tying state machine, branches and autosave together
/// - The per-process session hub

// Background autosave timer with diff-checked writes
pub mod scheduler;

// Start/resume and per-session orchestration
pub mod orchestrator;

// Live sessions keyed by session id
pub mod hub;

// Re-export main types
pub use hub::SessionHub;
pub use orchestrator::{
    BranchOutcome, PhaseView, SaveStatus, StartOutcome, WorkflowEngine, WorkflowOrchestrator, WorkflowState,
};
pub use scheduler::{AutoSaveScheduler, TickOutcome};
