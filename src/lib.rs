/// Phaseway: resumable multi-phase workflow engine
///
/// This library drives gated, multi-phase content-authoring workflows: phase
/// registries per flow, completion inferred from phase payloads, resumable drafts
/// with autosave, and explicit branch transitions between flow variants.

// Core configuration and setup
pub mod config;

// Error taxonomy, navigation rejections and non-fatal notices
pub mod error;

// Session identity for one workflow attempt
pub mod session;

// Workflow model layer - flows, registries, completion, state machine, branches
pub mod workflow;

// Draft persistence layer - snapshots and the DraftStore boundary
pub mod draft;

// Session runtime - autosave, orchestrator, session hub
pub mod runtime;

// HTTP API layer - REST endpoints for sessions and drafts
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use draft::{DraftSnapshot, DraftStore, InMemoryDraftStore, LoadOutcome, SqliteDraftStore};
pub use error::{EngineError, NavigationRejection, Notice};
pub use runtime::{SaveStatus, SessionHub, WorkflowEngine, WorkflowOrchestrator, WorkflowState};
pub use server::start_server;
pub use session::{SessionId, SessionIdentity};
pub use workflow::{FlowKind, FlowVariant, RegistryCatalog};
