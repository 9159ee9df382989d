/// Error taxonomy for the workflow engine
///
/// Two kinds of failure live here:
/// - `EngineError`: failures of a requested operation (bad flow names, bad branch
///   seeds, storage outages surfaced to an explicit caller)
/// - `NavigationRejection`: expected, structured refusals of a navigation attempt
///
/// `Notice` carries the non-fatal warnings the orchestrator downgrades
/// infrastructure problems into, so the UI can show them without blocking.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Failure of a requested engine operation
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid flow kind/variant, unknown phase, or a branch seed missing required fields
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The draft store could not be reached or returned unreadable data
    #[error("draft storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The orchestrator was torn down and no longer accepts edits
    #[error("workflow session {0} has been torn down")]
    Inactive(String),
}

impl EngineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Structured refusal of a navigation attempt
///
/// These are normal runtime outcomes (the UI shows gating feedback), never panics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NavigationRejection {
    /// Target phase is gated behind a predecessor that is not complete
    PhaseLocked { phase_id: String, blocked_by: String },
    /// `advance` was called while the current phase's payload is not complete
    PhaseIncomplete { phase_id: String },
    /// `back` was called on the first phase
    AtFirstPhase,
    /// Target phase does not exist in the active registry
    UnknownPhase { phase_id: String },
    /// The orchestrator was torn down
    Inactive,
}

impl fmt::Display for NavigationRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PhaseLocked { phase_id, blocked_by } => {
                write!(f, "phase '{}' is locked until '{}' is complete", phase_id, blocked_by)
            }
            Self::PhaseIncomplete { phase_id } => write!(f, "phase '{}' is not complete", phase_id),
            Self::AtFirstPhase => write!(f, "already at the first phase"),
            Self::UnknownPhase { phase_id } => write!(f, "unknown phase '{}'", phase_id),
            Self::Inactive => write!(f, "workflow session is no longer active"),
        }
    }
}

/// Non-fatal warning reported alongside a successful result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// Resume requested for a session with no stored draft; started over
    DraftNotFound { session_id: String },
    /// The stored draft belongs to another flow kind or to a variant no longer
    /// installed; started over under a new session so it is left untouched
    DraftIncompatible { session_id: String, message: String },
    /// A store call failed; in-memory state is still authoritative
    StorageUnavailable { message: String },
    /// A business-context field was absent and deliberately not defaulted
    MissingContext { field: String },
    /// The stored phase was no longer reachable, so the session resumed earlier
    ResumeClamped { requested: String, resumed_at: String },
}
