/// Draft snapshot: the persisted unit of a workflow attempt
///
/// A snapshot is always a whole-state copy; saves overwrite, never patch.

use crate::workflow::types::{FlowKind, FlowVariant, PhasePayloads};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Informational format tag written with every snapshot
pub const SNAPSHOT_VERSION: &str = concat!("phaseway/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    pub session_id: String,
    /// Informational only, not an optimistic-concurrency token
    pub version: String,
    pub saved_at: DateTime<Utc>,
    pub flow_kind: FlowKind,
    pub flow_variant: FlowVariant,
    pub current_phase_id: String,
    /// Cached for listings; re-derived on resume
    pub completed_phase_ids: BTreeSet<String>,
    pub phase_payloads: PhasePayloads,
    pub progress_percent: u8,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Everything in a snapshot except save metadata
///
/// Two snapshots with equal content are the same draft; autosave compares these.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotContent {
    pub flow_kind: FlowKind,
    pub flow_variant: FlowVariant,
    pub current_phase_id: String,
    pub completed_phase_ids: BTreeSet<String>,
    pub phase_payloads: PhasePayloads,
    pub finished: bool,
}

/// Listing row for a "resume a draft" picker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSummary {
    pub session_id: String,
    pub flow_kind: FlowKind,
    pub flow_variant: FlowVariant,
    pub current_phase_id: String,
    pub progress_percent: u8,
    pub saved_at: DateTime<Utc>,
}

impl DraftSnapshot {
    pub fn content(&self) -> SnapshotContent {
        SnapshotContent {
            flow_kind: self.flow_kind,
            flow_variant: self.flow_variant,
            current_phase_id: self.current_phase_id.clone(),
            completed_phase_ids: self.completed_phase_ids.clone(),
            phase_payloads: self.phase_payloads.clone(),
            finished: self.finished_at.is_some(),
        }
    }

    pub fn summary(&self) -> DraftSummary {
        DraftSummary {
            session_id: self.session_id.clone(),
            flow_kind: self.flow_kind,
            flow_variant: self.flow_variant,
            current_phase_id: self.current_phase_id.clone(),
            progress_percent: self.progress_percent,
            saved_at: self.saved_at,
        }
    }

    pub fn has_payloads(&self) -> bool {
        !self.phase_payloads.is_empty()
    }
}
