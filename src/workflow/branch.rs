/// Flow branch controller
///
/// Decides which variant's registry to materialize when a session resumes, and
/// plans explicit transitions between mutually exclusive variants (for example
/// intake -> campaign). Planning is pure: the orchestrator applies a plan only
/// after it validated, so a rejected transition leaves the prior branch untouched.

use crate::draft::snapshot::DraftSnapshot;
use crate::error::{EngineError, Notice};
use crate::workflow::{
    machine::{PhaseStateMachine, ResumePoint},
    registry::{PhaseRegistry, RegistryCatalog},
    types::{FlowKind, FlowVariant, PhasePayloads},
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// What a branch transition kept and what it dropped from live state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchReport {
    pub from: FlowVariant,
    pub to: FlowVariant,
    /// Phase of the new branch that received the seed
    pub seeded_phase_id: String,
    /// Seed fields copied into the seeded phase
    pub carried_fields: Vec<String>,
    /// Seed fields with no mapping in the new branch
    pub dropped_fields: Vec<String>,
    /// Prior-branch phases whose payloads left the live state
    pub dropped_phases: Vec<String>,
}

/// Validated transition, ready to apply
#[derive(Debug, Clone)]
pub struct BranchPlan {
    pub registry: Arc<PhaseRegistry>,
    pub payloads: PhasePayloads,
    pub report: BranchReport,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone)]
pub struct FlowBranchController {
    catalog: Arc<RegistryCatalog>,
}

impl FlowBranchController {
    pub fn new(catalog: Arc<RegistryCatalog>) -> Self {
        Self { catalog }
    }

    /// Registry and position for a resumed session
    ///
    /// The variant stored with the draft is authoritative; a different requested
    /// variant is logged and ignored. A draft of a different flow kind is a
    /// configuration error rather than a silent switch of business context.
    pub fn resume(
        &self,
        kind: FlowKind,
        requested: FlowVariant,
        snapshot: &DraftSnapshot,
    ) -> Result<(PhaseStateMachine, ResumePoint), EngineError> {
        if kind != snapshot.flow_kind {
            return Err(EngineError::configuration(format!(
                "draft {} belongs to flow '{}', not '{}'",
                snapshot.session_id, snapshot.flow_kind, kind
            )));
        }
        if requested != snapshot.flow_variant {
            tracing::info!(
                "Resuming {} draft on stored variant '{}' (requested '{}')",
                kind,
                snapshot.flow_variant,
                requested
            );
        }

        let registry = self.catalog.phases_for(snapshot.flow_kind, snapshot.flow_variant)?;
        Ok(PhaseStateMachine::resume(
            registry,
            &snapshot.current_phase_id,
            snapshot.finished_at.is_some(),
            &snapshot.phase_payloads,
        ))
    }

    /// Plan a switch from `current` to `target`, seeding the target's first phase
    pub fn plan_transition(
        &self,
        current: &PhaseRegistry,
        current_payloads: &PhasePayloads,
        target: FlowVariant,
        seed: &Value,
    ) -> Result<BranchPlan, EngineError> {
        if !current.can_branch_to(target) {
            return Err(EngineError::configuration(format!(
                "flow {}/{} cannot branch into '{}'",
                current.kind(),
                current.variant(),
                target
            )));
        }

        let registry = self.catalog.phases_for(current.kind(), target)?;
        let entry = registry.first();
        let spec = entry.seed.clone().unwrap_or_default();

        let empty = Map::new();
        let seed_object = match seed {
            Value::Object(object) => object,
            Value::Null => &empty,
            _ => {
                return Err(EngineError::configuration(format!(
                    "seed for '{}' must be a JSON object",
                    target
                )))
            }
        };

        let missing: Vec<&str> = spec
            .required
            .iter()
            .filter(|field| !is_present(seed_object.get(field.as_str())))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(EngineError::configuration(format!(
                "seed for '{}' phase '{}' is missing required fields: {}",
                target,
                entry.id,
                missing.join(", ")
            )));
        }

        let mut seeded = Map::new();
        let mut carried_fields = Vec::new();
        let mut dropped_fields = Vec::new();
        for (field, value) in seed_object {
            if spec.accepts(field) && !value.is_null() {
                seeded.insert(field.clone(), value.clone());
                carried_fields.push(field.clone());
            } else {
                dropped_fields.push(field.clone());
            }
        }

        let notices: Vec<Notice> = spec
            .context
            .iter()
            .filter(|field| !is_present(seed_object.get(field.as_str())))
            .map(|field| {
                tracing::warn!("Branch seed for '{}' has no '{}'; leaving it unset", target, field);
                Notice::MissingContext { field: field.clone() }
            })
            .collect();

        let dropped_phases = current_payloads.keys().cloned().collect();

        let mut payloads = PhasePayloads::new();
        payloads.insert(entry.id.clone(), Value::Object(seeded));

        let report = BranchReport {
            from: current.variant(),
            to: target,
            seeded_phase_id: entry.id.clone(),
            carried_fields,
            dropped_fields,
            dropped_phases,
        };

        Ok(BranchPlan {
            registry,
            payloads,
            report,
            notices,
        })
    }
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}
