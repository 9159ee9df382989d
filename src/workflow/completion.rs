/// Completion inference for phase payloads
///
/// Every phase is produced by an independent sub-feature with its own payload
/// shape, so completion is decided by a small rule selected from the phase's
/// `PayloadTag`. Rules are pure: a missing, non-object or mistyped payload is
/// simply "not complete" (the user has not reached that phase yet).

use crate::workflow::{
    registry::PhaseRegistry,
    types::{PayloadTag, PhaseDescriptor, PhasePayloads},
};
use serde_json::Value;
use std::collections::BTreeSet;

/// Required-field check applied to one payload object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionRule {
    /// Field holds a non-null timestamp (non-blank string or epoch number)
    Timestamp(&'static str),
    /// Field holds an array with at least one element
    NonEmptyList(&'static str),
    /// Field holds a non-blank string
    NonEmptyText(&'static str),
    /// Every nested rule holds
    AllOf(&'static [CompletionRule]),
}

impl CompletionRule {
    pub fn holds(&self, payload: &Value) -> bool {
        let Some(object) = payload.as_object() else {
            return false;
        };

        match self {
            Self::Timestamp(field) => match object.get(*field) {
                Some(Value::String(s)) => !s.trim().is_empty(),
                Some(Value::Number(_)) => true,
                _ => false,
            },
            Self::NonEmptyList(field) => object
                .get(*field)
                .and_then(Value::as_array)
                .is_some_and(|items| !items.is_empty()),
            Self::NonEmptyText(field) => object
                .get(*field)
                .and_then(Value::as_str)
                .is_some_and(|s| !s.trim().is_empty()),
            Self::AllOf(rules) => rules.iter().all(|rule| rule.holds(payload)),
        }
    }
}

const PROJECT_SETUP: &[CompletionRule] = &[
    CompletionRule::NonEmptyText("projectName"),
    CompletionRule::Timestamp("capturedAt"),
];

const THEME_SELECTION: &[CompletionRule] = &[
    CompletionRule::Timestamp("generatedAt"),
    CompletionRule::NonEmptyText("selectedThemeId"),
];

/// Rule selected by a payload tag
pub fn rule_for(tag: PayloadTag) -> CompletionRule {
    use CompletionRule::*;

    match tag {
        PayloadTag::BasicInfo => Timestamp("capturedAt"),
        PayloadTag::AssetSelection => NonEmptyList("assets"),
        PayloadTag::ProjectSetup => AllOf(PROJECT_SETUP),
        PayloadTag::DeliverablePlan => NonEmptyList("deliverables"),
        PayloadTag::ThemeSelection => AllOf(THEME_SELECTION),
        PayloadTag::ContentDraft => Timestamp("completedAt"),
        PayloadTag::Review => Timestamp("reviewedAt"),
        PayloadTag::Finalization => Timestamp("finalizedAt"),
        PayloadTag::SourceCapture => Timestamp("capturedAt"),
        PayloadTag::MarketSelection => NonEmptyList("markets"),
        PayloadTag::Translation => Timestamp("completedAt"),
        PayloadTag::MarketAnalysis => Timestamp("generatedAt"),
        PayloadTag::MarketContext => Timestamp("capturedAt"),
        PayloadTag::Adaptation => Timestamp("completedAt"),
    }
}

/// Whether a phase has produced valid output
///
/// Independent of whether the phase is the active step: a user who navigated
/// back to revise still has complete later phases.
pub fn is_complete(phase: &PhaseDescriptor, payload: Option<&Value>) -> bool {
    payload.is_some_and(|payload| rule_for(phase.payload_tag).holds(payload))
}

/// Whether a phase lets its successor open (complete, or optional)
pub fn is_satisfied(phase: &PhaseDescriptor, payload: Option<&Value>) -> bool {
    !phase.required || is_complete(phase, payload)
}

/// Re-derive the completed phase set from live payloads
pub fn derive_completed(registry: &PhaseRegistry, payloads: &PhasePayloads) -> BTreeSet<String> {
    registry
        .phases()
        .iter()
        .filter(|phase| is_complete(phase, payloads.get(&phase.id)))
        .map(|phase| phase.id.clone())
        .collect()
}
