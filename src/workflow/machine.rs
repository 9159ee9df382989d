/// Phase state machine
///
/// Holds the current phase pointer and the completed-phase set of one workflow and
/// enforces gating: a phase opens only once its predecessor is complete, where
/// optional predecessors are looked through to the nearest required one. The
/// completed set is re-derived from live payloads before every navigation
/// decision, because sub-features can clear their own output at any time.

use crate::error::NavigationRejection;
use crate::workflow::{
    completion::{derive_completed, is_satisfied},
    registry::PhaseRegistry,
    types::{PhaseDescriptor, PhasePayloads, ResumePolicy},
};
use serde::Serialize;
use std::{collections::BTreeSet, sync::Arc};

/// Outcome of an accepted navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transition {
    Moved { from: String, to: String },
    /// `next()` on the last phase with complete output
    WorkflowCompleted { phase_id: String },
}

/// Where a resumed session landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePoint {
    pub stored_phase_id: String,
    pub resumed_at: String,
    /// Landed somewhere other than the stored phase because gating forbade it
    pub clamped: bool,
}

#[derive(Debug, Clone)]
pub struct PhaseStateMachine {
    registry: Arc<PhaseRegistry>,
    cursor: usize,
    completed: BTreeSet<String>,
    finished: bool,
}

impl PhaseStateMachine {
    /// Fresh machine positioned on the first phase
    pub fn new(registry: Arc<PhaseRegistry>) -> Self {
        Self {
            registry,
            cursor: 0,
            completed: BTreeSet::new(),
            finished: false,
        }
    }

    /// Rebuild a machine from a stored position, following the registry's resume policy
    ///
    /// The stored completed set is never trusted; it is recomputed from `payloads`.
    pub fn resume(
        registry: Arc<PhaseRegistry>,
        stored_phase_id: &str,
        stored_finished: bool,
        payloads: &PhasePayloads,
    ) -> (Self, ResumePoint) {
        let mut machine = Self::new(registry);
        machine.completed = derive_completed(&machine.registry, payloads);

        let frontier = machine.frontier(payloads);
        let stored_index = machine.registry.index_of(stored_phase_id);

        let target = match machine.registry.resume_policy() {
            ResumePolicy::StoredPhase => stored_index
                .filter(|&index| machine.gate(index, payloads).is_ok())
                .unwrap_or(frontier),
            ResumePolicy::FirstIncomplete => frontier,
        };
        machine.cursor = target;

        let last = machine.registry.last_index();
        if stored_finished && machine.satisfied(last, payloads) && machine.gate(last, payloads).is_ok() {
            machine.cursor = last;
            machine.finished = true;
        }

        let resumed_at = machine.current_phase_id().to_string();
        let clamped = machine.registry.resume_policy() == ResumePolicy::StoredPhase
            && stored_index != Some(machine.cursor);

        let point = ResumePoint {
            stored_phase_id: stored_phase_id.to_string(),
            resumed_at,
            clamped,
        };
        (machine, point)
    }

    pub fn registry(&self) -> &Arc<PhaseRegistry> {
        &self.registry
    }

    pub fn current(&self) -> &PhaseDescriptor {
        &self.registry.phases()[self.cursor]
    }

    pub fn current_index(&self) -> usize {
        self.cursor
    }

    pub fn current_phase_id(&self) -> &str {
        &self.current().id
    }

    /// Completed phases as of the last reconcile
    pub fn completed(&self) -> &BTreeSet<String> {
        &self.completed
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Share of required phases that are complete, 0..=100
    pub fn progress_percent(&self) -> u8 {
        let required: Vec<_> = self.registry.phases().iter().filter(|p| p.required).collect();
        if required.is_empty() {
            return if self.finished { 100 } else { 0 };
        }
        let done = required.iter().filter(|p| self.completed.contains(&p.id)).count();
        ((done * 100) / required.len()) as u8
    }

    /// Re-derive the completed set from live payloads
    ///
    /// A finished workflow whose last phase lost its output is no longer finished.
    pub fn reconcile(&mut self, payloads: &PhasePayloads) {
        self.completed = derive_completed(&self.registry, payloads);
        if self.finished && !self.satisfied(self.registry.last_index(), payloads) {
            tracing::debug!("Last phase output was cleared, reopening workflow");
            self.finished = false;
        }
    }

    /// Whether the phase at `index` can be entered right now
    pub fn can_enter(&mut self, index: usize, payloads: &PhasePayloads) -> Result<(), NavigationRejection> {
        self.reconcile(payloads);
        self.gate(index, payloads)
    }

    /// Advance past the current phase, or complete the workflow on the last one
    pub fn next(&mut self, payloads: &PhasePayloads) -> Result<Transition, NavigationRejection> {
        self.reconcile(payloads);

        let from = self.current_phase_id().to_string();
        if !self.satisfied(self.cursor, payloads) {
            return Err(NavigationRejection::PhaseIncomplete { phase_id: from });
        }

        if self.cursor == self.registry.last_index() {
            self.finished = true;
            return Ok(Transition::WorkflowCompleted { phase_id: from });
        }

        self.gate(self.cursor + 1, payloads)?;
        self.cursor += 1;
        Ok(Transition::Moved {
            from,
            to: self.current_phase_id().to_string(),
        })
    }

    /// Step back one phase; never touches completion
    pub fn previous(&mut self, payloads: &PhasePayloads) -> Result<Transition, NavigationRejection> {
        self.reconcile(payloads);

        if self.cursor == 0 {
            return Err(NavigationRejection::AtFirstPhase);
        }

        let from = self.current_phase_id().to_string();
        self.cursor -= 1;
        self.finished = false;
        Ok(Transition::Moved {
            from,
            to: self.current_phase_id().to_string(),
        })
    }

    /// Jump to any phase whose predecessor is complete
    pub fn jump_to(&mut self, phase_id: &str, payloads: &PhasePayloads) -> Result<Transition, NavigationRejection> {
        self.reconcile(payloads);

        let index = self.registry.index_of(phase_id).ok_or_else(|| NavigationRejection::UnknownPhase {
            phase_id: phase_id.to_string(),
        })?;
        self.gate(index, payloads)?;

        let from = self.current_phase_id().to_string();
        if index != self.cursor {
            self.cursor = index;
            self.finished = false;
        }
        Ok(Transition::Moved {
            from,
            to: phase_id.to_string(),
        })
    }

    fn satisfied(&self, index: usize, payloads: &PhasePayloads) -> bool {
        let phase = &self.registry.phases()[index];
        is_satisfied(phase, payloads.get(&phase.id))
    }

    fn gate(&self, index: usize, payloads: &PhasePayloads) -> Result<(), NavigationRejection> {
        match blocking_phase(&self.registry, index, payloads) {
            None => Ok(()),
            Some(blocker) => {
                let phases = self.registry.phases();
                Err(NavigationRejection::PhaseLocked {
                    phase_id: phases[index].id.clone(),
                    blocked_by: phases[blocker].id.clone(),
                })
            }
        }
    }

    /// First phase that does not let its successor open, or the last phase
    fn frontier(&self, payloads: &PhasePayloads) -> usize {
        (0..self.registry.len())
            .find(|&index| !self.satisfied(index, payloads))
            .unwrap_or(self.registry.last_index())
    }
}

/// Index of the phase keeping the phase at `index` locked, if any
///
/// Walks back through optional predecessors to the nearest required one; a run
/// of optional phases at the start of the registry gates nothing.
pub fn blocking_phase(registry: &PhaseRegistry, index: usize, payloads: &PhasePayloads) -> Option<usize> {
    let phases = registry.phases();
    for prior in (0..index.min(phases.len())).rev() {
        let phase = &phases[prior];
        if !is_satisfied(phase, payloads.get(&phase.id)) {
            return Some(prior);
        }
        if phase.required {
            return None;
        }
    }
    None
}
