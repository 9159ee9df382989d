/// Phase registries and the hot-swappable registry catalog
///
/// A `PhaseRegistry` is the immutable, ordered phase list of one flow kind and
/// variant. The `RegistryCatalog` maps (kind, variant) to registries using ArcSwap,
/// so a registry can be replaced at runtime while live orchestrators keep the
/// `Arc` they started with.

use crate::error::EngineError;
use crate::workflow::{
    catalog,
    types::{FlowKind, FlowVariant, PhaseDescriptor, ResumePolicy},
};
use arc_swap::ArcSwap;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

/// Ordered, immutable phase list for one flow kind and variant
#[derive(Debug, Clone)]
pub struct PhaseRegistry {
    kind: FlowKind,
    variant: FlowVariant,
    phases: Vec<PhaseDescriptor>,
    resume_policy: ResumePolicy,
    /// Variants this one may branch into
    branches_to: Vec<FlowVariant>,
}

impl PhaseRegistry {
    /// Build a registry, validating that it has phases with unique ids
    pub fn new(
        kind: FlowKind,
        variant: FlowVariant,
        phases: Vec<PhaseDescriptor>,
        resume_policy: ResumePolicy,
        branches_to: Vec<FlowVariant>,
    ) -> Result<Self, EngineError> {
        if phases.is_empty() {
            return Err(EngineError::configuration(format!(
                "registry {}/{} has no phases",
                kind, variant
            )));
        }

        let mut seen = HashSet::new();
        for phase in &phases {
            if phase.id.trim().is_empty() {
                return Err(EngineError::configuration(format!(
                    "registry {}/{} has a phase with an empty id",
                    kind, variant
                )));
            }
            if !seen.insert(phase.id.as_str()) {
                return Err(EngineError::configuration(format!(
                    "registry {}/{} declares phase '{}' twice",
                    kind, variant, phase.id
                )));
            }
        }

        Ok(Self {
            kind,
            variant,
            phases,
            resume_policy,
            branches_to,
        })
    }

    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    pub fn variant(&self) -> FlowVariant {
        self.variant
    }

    pub fn resume_policy(&self) -> ResumePolicy {
        self.resume_policy
    }

    pub fn phases(&self) -> &[PhaseDescriptor] {
        &self.phases
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PhaseDescriptor> {
        self.phases.get(index)
    }

    /// First phase (registries are never empty)
    pub fn first(&self) -> &PhaseDescriptor {
        &self.phases[0]
    }

    pub fn last_index(&self) -> usize {
        self.phases.len() - 1
    }

    pub fn index_of(&self, phase_id: &str) -> Option<usize> {
        self.phases.iter().position(|phase| phase.id == phase_id)
    }

    pub fn contains(&self, phase_id: &str) -> bool {
        self.index_of(phase_id).is_some()
    }

    pub fn can_branch_to(&self, variant: FlowVariant) -> bool {
        self.branches_to.contains(&variant)
    }
}

/// Lock-free catalog of phase registries
///
/// Lookups clone an `Arc<PhaseRegistry>`, so they never block installs.
#[derive(Debug)]
pub struct RegistryCatalog {
    registries: ArcSwap<HashMap<(FlowKind, FlowVariant), Arc<PhaseRegistry>>>,
}

impl RegistryCatalog {
    /// Empty catalog (every lookup fails until registries are installed)
    pub fn new() -> Self {
        Self {
            registries: ArcSwap::new(Arc::new(HashMap::new())),
        }
    }

    /// Catalog preloaded with the intake, localization and glocal-adaptation flows
    pub fn with_builtin() -> Result<Self, EngineError> {
        let catalog = Self::new();
        let builtin = catalog::builtin_registries()?;
        let map = builtin
            .into_iter()
            .map(|registry| ((registry.kind(), registry.variant()), Arc::new(registry)))
            .collect();
        catalog.registries.store(Arc::new(map));

        tracing::info!("Initialized registry catalog with {} flows", catalog.registries.load().len());
        Ok(catalog)
    }

    /// Ordered phases for a flow kind and variant
    pub fn phases_for(&self, kind: FlowKind, variant: FlowVariant) -> Result<Arc<PhaseRegistry>, EngineError> {
        self.registries
            .load()
            .get(&(kind, variant))
            .cloned()
            .ok_or_else(|| {
                EngineError::configuration(format!("no phase registry for flow {}/{}", kind, variant))
            })
    }

    /// Install or replace a registry
    ///
    /// Orchestrators already running keep the registry they started with.
    pub fn install(&self, registry: PhaseRegistry) {
        let key = (registry.kind(), registry.variant());
        let current = self.registries.load();
        let mut next = (**current).clone();
        next.insert(key, Arc::new(registry));
        self.registries.store(Arc::new(next));

        tracing::info!("Installed phase registry: {}/{}", key.0, key.1);
    }

    /// Remove a registry; returns whether one was installed
    pub fn remove(&self, kind: FlowKind, variant: FlowVariant) -> bool {
        let current = self.registries.load();
        let mut next = (**current).clone();
        let removed = next.remove(&(kind, variant)).is_some();
        if removed {
            self.registries.store(Arc::new(next));
            tracing::info!("Removed phase registry: {}/{}", kind, variant);
        }
        removed
    }

    /// Installed (kind, variant) pairs, sorted
    pub fn flows(&self) -> Vec<(FlowKind, FlowVariant)> {
        let mut keys: Vec<_> = self.registries.load().keys().copied().collect();
        keys.sort();
        keys
    }
}

impl Default for RegistryCatalog {
    fn default() -> Self {
        Self::new()
    }
}
