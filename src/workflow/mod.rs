/// Workflow model layer
///
/// Everything that decides *where* a session is, with no I/O:
/// - Flow and phase types, and the hot-swappable registry catalog (ArcSwap)
/// - Built-in flow blueprints
/// - Completion inference from phase payloads
/// - The gated phase state machine
/// - Branch planning between flow variants

pub mod types;

pub mod registry;

pub mod catalog;

pub mod completion;

pub mod machine;

pub mod branch;

pub use branch::{BranchPlan, BranchReport, FlowBranchController};
pub use machine::{PhaseStateMachine, ResumePoint, Transition};
pub use registry::{PhaseRegistry, RegistryCatalog};
pub use types::{FlowKind, FlowVariant, PayloadTag, PhaseDescriptor, PhasePayloads, ResumePolicy, SeedSpec};
