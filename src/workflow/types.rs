/// Core workflow type definitions
///
/// Defines flow kinds, flow variants (the mutually exclusive branches a flow can
/// take), payload tags and phase descriptors. Payloads themselves stay opaque JSON:
/// only the completion rules selected by a `PayloadTag` ever look inside them.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Live payloads of a workflow, keyed by phase id
pub type PhasePayloads = BTreeMap<String, Value>;

/// Top-level workflow families the engine drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowKind {
    /// Brief intake that can fork into single-asset or campaign production
    Intake,
    /// Translation of an approved asset into target markets
    Localization,
    /// Market-specific adaptation of a global asset
    GlocalAdaptation,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::Localization => "localization",
            Self::GlocalAdaptation => "glocal-adaptation",
        }
    }

    /// Variant used when `start` is called without one
    pub fn default_variant(&self) -> FlowVariant {
        FlowVariant::Default
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "intake" => Ok(Self::Intake),
            "localization" => Ok(Self::Localization),
            "glocal-adaptation" | "glocal" => Ok(Self::GlocalAdaptation),
            other => Err(EngineError::configuration(format!("unknown flow kind '{}'", other))),
        }
    }
}

/// Mutually exclusive continuation of a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowVariant {
    /// The only variant of non-forking flows, and the pre-fork track of intake
    Default,
    /// One deliverable produced end to end
    SingleAsset,
    /// Several deliverables sharing one theme and review cycle
    Campaign,
}

impl FlowVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::SingleAsset => "single-asset",
            Self::Campaign => "campaign",
        }
    }
}

impl fmt::Display for FlowVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowVariant {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "default" => Ok(Self::Default),
            "single-asset" | "single" => Ok(Self::SingleAsset),
            "campaign" => Ok(Self::Campaign),
            other => Err(EngineError::configuration(format!("unknown flow variant '{}'", other))),
        }
    }
}

/// Where a resumed session lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResumePolicy {
    /// Return to the stored phase, clamped back if gating no longer allows it
    StoredPhase,
    /// Open on the first phase whose payload is not complete
    FirstIncomplete,
}

/// Closed set of payload shapes produced by phase sub-features
///
/// Each tag selects exactly one completion rule (see `workflow::completion`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadTag {
    /// Brand, indication and audience capture: `capturedAt`
    BasicInfo,
    /// Reference asset picker: non-empty `assets`
    AssetSelection,
    /// Project header of a produced track: non-empty `projectName` and `capturedAt`
    ProjectSetup,
    /// Campaign deliverable plan: non-empty `deliverables`
    DeliverablePlan,
    /// Generated themes with one selected: `generatedAt` and `selectedThemeId`
    ThemeSelection,
    /// Authored copy: `completedAt`
    ContentDraft,
    /// Medical/legal/regulatory or cultural review: `reviewedAt`
    Review,
    /// Locked final output: `finalizedAt`
    Finalization,
    /// Source asset chosen for localization: `capturedAt`
    SourceCapture,
    /// Target markets: non-empty `markets`
    MarketSelection,
    /// Translation workspace output: `completedAt`
    Translation,
    /// Automated source analysis: `generatedAt`
    MarketAnalysis,
    /// Local market research notes: `capturedAt`
    MarketContext,
    /// Adapted copy: `completedAt`
    Adaptation,
}

/// Fields a branch's first phase accepts as seed data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSpec {
    /// Must be present and non-null or the transition is rejected
    pub required: Vec<String>,
    /// Copied when present
    pub carried: Vec<String>,
    /// Business context copied when present; reported, never defaulted, when absent
    pub context: Vec<String>,
}

impl SeedSpec {
    pub fn new(required: &[&str], carried: &[&str], context: &[&str]) -> Self {
        let owned = |fields: &[&str]| -> Vec<String> { fields.iter().map(|f| f.to_string()).collect() };
        Self {
            required: owned(required),
            carried: owned(carried),
            context: owned(context),
        }
    }

    /// Whether the seed spec accepts a field at all
    pub fn accepts(&self, field: &str) -> bool {
        self.required.iter().chain(&self.carried).chain(&self.context).any(|f| f == field)
    }
}

/// Static description of one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseDescriptor {
    /// Stable identifier, unique within its registry
    pub id: String,
    /// Human-readable title
    pub title: String,
    /// Optional phases do not gate their successor and do not count toward progress
    pub required: bool,
    /// Payload shape this phase produces
    pub payload_tag: PayloadTag,
    /// Seed contract when this phase opens a branch
    pub seed: Option<SeedSpec>,
}

impl PhaseDescriptor {
    pub fn new(id: &str, title: &str, payload_tag: PayloadTag) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            required: true,
            payload_tag,
            seed: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_seed(mut self, seed: SeedSpec) -> Self {
        self.seed = Some(seed);
        self
    }
}
