/// Built-in flow blueprints
///
/// Phase orders for intake (pre-fork, single-asset, campaign), localization and
/// glocal adaptation.

use crate::error::EngineError;
use crate::workflow::{
    registry::PhaseRegistry,
    types::{FlowKind, FlowVariant, PayloadTag, PhaseDescriptor, ResumePolicy, SeedSpec},
};

/// Business context carried into produced tracks; never defaulted
const BRAND_CONTEXT: &[&str] = &["brand", "indication"];

pub fn builtin_registries() -> Result<Vec<PhaseRegistry>, EngineError> {
    Ok(vec![
        intake_default()?,
        intake_single_asset()?,
        intake_campaign()?,
        localization()?,
        glocal_adaptation()?,
    ])
}

fn intake_default() -> Result<PhaseRegistry, EngineError> {
    PhaseRegistry::new(
        FlowKind::Intake,
        FlowVariant::Default,
        vec![
            PhaseDescriptor::new("basic", "Brand & audience", PayloadTag::BasicInfo),
            PhaseDescriptor::new("assets", "Reference assets", PayloadTag::AssetSelection),
            PhaseDescriptor::new("content", "Key messages", PayloadTag::ContentDraft),
            PhaseDescriptor::new("review", "Intake review", PayloadTag::Review),
        ],
        ResumePolicy::StoredPhase,
        vec![FlowVariant::SingleAsset, FlowVariant::Campaign],
    )
}

fn intake_single_asset() -> Result<PhaseRegistry, EngineError> {
    PhaseRegistry::new(
        FlowKind::Intake,
        FlowVariant::SingleAsset,
        vec![
            PhaseDescriptor::new("asset-setup", "Asset setup", PayloadTag::ProjectSetup).with_seed(
                SeedSpec::new(&["projectName", "assetType"], &["audience", "keyMessages", "dueDate"], BRAND_CONTEXT),
            ),
            PhaseDescriptor::new("theme", "Theme selection", PayloadTag::ThemeSelection),
            PhaseDescriptor::new("content", "Content authoring", PayloadTag::ContentDraft),
            PhaseDescriptor::new("compliance-review", "MLR review", PayloadTag::Review),
            PhaseDescriptor::new("finalize", "Finalize", PayloadTag::Finalization),
        ],
        ResumePolicy::StoredPhase,
        vec![FlowVariant::Campaign],
    )
}

fn intake_campaign() -> Result<PhaseRegistry, EngineError> {
    PhaseRegistry::new(
        FlowKind::Intake,
        FlowVariant::Campaign,
        vec![
            PhaseDescriptor::new("campaign-setup", "Campaign setup", PayloadTag::ProjectSetup).with_seed(
                SeedSpec::new(&["projectName"], &["audience", "keyMessages", "dueDate", "channels"], BRAND_CONTEXT),
            ),
            PhaseDescriptor::new("deliverables", "Deliverable plan", PayloadTag::DeliverablePlan),
            PhaseDescriptor::new("theme", "Campaign theme", PayloadTag::ThemeSelection),
            PhaseDescriptor::new("content", "Content authoring", PayloadTag::ContentDraft),
            PhaseDescriptor::new("compliance-review", "MLR review", PayloadTag::Review),
            PhaseDescriptor::new("finalize", "Finalize", PayloadTag::Finalization),
        ],
        ResumePolicy::FirstIncomplete,
        vec![FlowVariant::SingleAsset],
    )
}

fn localization() -> Result<PhaseRegistry, EngineError> {
    PhaseRegistry::new(
        FlowKind::Localization,
        FlowVariant::Default,
        vec![
            PhaseDescriptor::new("source", "Source asset", PayloadTag::SourceCapture),
            PhaseDescriptor::new("markets", "Target markets", PayloadTag::MarketSelection),
            PhaseDescriptor::new("translation", "Translation", PayloadTag::Translation),
            PhaseDescriptor::new("cultural-review", "Cultural review", PayloadTag::Review),
            PhaseDescriptor::new("finalize", "Finalize", PayloadTag::Finalization),
        ],
        ResumePolicy::StoredPhase,
        vec![],
    )
}

fn glocal_adaptation() -> Result<PhaseRegistry, EngineError> {
    PhaseRegistry::new(
        FlowKind::GlocalAdaptation,
        FlowVariant::Default,
        vec![
            PhaseDescriptor::new("analysis", "Source analysis", PayloadTag::MarketAnalysis),
            PhaseDescriptor::new("market-context", "Market context", PayloadTag::MarketContext).optional(),
            PhaseDescriptor::new("adaptation", "Adaptation", PayloadTag::Adaptation),
            PhaseDescriptor::new("compliance-review", "Local MLR review", PayloadTag::Review),
            PhaseDescriptor::new("finalize", "Finalize", PayloadTag::Finalization),
        ],
        ResumePolicy::StoredPhase,
        vec![],
    )
}
