use crate::target::PlacementMode;
use serde::{Deserialize, Serialize};

/// Per-target configuration states, in the only order they may be visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    ConfigLoaded,
    PlanRequested,
    PlanImported,
    TransformScheduled,
    Skipped,
    SourcesReconciled,
    FlagsPropagated,
    Done,
}

impl TargetState {
    /// Whether `next` may directly follow `self`.
    ///
    /// `ConfigLoaded -> PlanImported` covers plans supplied from an earlier run.
    pub fn can_advance_to(self, next: TargetState) -> bool {
        use TargetState::*;
        matches!(
            (self, next),
            (ConfigLoaded, PlanRequested)
                | (ConfigLoaded, PlanImported)
                | (PlanRequested, PlanImported)
                | (PlanImported, TransformScheduled)
                | (PlanImported, Skipped)
                | (TransformScheduled, SourcesReconciled)
                | (Skipped, SourcesReconciled)
                | (SourcesReconciled, FlagsPropagated)
                | (FlagsPropagated, Done)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetState::ConfigLoaded => "config_loaded",
            TargetState::PlanRequested => "plan_requested",
            TargetState::PlanImported => "plan_imported",
            TargetState::TransformScheduled => "transform_scheduled",
            TargetState::Skipped => "skipped",
            TargetState::SourcesReconciled => "sources_reconciled",
            TargetState::FlagsPropagated => "flags_propagated",
            TargetState::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRef {
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub sources_before: u64,
    pub removed: u64,
    pub transformed: u64,
    pub copied: u64,
    pub appended: u64,
    pub sources_after: u64,
    pub flags_propagated: u64,
}

/// Record of one target reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetReport {
    pub schema: String,
    pub tool: ToolInfo,
    pub target: String,
    pub plan: PlanRef,
    pub placement: PlacementMode,
    pub transform_scheduled: bool,
    pub states: Vec<TargetState>,
    pub summary: ReconcileSummary,
    pub generated_at: String,
}
