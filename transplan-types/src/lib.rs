//! Shared DTOs (schemas-as-code) for the transplan workspace.
//!
//! # Design constraints
//! - These types are intended to be serialized to disk.
//! - Be conservative with breaking changes.
//! - Prefer adding optional fields over changing semantics.

pub mod file;
pub mod flags;
pub mod graph;
pub mod plan;
pub mod report;
pub mod target;
pub mod wire;

/// Schema identifiers.
pub mod schema {
    pub const TRANSPLAN_PLAN_V1: &str = "transplan.plan.v1";
    pub const TRANSPLAN_TARGET_V1: &str = "transplan.target.v1";
    pub const TRANSPLAN_STEPS_V1: &str = "transplan.steps.v1";
    pub const TRANSPLAN_REPORT_V1: &str = "transplan.report.v1";
}
