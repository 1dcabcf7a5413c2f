//! Domain logic: merge a transformation plan into a build target.
//!
//! This crate owns *what* the target looks like after a plan is applied. It
//! performs no I/O; copies and the transform phase are returned as data for
//! `transplan-core` to carry out or schedule.

mod error;
mod flags;
mod matcher;
mod reconcile;

pub use error::DomainError;
pub use flags::{FlagPropagation, propagate_flags};
pub use matcher::{RemovalMatch, RemovalMatcher};
pub use reconcile::{CollisionPolicy, CopyAction, ReconcileOptions, Reconciliation, reconcile};
