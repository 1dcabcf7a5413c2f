//! Embeddable core library for transplan.
//!
//! Provides a clap-free, I/O-abstracted entry point suitable for linking
//! into a build-system generator or other host process.
//!
//! # Port traits
//!
//! All I/O is abstracted behind port traits in [`ports`]:
//! - [`CommandInvoker`](ports::CommandInvoker): issue one external-process call
//! - [`FilePort`](ports::FilePort): read, write and copy files
//!
//! The [`adapters`] module provides process- and filesystem-backed
//! implementations plus a recording invoker for tests.
//!
//! # Entry points
//!
//! - [`run_plan_phase`](pipeline::run_plan_phase): request and import a plan
//! - [`run_target`](pipeline::run_target): the whole per-target pipeline
//! - [`reconcile_target`](pipeline::reconcile_target): reconcile against an existing plan
//! - [`execute_graph`](pipeline::execute_graph): run declared steps in order

pub mod adapters;
pub mod commands;
pub mod error;
pub mod pipeline;
pub mod ports;
pub mod settings;

pub use error::{Phase, ToolError};

// Re-exported so embedders don't need transplan-domain directly.
pub use transplan_domain::{CollisionPolicy, RemovalMatch};
