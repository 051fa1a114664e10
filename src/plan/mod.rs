// src/plan/mod.rs

//! Build planning.
//!
//! - [`incremental`] decides which files need rebuilding.
//! - [`cleanup`] decides which previously produced outputs must go.
//!
//! Both are pure: they read the catalog and history and never touch disk.

pub mod cleanup;
pub mod incremental;

pub use cleanup::{CleanupFlags, CleanupPlan, CleanupPlanner, TargetSets};
pub use incremental::{
    EnvironmentSnapshot, IncrementalPlanner, PlanFlags, PlannedFile, RebuildPlan, RebuildReason,
    TargetOracle,
};
