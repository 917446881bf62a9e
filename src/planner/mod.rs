//! Teardown planning module.
//!
//! This module turns configured stack names into an ordered plan:
//! - `plan`: plan and stack reference types, plan fingerprints
//! - `order`: the planner applying the fixed slot order

mod order;
mod plan;

pub use order::TeardownPlanner;
pub use plan::{PlannedStack, StackRef, TeardownPlan};
