// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Stack Teardown
//!
//! An ordered, idempotent self-destruct orchestrator for deployed stacks.
//!
//! ## Overview
//!
//! A deployment made of several dependent stacks has to be torn down in
//! reverse dependency order. This crate:
//!
//! - Plans the deletion order from a fixed set of named slots
//! - Deletes each stack in turn, waiting until it is really gone
//! - Keeps going when one stack fails, recording the failure
//! - Deletes the stack hosting the teardown itself last, and only if every
//!   other stack was torn down cleanly
//! - Reports a per-stack outcome and an overall status
//!
//! ## Architecture
//!
//! 1. **Configuration**: `teardown.yaml`, `.env` and environment variables
//! 2. **Planner**: turns configured slots into an ordered plan
//! 3. **Orchestrator**: check, delete and wait for each stack against a
//!    [`backend::ResourceBackend`]
//! 4. **Report**: aggregates outcomes and renders the response
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`planner`]: Teardown order and plan fingerprint
//! - [`backend`]: Stack backends (`CloudFormation`, in-memory)
//! - [`teardown`]: Orchestrator, deletion waiter and clocks
//! - [`report`]: Report aggregation and rendering
//! - [`handler`]: Self-destruct entry point
//! - [`lock`]: Run lock
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! stacks:
//!   api: my-app-api
//!   auth: my-app-auth
//!   self_destruct: my-app-self-destruct
//!
//! waiter:
//!   poll_interval_secs: 10
//!   max_wait_secs: 600
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod handler;
pub mod lock;
pub mod planner;
pub mod report;
pub mod teardown;

// ============================================================================
// Re-exports
// ============================================================================

pub use backend::{CloudFormationBackend, InMemoryBackend, ResourceBackend};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, TeardownConfig};
pub use error::{Result, TeardownError};
pub use handler::SelfDestructHandler;
pub use lock::RunLock;
pub use planner::{StackRef, TeardownPlan, TeardownPlanner};
pub use report::{DeletionOutcome, HandlerResponse, ReportBuilder, TeardownReport};
pub use teardown::{Clock, TeardownOrchestrator, TokioClock, VirtualClock};
