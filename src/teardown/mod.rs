//! Teardown execution module.
//!
//! This module drives the deletion of a planned chain of stacks:
//! - `clock`: real and virtual time sources
//! - `waiter`: polls until a deleted stack is gone
//! - `orchestrator`: the sequential check/delete/wait state machine

mod clock;
mod orchestrator;
mod waiter;

pub use clock::{Clock, TokioClock, VirtualClock};
pub use orchestrator::{TeardownOrchestrator, TimeoutPolicy};
pub use waiter::{DeletionWaiter, WaitConfig};
