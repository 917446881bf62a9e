//! Resource backend module.
//!
//! This module provides the capability the teardown core consumes (existence
//! checks and deletion requests) and its implementations:
//! - `CloudFormation` for deployed AWS stacks
//! - an in-memory backend for tests and embedding

mod resource;
mod cloudformation;
mod memory;

pub use resource::ResourceBackend;
pub use cloudformation::CloudFormationBackend;
pub use memory::{BackendCall, InMemoryBackend};
