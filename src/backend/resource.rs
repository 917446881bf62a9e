//! Resource backend trait definition.
//!
//! This module defines the capability the teardown core consumes from its
//! deployment platform.

use async_trait::async_trait;

use crate::error::Result;
use crate::planner::StackRef;

/// A backend able to check for and delete stacks.
#[async_trait]
pub trait ResourceBackend: Send + Sync {
    /// Reports whether the stack currently exists.
    ///
    /// Absence is `Ok(false)`, never an error. A check that cannot be
    /// performed fails with `BackendError::Unavailable`; a stack whose earlier
    /// deletion ended in a failed state fails with `BackendError::DeletionFailed`.
    async fn exists(&self, stack: &StackRef) -> Result<bool>;

    /// Requests deletion of the stack.
    ///
    /// Success means the request was accepted, not that deletion completed.
    async fn delete(&self, stack: &StackRef) -> Result<()>;

    /// Gets the backend type name.
    fn name(&self) -> &'static str;
}

#[async_trait]
impl ResourceBackend for Box<dyn ResourceBackend> {
    async fn exists(&self, stack: &StackRef) -> Result<bool> {
        (**self).exists(stack).await
    }

    async fn delete(&self, stack: &StackRef) -> Result<()> {
        (**self).delete(stack).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
