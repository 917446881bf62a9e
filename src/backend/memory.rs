//! In-memory resource backend.
//!
//! A scripted backend for tests and for embedding the orchestrator without a
//! cloud account. Every call is recorded so callers can assert on ordering.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{BackendError, Result};
use crate::planner::StackRef;

use super::resource::ResourceBackend;

/// A call made against the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    /// `exists` was called for the stack.
    Exists(String),
    /// `delete` was called for the stack.
    Delete(String),
}

/// How a stack behaves once its deletion is requested.
#[derive(Debug, Clone, Default)]
enum Lifecycle {
    /// Disappears immediately.
    #[default]
    Immediate,
    /// Keeps existing for this many further checks.
    Linger(u32),
    /// Never disappears.
    Stuck,
    /// Reports a failed deletion on the next check.
    FailsAfterDelete(String),
}

/// Scripted state of a single stack.
#[derive(Debug, Clone, Default)]
struct StackEntry {
    present: bool,
    delete_requested: bool,
    lifecycle: Lifecycle,
    reject_delete: Option<String>,
    unavailable_checks: u32,
}

/// Shared state behind the mutex.
#[derive(Debug, Default)]
struct Inner {
    stacks: HashMap<String, StackEntry>,
    calls: Vec<BackendCall>,
}

/// In-memory backend with scriptable failure modes.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    inner: Mutex<Inner>,
}

impl InMemoryBackend {
    /// Creates an empty backend (no stacks exist).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend where the given stacks exist.
    #[must_use]
    pub fn with_stacks<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = Self::new();
        for name in names {
            backend.add_stack(name);
        }
        backend
    }

    /// Marks a stack as existing.
    pub fn add_stack(&self, name: impl Into<String>) {
        let mut inner = self.lock();
        let entry = inner.stacks.entry(name.into()).or_default();
        entry.present = true;
        entry.delete_requested = false;
    }

    /// Makes deletion requests for the stack fail with the given cause.
    pub fn reject_delete(&self, name: &str, cause: impl Into<String>) {
        self.entry(name, |entry| entry.reject_delete = Some(cause.into()));
    }

    /// Keeps the stack visible for `polls` checks after its deletion is requested.
    pub fn linger(&self, name: &str, polls: u32) {
        self.entry(name, |entry| entry.lifecycle = Lifecycle::Linger(polls));
    }

    /// Keeps the stack visible forever after its deletion is requested.
    pub fn never_disappear(&self, name: &str) {
        self.entry(name, |entry| entry.lifecycle = Lifecycle::Stuck);
    }

    /// Reports a failed deletion on the first check after deletion is requested.
    pub fn fail_after_delete(&self, name: &str, reason: impl Into<String>) {
        self.entry(name, |entry| {
            entry.lifecycle = Lifecycle::FailsAfterDelete(reason.into());
        });
    }

    /// Makes the next `count` existence checks for the stack fail as unavailable.
    pub fn unavailable_checks(&self, name: &str, count: u32) {
        self.entry(name, |entry| entry.unavailable_checks = count);
    }

    /// Returns true if the stack currently exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.lock().stacks.get(name).is_some_and(|entry| entry.present)
    }

    /// Returns every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    /// Returns the stacks `delete` was called for, in order.
    #[must_use]
    pub fn delete_calls(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Delete(name) => Some(name.clone()),
                BackendCall::Exists(_) => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn entry(&self, name: &str, update: impl FnOnce(&mut StackEntry)) {
        let mut inner = self.lock();
        update(inner.stacks.entry(name.to_string()).or_default());
    }
}

#[async_trait]
impl ResourceBackend for InMemoryBackend {
    async fn exists(&self, stack: &StackRef) -> Result<bool> {
        let mut inner = self.lock();
        inner.calls.push(BackendCall::Exists(stack.to_string()));

        let Some(entry) = inner.stacks.get_mut(stack.as_str()) else {
            return Ok(false);
        };

        if entry.unavailable_checks > 0 {
            entry.unavailable_checks -= 1;
            return Err(BackendError::unavailable(stack.as_str(), "simulated outage").into());
        }

        if !entry.present || !entry.delete_requested {
            return Ok(entry.present);
        }

        match &mut entry.lifecycle {
            Lifecycle::Immediate | Lifecycle::Linger(0) => {
                entry.present = false;
                Ok(false)
            }
            Lifecycle::Linger(remaining) => {
                *remaining -= 1;
                Ok(true)
            }
            Lifecycle::Stuck => Ok(true),
            Lifecycle::FailsAfterDelete(reason) => Err(BackendError::DeletionFailed {
                stack: stack.to_string(),
                reason: reason.clone(),
            }
            .into()),
        }
    }

    async fn delete(&self, stack: &StackRef) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(BackendCall::Delete(stack.to_string()));

        let entry = inner.stacks.entry(stack.to_string()).or_default();
        if let Some(cause) = &entry.reject_delete {
            return Err(BackendError::deletion_rejected(stack.as_str(), cause.clone()).into());
        }

        entry.delete_requested = true;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
