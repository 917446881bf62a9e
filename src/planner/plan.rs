//! Teardown plan types.
//!
//! A plan is the ordered list of stacks to delete plus the optional terminal
//! self-destruct stack. Plans are immutable once built.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::config::StackSlot;

/// Number of hex characters shown for a plan fingerprint.
const FINGERPRINT_LEN: usize = 12;

/// Opaque identifier of one deletable stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackRef(String);

impl StackRef {
    /// Creates a stack reference from a trimmed, non-blank name.
    ///
    /// Returns `None` for blank names.
    #[must_use]
    pub fn new(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            None
        } else {
            Some(Self(name.to_string()))
        }
    }

    /// Returns the stack name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StackRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A stack scheduled for deletion, with the slot it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStack {
    /// Slot in the fixed teardown order.
    pub slot: StackSlot,
    /// Stack to delete.
    pub stack: StackRef,
}

/// An ordered teardown plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeardownPlan {
    /// Stacks in deletion order.
    pub stacks: Vec<PlannedStack>,
    /// Stack hosting the handler, deleted last and only after a clean run.
    pub self_stack: Option<StackRef>,
}

impl TeardownPlan {
    /// Creates a plan from an explicit, ordered list of slotted stacks.
    ///
    /// The list is taken as-is: no slot ordering is applied and no blanks are
    /// skipped. Useful for embedding the orchestrator with a caller-defined
    /// order.
    #[must_use]
    pub fn from_refs(stacks: Vec<(StackSlot, StackRef)>, self_stack: Option<StackRef>) -> Self {
        Self {
            stacks: stacks
                .into_iter()
                .map(|(slot, stack)| PlannedStack { slot, stack })
                .collect(),
            self_stack,
        }
    }

    /// Returns true if the plan has nothing to delete.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty() && self.self_stack.is_none()
    }

    /// Total number of stacks, including the self-destruct stack.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stacks.len() + usize::from(self.self_stack.is_some())
    }

    /// Iterates over the ordered (non-self) stack references.
    pub fn ordered_refs(&self) -> impl Iterator<Item = &StackRef> {
        self.stacks.iter().map(|planned| &planned.stack)
    }

    /// Short, stable fingerprint of the plan's order and names.
    ///
    /// Two plans share a fingerprint iff they delete the same stacks in the
    /// same order with the same self-destruct stack.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();

        for planned in &self.stacks {
            hasher.update(planned.slot.as_str().as_bytes());
            hasher.update(b"=");
            hasher.update(planned.stack.as_str().as_bytes());
            hasher.update(b"\n");
        }
        if let Some(self_stack) = &self.self_stack {
            hasher.update(b"self=");
            hasher.update(self_stack.as_str().as_bytes());
            hasher.update(b"\n");
        }

        let mut digest = hex::encode(hasher.finalize());
        digest.truncate(FINGERPRINT_LEN);
        digest
    }
}

impl fmt::Display for TeardownPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.ordered_refs().map(StackRef::as_str).collect();
        write!(f, "[{}]", names.join(" -> "))?;
        if let Some(self_stack) = &self.self_stack {
            write!(f, " then self {self_stack}")?;
        }
        Ok(())
    }
}
