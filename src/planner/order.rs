//! Teardown planning from configured stack names.

use tracing::debug;

use crate::config::{StackNames, StackSlot};

use super::plan::{PlannedStack, StackRef, TeardownPlan};

/// Builds the ordered teardown plan from configured stack names.
///
/// The order is fixed by [`StackSlot::ORDERED`]; nothing is inferred from the
/// deployed resources.
#[derive(Debug)]
pub struct TeardownPlanner<'a> {
    /// Configured stack names.
    names: &'a StackNames,
}

impl<'a> TeardownPlanner<'a> {
    /// Creates a planner over the configured stack names.
    #[must_use]
    pub const fn new(names: &'a StackNames) -> Self {
        Self { names }
    }

    /// Produces the teardown plan, skipping absent and blank slots.
    #[must_use]
    pub fn plan(&self) -> TeardownPlan {
        let stacks: Vec<PlannedStack> = StackSlot::ORDERED
            .into_iter()
            .filter_map(|slot| {
                let stack = self.names.get(slot).and_then(StackRef::new);
                if stack.is_none() {
                    debug!("Slot {slot} has no stack configured, skipping");
                }
                stack.map(|stack| PlannedStack { slot, stack })
            })
            .collect();

        let self_stack = self.names.self_destruct.as_deref().and_then(StackRef::new);

        debug!(
            "Planned {} stacks (self-destruct: {})",
            stacks.len(),
            self_stack.as_ref().map_or("none", StackRef::as_str)
        );

        TeardownPlan { stacks, self_stack }
    }
}
