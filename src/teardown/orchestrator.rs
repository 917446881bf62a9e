//! Teardown orchestrator.
//!
//! Walks a [`TeardownPlan`] strictly in order: check, delete, wait. Each
//! stack's failure is recorded and the walk continues. The self-destruct stack
//! is only attempted once every other stack finished without error.

use tracing::{error, info, warn};

use crate::backend::ResourceBackend;
use crate::config::WaiterConfig;
use crate::planner::{StackRef, TeardownPlan};
use crate::report::{DeletionOutcome, ReportBuilder, StackResult, TeardownReport};

use super::clock::Clock;
use super::waiter::{DeletionWaiter, WaitConfig};

/// What to record when a stack is still present after the maximum wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutPolicy {
    /// Record an error outcome for the stack.
    #[default]
    RecordError,
    /// Record the stack as deleted, since its deletion request was accepted.
    RecordDeleted,
}

impl TimeoutPolicy {
    /// Chooses the policy from the waiter configuration.
    #[must_use]
    pub const fn from_config(config: &WaiterConfig) -> Self {
        if config.timeout_is_error {
            Self::RecordError
        } else {
            Self::RecordDeleted
        }
    }
}

/// Sequential teardown state machine.
#[derive(Debug)]
pub struct TeardownOrchestrator<'a, B: ?Sized, C: ?Sized> {
    /// Backend performing checks and deletions.
    backend: &'a B,
    /// Clock driving the waiter and report timestamps.
    clock: &'a C,
    /// Poll timing per stack.
    wait: WaitConfig,
    /// Handling of wait timeouts.
    timeout_policy: TimeoutPolicy,
}

impl<'a, B, C> TeardownOrchestrator<'a, B, C>
where
    B: ResourceBackend + ?Sized,
    C: Clock + ?Sized,
{
    /// Creates an orchestrator with default timeout handling.
    #[must_use]
    pub fn new(backend: &'a B, clock: &'a C, wait: WaitConfig) -> Self {
        Self {
            backend,
            clock,
            wait,
            timeout_policy: TimeoutPolicy::default(),
        }
    }

    /// Creates an orchestrator from the waiter configuration.
    #[must_use]
    pub fn from_config(backend: &'a B, clock: &'a C, config: &WaiterConfig) -> Self {
        Self::new(backend, clock, WaitConfig::from(config))
            .with_timeout_policy(TimeoutPolicy::from_config(config))
    }

    /// Sets how wait timeouts are recorded.
    #[must_use]
    pub const fn with_timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout_policy = policy;
        self
    }

    /// Runs the teardown and returns the report. Never fails: every per-stack
    /// failure becomes an error entry.
    pub async fn run(&self, plan: &TeardownPlan) -> TeardownReport {
        let started_at = self.clock.now();
        info!(
            "Starting teardown of {} stacks via {} backend",
            plan.len(),
            self.backend.name()
        );

        let mut results = Vec::with_capacity(plan.len());

        for planned in &plan.stacks {
            info!("Tearing down {} stack: {}", planned.slot, planned.stack);
            let outcome = self.teardown_stack(&planned.stack).await;
            results.push(StackResult::new(planned.stack.clone(), outcome));
        }

        if let Some(self_stack) = &plan.self_stack {
            let failures = results.iter().filter(|r| r.outcome.is_error()).count();

            if failures == 0 {
                let outcome = self.destroy_self(self_stack).await;
                results.push(StackResult::new(self_stack.clone(), outcome));
            } else {
                warn!(
                    "Not deleting self-destruct stack {self_stack}: {failures} stacks failed to tear down"
                );
            }
        }

        let report = ReportBuilder::build(results, started_at, self.clock.now());
        info!("Teardown finished: {report}");
        report
    }

    /// Check, delete and wait for one stack.
    async fn teardown_stack(&self, stack: &StackRef) -> DeletionOutcome {
        match self.backend.exists(stack).await {
            Ok(true) => {}
            Ok(false) => {
                info!("Stack {stack} not found, skipping");
                return DeletionOutcome::not_found();
            }
            Err(e) => {
                error!("Failed to check stack {stack}: {e}");
                return DeletionOutcome::error(e);
            }
        }

        if let Err(e) = self.backend.delete(stack).await {
            error!("Failed to delete stack {stack}: {e}");
            return DeletionOutcome::error(e);
        }

        let waiter = DeletionWaiter::new(self.backend, self.clock, self.wait);
        match waiter.wait_until_gone(stack).await {
            Ok(true) => {
                info!("Stack {stack} deleted");
                DeletionOutcome::Deleted
            }
            Ok(false) => self.timed_out(stack),
            Err(e) => {
                error!("Deletion of stack {stack} failed: {e}");
                DeletionOutcome::error(e)
            }
        }
    }

    /// Outcome for a stack that outlived the maximum wait.
    fn timed_out(&self, stack: &StackRef) -> DeletionOutcome {
        let message = format!(
            "Timed out after {}s waiting for stack deletion",
            self.wait.max_wait.as_secs()
        );

        match self.timeout_policy {
            TimeoutPolicy::RecordError => {
                error!("Stack {stack}: {message}");
                DeletionOutcome::Error(message)
            }
            TimeoutPolicy::RecordDeleted => {
                warn!("Stack {stack}: {message}; recording as deleted");
                DeletionOutcome::Deleted
            }
        }
    }

    /// Check and delete the self-destruct stack, without waiting.
    async fn destroy_self(&self, stack: &StackRef) -> DeletionOutcome {
        match self.backend.exists(stack).await {
            Ok(true) => {}
            Ok(false) => {
                info!("Self-destruct stack {stack} not found, skipping");
                return DeletionOutcome::not_found();
            }
            Err(e) => {
                error!("Failed to check self-destruct stack {stack}: {e}");
                return DeletionOutcome::error(e);
            }
        }

        match self.backend.delete(stack).await {
            Ok(()) => {
                info!("Self-destruct stack {stack} deletion requested");
                DeletionOutcome::Deleted
            }
            Err(e) => {
                error!("Failed to delete self-destruct stack {stack}: {e}");
                DeletionOutcome::error(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, InMemoryBackend};
    use crate::config::StackSlot;
    use crate::error::{BackendError, Result};
    use crate::report::{OverallStatus, SkipReason};
    use crate::teardown::VirtualClock;
    use async_trait::async_trait;
    use mockall::Sequence;
    use mockall::predicate::eq;
    use std::time::Duration;

    mockall::mock! {
        Backend {}

        #[async_trait]
        impl ResourceBackend for Backend {
            async fn exists(&self, stack: &StackRef) -> Result<bool>;
            async fn delete(&self, stack: &StackRef) -> Result<()>;
            fn name(&self) -> &'static str;
        }
    }

    fn stack(name: &str) -> StackRef {
        StackRef::new(name).expect("non-blank stack name")
    }

    fn plan(names: &[&str], self_stack: Option<&str>) -> TeardownPlan {
        TeardownPlan::from_refs(
            names
                .iter()
                .zip(StackSlot::ORDERED.into_iter().cycle())
                .map(|(name, slot)| (slot, stack(name)))
                .collect(),
            self_stack.map(stack),
        )
    }

    fn fast_wait() -> WaitConfig {
        WaitConfig::new(Duration::from_secs(1), Duration::from_secs(3))
    }

    fn names(report: &TeardownReport) -> Vec<&str> {
        report.results.iter().map(|r| r.stack.as_str()).collect()
    }

    #[tokio::test]
    async fn test_deletes_in_plan_order() {
        let backend = InMemoryBackend::with_stacks(["a", "b", "c"]);
        let clock = VirtualClock::default();

        let report = TeardownOrchestrator::new(&backend, &clock, fast_wait())
            .run(&plan(&["a", "b", "c"], None))
            .await;

        assert_eq!(names(&report), ["a", "b", "c"]);
        assert_eq!(backend.delete_calls(), ["a", "b", "c"]);
        assert!(report.results.iter().all(|r| r.outcome == DeletionOutcome::Deleted));
        assert_eq!(report.overall, OverallStatus::Success);
    }

    #[tokio::test]
    async fn test_second_run_is_all_skips() {
        let backend = InMemoryBackend::with_stacks(["a", "b", "c"]);
        let clock = VirtualClock::default();
        let orchestrator = TeardownOrchestrator::new(&backend, &clock, fast_wait());
        let plan = plan(&["a", "b", "c"], None);

        let first = orchestrator.run(&plan).await;
        assert_eq!(first.overall, OverallStatus::Success);

        let second = orchestrator.run(&plan).await;
        assert_eq!(names(&second), ["a", "b", "c"]);
        assert!(
            second
                .results
                .iter()
                .all(|r| r.outcome == DeletionOutcome::Skipped(SkipReason::NotFound))
        );
        assert_eq!(second.overall, OverallStatus::Success);
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_its_stack() {
        let backend = InMemoryBackend::with_stacks(["a", "b", "c"]);
        backend.reject_delete("b", "AccessDenied");
        let clock = VirtualClock::default();

        let report = TeardownOrchestrator::new(&backend, &clock, fast_wait())
            .run(&plan(&["a", "b", "c"], None))
            .await;

        assert_eq!(names(&report), ["a", "b", "c"]);
        assert_eq!(report.results[0].outcome, DeletionOutcome::Deleted);
        assert!(report.results[1].outcome.is_error());
        assert_eq!(report.results[2].outcome, DeletionOutcome::Deleted);
        assert_eq!(backend.delete_calls(), ["a", "b", "c"]);
        assert_eq!(report.overall, OverallStatus::Failure);
    }

    #[tokio::test]
    async fn test_self_stack_gated_on_errors() {
        let backend = InMemoryBackend::with_stacks(["a", "b", "self"]);
        backend.reject_delete("a", "AccessDenied");
        let clock = VirtualClock::default();

        let report = TeardownOrchestrator::new(&backend, &clock, fast_wait())
            .run(&plan(&["a", "b"], Some("self")))
            .await;

        assert_eq!(names(&report), ["a", "b"]);
        assert!(backend.contains("self"));
        assert!(!backend.delete_calls().contains(&String::from("self")));
        assert_eq!(report.overall, OverallStatus::Failure);
    }

    #[tokio::test]
    async fn test_self_stack_deleted_last_without_wait() {
        let backend = InMemoryBackend::with_stacks(["b", "self"]);
        backend.never_disappear("self");
        let clock = VirtualClock::default();

        let report = TeardownOrchestrator::new(&backend, &clock, fast_wait())
            .run(&plan(&["a", "b"], Some("self")))
            .await;

        assert_eq!(names(&report), ["a", "b", "self"]);
        assert_eq!(
            report.results[0].outcome,
            DeletionOutcome::Skipped(SkipReason::NotFound)
        );
        assert_eq!(report.results[2].outcome, DeletionOutcome::Deleted);

        // one existence check, one delete, and no polling for self
        let self_calls: Vec<BackendCall> = backend
            .calls()
            .into_iter()
            .filter(|call| {
                matches!(call, BackendCall::Exists(n) | BackendCall::Delete(n) if n == "self")
            })
            .collect();
        assert_eq!(
            self_calls,
            [
                BackendCall::Exists(String::from("self")),
                BackendCall::Delete(String::from("self")),
            ]
        );
        assert_eq!(report.overall, OverallStatus::Success);
    }

    #[tokio::test]
    async fn test_self_stack_delete_failure_is_recorded() {
        let backend = InMemoryBackend::with_stacks(["self"]);
        backend.reject_delete("self", "stack is in UPDATE_IN_PROGRESS state");
        let clock = VirtualClock::default();

        let report = TeardownOrchestrator::new(&backend, &clock, fast_wait())
            .run(&plan(&["a"], Some("self")))
            .await;

        assert_eq!(names(&report), ["a", "self"]);
        assert!(report.results[1].outcome.is_error());
        assert_eq!(report.overall, OverallStatus::Failure);
    }

    #[tokio::test]
    async fn test_absent_self_stack_is_reported_last() {
        let backend = InMemoryBackend::with_stacks(["a"]);
        let clock = VirtualClock::default();

        let report = TeardownOrchestrator::new(&backend, &clock, fast_wait())
            .run(&plan(&["a"], Some("self")))
            .await;

        assert_eq!(names(&report), ["a", "self"]);
        assert_eq!(report.results[0].outcome, DeletionOutcome::Deleted);
        assert_eq!(
            report.results[1].outcome,
            DeletionOutcome::Skipped(SkipReason::NotFound)
        );
        assert_eq!(backend.delete_calls(), ["a"]);
        assert_eq!(report.overall, OverallStatus::Success);
        assert_eq!(ReportBuilder::status_code(&report), 200);
    }

    #[tokio::test]
    async fn test_self_stack_check_failure_is_recorded() {
        let backend = InMemoryBackend::with_stacks(["a", "self"]);
        backend.unavailable_checks("self", 1);
        let clock = VirtualClock::default();

        let report = TeardownOrchestrator::new(&backend, &clock, fast_wait())
            .run(&plan(&["a"], Some("self")))
            .await;

        assert_eq!(names(&report), ["a", "self"]);
        assert!(matches!(
            &report.results[1].outcome,
            DeletionOutcome::Error(message) if message.contains("simulated outage")
        ));
        assert_eq!(backend.delete_calls(), ["a"]);
        assert!(backend.contains("self"));
        assert_eq!(report.overall, OverallStatus::Failure);
        assert_eq!(ReportBuilder::status_code(&report), 500);
    }

    #[tokio::test]
    async fn test_plan_longer_than_slot_list_runs_every_stack() {
        let stacks: Vec<String> = (0..10).map(|i| format!("stack-{i}")).collect();
        let refs: Vec<&str> = stacks.iter().map(String::as_str).collect();
        let backend = InMemoryBackend::with_stacks(refs.clone());
        let clock = VirtualClock::default();

        let report = TeardownOrchestrator::new(&backend, &clock, fast_wait())
            .run(&plan(&refs, None))
            .await;

        assert_eq!(names(&report), refs);
        assert_eq!(backend.delete_calls(), stacks);
        assert_eq!(report.deleted_count(), 10);
    }

    #[tokio::test]
    async fn test_absent_first_stack_scenario() {
        let backend = InMemoryBackend::with_stacks(["api", "network"]);
        let clock = VirtualClock::default();

        let report = TeardownOrchestrator::new(&backend, &clock, fast_wait())
            .run(&plan(&["queue", "api", "network"], None))
            .await;

        assert_eq!(names(&report), ["queue", "api", "network"]);
        assert_eq!(
            report.results[0].outcome,
            DeletionOutcome::Skipped(SkipReason::NotFound)
        );
        assert_eq!(backend.delete_calls(), ["api", "network"]);
        assert_eq!(report.overall, OverallStatus::Success);
    }

    #[tokio::test]
    async fn test_timeout_recorded_as_error_by_default() {
        let backend = InMemoryBackend::with_stacks(["a", "self"]);
        backend.never_disappear("a");
        let clock = VirtualClock::default();

        let report = TeardownOrchestrator::new(&backend, &clock, fast_wait())
            .run(&plan(&["a"], Some("self")))
            .await;

        assert_eq!(
            report.results[0].outcome,
            DeletionOutcome::Error(String::from(
                "Timed out after 3s waiting for stack deletion"
            ))
        );
        assert_eq!(names(&report), ["a"]);
        assert_eq!(report.overall, OverallStatus::Failure);
    }

    #[tokio::test]
    async fn test_timeout_recorded_as_deleted_when_lenient() {
        let backend = InMemoryBackend::with_stacks(["a", "self"]);
        backend.never_disappear("a");
        let clock = VirtualClock::default();

        let report = TeardownOrchestrator::new(&backend, &clock, fast_wait())
            .with_timeout_policy(TimeoutPolicy::RecordDeleted)
            .run(&plan(&["a"], Some("self")))
            .await;

        assert_eq!(report.results[0].outcome, DeletionOutcome::Deleted);
        assert_eq!(names(&report), ["a", "self"]);
        assert_eq!(report.overall, OverallStatus::Success);
    }

    #[tokio::test]
    async fn test_failed_deletion_during_wait_is_error() {
        let backend = InMemoryBackend::with_stacks(["edge", "api"]);
        backend.fail_after_delete("edge", "bucket not empty");
        let clock = VirtualClock::default();

        let report = TeardownOrchestrator::new(&backend, &clock, fast_wait())
            .run(&plan(&["edge", "api"], None))
            .await;

        assert!(matches!(
            &report.results[0].outcome,
            DeletionOutcome::Error(message) if message.contains("bucket not empty")
        ));
        assert_eq!(report.results[1].outcome, DeletionOutcome::Deleted);
    }

    #[tokio::test]
    async fn test_unavailable_existence_check_is_error() {
        let mut backend = MockBackend::new();
        let mut seq = Sequence::new();

        backend.expect_name().return_const("mock");
        backend
            .expect_exists()
            .with(eq(stack("a")))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|s| Err(BackendError::unavailable(s.as_str(), "throttled").into()));
        backend
            .expect_exists()
            .with(eq(stack("b")))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(false));
        backend.expect_delete().never();

        let clock = VirtualClock::default();
        let report = TeardownOrchestrator::new(&backend, &clock, fast_wait())
            .run(&plan(&["a", "b"], Some("self")))
            .await;

        assert!(report.results[0].outcome.is_error());
        assert_eq!(
            report.results[1].outcome,
            DeletionOutcome::Skipped(SkipReason::NotFound)
        );
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.overall, OverallStatus::Failure);
    }

    #[tokio::test]
    async fn test_report_timestamps_come_from_clock() {
        let backend = InMemoryBackend::with_stacks(["a"]);
        backend.linger("a", 1);
        let clock = VirtualClock::default();

        let report = TeardownOrchestrator::new(&backend, &clock, fast_wait())
            .run(&plan(&["a"], None))
            .await;

        assert_eq!(report.started_at.timestamp(), 0);
        assert_eq!(report.completed_at.timestamp(), 1);
    }
}
