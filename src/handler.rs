//! Self-destruct invocation surface.
//!
//! The handler is what a trigger (scheduled job, function runtime, CLI) calls:
//! it guards the run with the optional lock, plans from configuration, drives
//! the orchestrator and renders the report into a response.

use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::backend::ResourceBackend;
use crate::config::TeardownConfig;
use crate::error::Result;
use crate::lock::{RunLock, generate_holder_id};
use crate::planner::{TeardownPlan, TeardownPlanner};
use crate::report::{HandlerResponse, ReportBuilder, TeardownReport};
use crate::teardown::{Clock, TeardownOrchestrator};

/// Entry point for one self-destruct run.
#[derive(Debug)]
pub struct SelfDestructHandler<'a, B: ?Sized, C: ?Sized> {
    config: &'a TeardownConfig,
    backend: &'a B,
    clock: &'a C,
}

impl<'a, B, C> SelfDestructHandler<'a, B, C>
where
    B: ResourceBackend + ?Sized,
    C: Clock + ?Sized,
{
    /// Creates a handler over injected configuration, backend and clock.
    #[must_use]
    pub const fn new(config: &'a TeardownConfig, backend: &'a B, clock: &'a C) -> Self {
        Self {
            config,
            backend,
            clock,
        }
    }

    /// The plan this handler will execute.
    #[must_use]
    pub fn plan(&self) -> TeardownPlan {
        TeardownPlanner::new(&self.config.stacks).plan()
    }

    /// Runs the teardown and renders the response.
    ///
    /// # Errors
    ///
    /// Returns an error only if the run lock cannot be acquired; no stack
    /// has been touched in that case.
    pub async fn invoke(&self) -> Result<HandlerResponse> {
        let report = self.execute(&self.plan()).await?;
        Ok(ReportBuilder::render(&report))
    }

    /// Runs `plan` under the run lock and returns the raw report.
    ///
    /// # Errors
    ///
    /// Returns an error only if the run lock cannot be acquired.
    pub async fn execute(&self, plan: &TeardownPlan) -> Result<TeardownReport> {
        let lock = self.config.lock.as_ref().map(RunLock::from_config);
        let held = match &lock {
            Some(lock) => Some(lock.acquire(&generate_holder_id()).await?),
            None => None,
        };

        let run_id = Uuid::new_v4();
        let span = info_span!("teardown", %run_id, plan = %plan.fingerprint());

        let report = async {
            info!("Starting self-destruct sequence: {plan}");
            TeardownOrchestrator::from_config(self.backend, self.clock, &self.config.waiter)
                .run(plan)
                .await
        }
        .instrument(span)
        .await;

        if let (Some(lock), Some(info)) = (&lock, &held) {
            // The run already happened; a failed release only leaves a lock
            // that will expire.
            if let Err(e) = lock.release(info).await {
                warn!("Failed to release run lock: {e}");
            }
        }

        Ok(report)
    }
}
