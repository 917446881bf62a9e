//! Teardown report types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::planner::StackRef;

/// Why a stack was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The stack did not exist when checked.
    NotFound,
}

/// Terminal classification of one stack in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum DeletionOutcome {
    /// Deletion was requested and (unless lenient timeouts apply) confirmed.
    Deleted,
    /// Nothing to do.
    Skipped(SkipReason),
    /// The stack could not be torn down.
    Error(String),
}

impl DeletionOutcome {
    /// Outcome for a stack that was already gone.
    #[must_use]
    pub const fn not_found() -> Self {
        Self::Skipped(SkipReason::NotFound)
    }

    /// Error outcome carrying the error's message.
    #[must_use]
    pub fn error(err: impl fmt::Display) -> Self {
        Self::Error(err.to_string())
    }

    /// Returns true for error outcomes.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Status string used in the response body.
    #[must_use]
    pub const fn wire_status(&self) -> &'static str {
        match self {
            Self::Deleted => "deleted",
            Self::Skipped(SkipReason::NotFound) => "not_found",
            Self::Error(_) => "error",
        }
    }

    /// Error message, for error outcomes.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            Self::Deleted | Self::Skipped(_) => None,
        }
    }
}

/// Outcome for one stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackResult {
    /// The stack.
    pub stack: StackRef,
    /// What happened to it.
    pub outcome: DeletionOutcome,
}

impl StackResult {
    /// Pairs a stack with its outcome.
    #[must_use]
    pub const fn new(stack: StackRef, outcome: DeletionOutcome) -> Self {
        Self { stack, outcome }
    }
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    /// No stack recorded an error.
    Success,
    /// At least one stack recorded an error.
    Failure,
}

/// Ordered record of one teardown run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    /// Per-stack outcomes, in processing order.
    pub results: Vec<StackResult>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub completed_at: DateTime<Utc>,
    /// Derived overall status.
    pub overall: OverallStatus,
}

impl TeardownReport {
    /// Returns true if no stack recorded an error.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.overall == OverallStatus::Success
    }

    /// Number of deleted stacks.
    #[must_use]
    pub fn deleted_count(&self) -> usize {
        self.count(|o| matches!(o, DeletionOutcome::Deleted))
    }

    /// Number of skipped stacks.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, DeletionOutcome::Skipped(_)))
    }

    /// Number of stacks that recorded an error.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.count(DeletionOutcome::is_error)
    }

    /// Wall-clock duration of the run.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }

    fn count(&self, predicate: impl Fn(&DeletionOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| predicate(&r.outcome)).count()
    }
}

impl fmt::Display for TeardownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_success() { "success" } else { "failure" };
        write!(
            f,
            "{status}: {} deleted, {} not found, {} failed in {}s",
            self.deleted_count(),
            self.skipped_count(),
            self.error_count(),
            self.duration().num_seconds()
        )
    }
}
