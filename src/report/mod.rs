//! Teardown report module.
//!
//! This module aggregates per-stack outcomes into a report and renders it for
//! the invoking runtime (JSON body plus status code).

mod builder;
mod types;

pub use builder::{
    COMPLETION_MESSAGE, FALLBACK_BODY, HandlerResponse, ReportBuilder, ResponseBody, ResultEntry,
    STATUS_FAILURE, STATUS_OK,
};
pub use types::{DeletionOutcome, OverallStatus, SkipReason, StackResult, TeardownReport};
