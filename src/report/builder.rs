//! Report aggregation and response rendering.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::warn;

use super::types::{OverallStatus, StackResult, TeardownReport};

/// Message carried by every response body.
pub const COMPLETION_MESSAGE: &str = "Self-destruct sequence completed";

/// Body returned when the report cannot be serialized.
pub const FALLBACK_BODY: &str = r#"{"message":"Self-destruct sequence completed","error":"Failed to serialize teardown report"}"#;

/// Status code for a successful run.
pub const STATUS_OK: u16 = 200;

/// Status code for a run with at least one error.
pub const STATUS_FAILURE: u16 = 500;

/// Response handed back to the invoking runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResponse {
    /// HTTP-style status code.
    pub status_code: u16,
    /// JSON response body.
    pub body: String,
}

impl HandlerResponse {
    /// Returns true for a success status code.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status_code == STATUS_OK
    }
}

/// Wire form of the response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody<'a> {
    /// Fixed completion message.
    pub message: &'static str,
    /// Per-stack results.
    pub results: Vec<ResultEntry<'a>>,
    /// Completion time, ISO-8601.
    pub timestamp: String,
}

/// Wire form of one stack result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry<'a> {
    /// Stack name.
    pub stack_name: &'a str,
    /// `deleted`, `not_found` or `error`.
    pub status: &'static str,
    /// Error message, `null` unless status is `error`.
    pub error: Option<&'a str>,
}

/// Builds reports and renders them for the caller.
#[derive(Debug)]
pub struct ReportBuilder;

impl ReportBuilder {
    /// Aggregates per-stack results into a report.
    #[must_use]
    pub fn build(
        results: Vec<StackResult>,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> TeardownReport {
        let overall = if results.iter().any(|r| r.outcome.is_error()) {
            OverallStatus::Failure
        } else {
            OverallStatus::Success
        };

        TeardownReport {
            results,
            started_at,
            completed_at,
            overall,
        }
    }

    /// Status code for the report: 200 on success, 500 otherwise.
    #[must_use]
    pub const fn status_code(report: &TeardownReport) -> u16 {
        match report.overall {
            OverallStatus::Success => STATUS_OK,
            OverallStatus::Failure => STATUS_FAILURE,
        }
    }

    /// Wire body for the report.
    #[must_use]
    pub fn body(report: &TeardownReport) -> ResponseBody<'_> {
        ResponseBody {
            message: COMPLETION_MESSAGE,
            results: report
                .results
                .iter()
                .map(|r| ResultEntry {
                    stack_name: r.stack.as_str(),
                    status: r.outcome.wire_status(),
                    error: r.outcome.error_message(),
                })
                .collect(),
            timestamp: report
                .completed_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Renders the report as a JSON response.
    #[must_use]
    pub fn render(report: &TeardownReport) -> HandlerResponse {
        Self::render_with(report, |body| serde_json::to_string(body))
    }

    /// Renders the report with a custom encoder, falling back to a minimal
    /// body if encoding fails. The status code never depends on encoding.
    pub fn render_with<F>(report: &TeardownReport, encode: F) -> HandlerResponse
    where
        F: FnOnce(&ResponseBody<'_>) -> serde_json::Result<String>,
    {
        let status_code = Self::status_code(report);

        let body = encode(&Self::body(report)).unwrap_or_else(|e| {
            warn!("Failed to serialize teardown report, sending fallback body: {e}");
            FALLBACK_BODY.to_string()
        });

        HandlerResponse { status_code, body }
    }
}
