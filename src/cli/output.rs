//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};
use tracing::warn;

use crate::config::ValidationResult;
use crate::planner::{StackRef, TeardownPlan};
use crate::report::{DeletionOutcome, ReportBuilder, TeardownReport};

use super::commands::OutputFormat;

/// Observed state of one planned stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    /// The stack exists.
    Present,
    /// The stack is gone.
    Absent,
    /// The backend could not say.
    Unknown(String),
}

/// Status line for one planned stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackPresence {
    /// Slot label (`self` for the self-destruct stack).
    pub slot: String,
    /// The stack.
    pub stack: StackRef,
    /// What the backend reported.
    pub presence: Presence,
}

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan row for table display.
#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Slot")]
    slot: String,
    #[tabled(rename = "Stack")]
    stack: String,
}

/// Status row for table display.
#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Slot")]
    slot: String,
    #[tabled(rename = "Stack")]
    stack: String,
    #[tabled(rename = "State")]
    state: String,
}

/// Report row for table display.
#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Stack")]
    stack: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Error")]
    error: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a teardown plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &TeardownPlan) -> String {
        match self.format {
            OutputFormat::Json => to_json(&PlanJson::from(plan)),
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    fn format_plan_text(plan: &TeardownPlan) -> String {
        if plan.is_empty() {
            return format!("{} No stacks configured - nothing to tear down.\n", "✓".green());
        }

        let mut output = String::new();
        let _ = write!(output, "\nTeardown Plan\n");
        let _ = write!(output, "   Fingerprint: {}\n\n", plan.fingerprint());

        let mut rows: Vec<PlanRow> = plan
            .stacks
            .iter()
            .enumerate()
            .map(|(i, p)| PlanRow {
                index: i + 1,
                slot: p.slot.to_string(),
                stack: p.stack.to_string(),
            })
            .collect();

        if let Some(self_stack) = &plan.self_stack {
            rows.push(PlanRow {
                index: rows.len() + 1,
                slot: "self".dimmed().to_string(),
                stack: self_stack.to_string(),
            });
        }

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let _ = write!(
            output,
            "\nPlan: {} stacks to destroy\n",
            plan.len().to_string().red()
        );
        if plan.self_stack.is_some() {
            let _ = writeln!(
                output,
                "{} The self-destruct stack is only deleted if every other stack succeeds.",
                "⚠".yellow()
            );
        }

        output
    }

    /// Formats the presence of planned stacks.
    #[must_use]
    pub fn format_status(&self, stacks: &[StackPresence]) -> String {
        match self.format {
            OutputFormat::Json => {
                let rows: Vec<StatusJson<'_>> = stacks.iter().map(StatusJson::from).collect();
                to_json(&rows)
            }
            OutputFormat::Text => {
                if stacks.is_empty() {
                    return String::from("   No stacks configured.\n");
                }

                let rows: Vec<StatusRow> = stacks
                    .iter()
                    .map(|s| StatusRow {
                        slot: s.slot.clone(),
                        stack: s.stack.to_string(),
                        state: Self::format_presence(&s.presence),
                    })
                    .collect();

                let present = stacks
                    .iter()
                    .filter(|s| s.presence == Presence::Present)
                    .count();

                let mut output = Table::new(rows).to_string();
                let _ = write!(
                    output,
                    "\n\nStatus: {present}/{} stacks still present\n",
                    stacks.len()
                );
                output
            }
        }
    }

    /// Formats a teardown report.
    ///
    /// JSON mode prints the same `{statusCode, body}` envelope the handler
    /// returns.
    #[must_use]
    pub fn format_report(&self, report: &TeardownReport) -> String {
        match self.format {
            OutputFormat::Json => to_json(&ReportBuilder::render(report)),
            OutputFormat::Text => {
                let status = if report.is_success() {
                    format!("{} Self-destruct sequence completed", "✓".green())
                } else {
                    format!("{} Self-destruct sequence completed with errors", "✗".red())
                };

                let mut output = format!("{status}\n\n");

                let rows: Vec<ResultRow> = report
                    .results
                    .iter()
                    .enumerate()
                    .map(|(i, r)| ResultRow {
                        index: i + 1,
                        stack: r.stack.to_string(),
                        outcome: Self::format_outcome(&r.outcome),
                        error: r.outcome.error_message().map_or_else(String::new, |e| {
                            Self::truncate(e, 60)
                        }),
                    })
                    .collect();

                if !rows.is_empty() {
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }

                let _ = write!(output, "\n{report}\n");
                output
            }
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => to_json(&ValidationJson::new(result, show_warnings)),
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Configuration is valid\n", "✓".green())
                } else {
                    let mut output = format!("{} Configuration is invalid:\n", "✗".red());
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {}: {}", error.field, error.message);
                    }
                    output
                };

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output
            }
        }
    }

    /// Formats an outcome with color.
    fn format_outcome(outcome: &DeletionOutcome) -> String {
        match outcome {
            DeletionOutcome::Deleted => "deleted".red().to_string(),
            DeletionOutcome::Skipped(_) => "not found".dimmed().to_string(),
            DeletionOutcome::Error(_) => "error".yellow().bold().to_string(),
        }
    }

    /// Formats a presence with color.
    fn format_presence(presence: &Presence) -> String {
        match presence {
            Presence::Present => "present".green().to_string(),
            Presence::Absent => "absent".dimmed().to_string(),
            Presence::Unknown(e) => format!("{} ({})", "unknown".yellow(), Self::truncate(e, 40)),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}

// JSON serialization helpers

/// Pretty-prints `value`, logging instead of failing on a serialization error.
fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        warn!("Failed to serialize command output: {e}");
        String::new()
    })
}

#[derive(Serialize)]
struct PlanJson {
    fingerprint: String,
    stack_count: usize,
    stacks: Vec<PlanStackJson>,
    self_stack: Option<String>,
}

#[derive(Serialize)]
struct PlanStackJson {
    slot: String,
    stack: String,
}

impl From<&TeardownPlan> for PlanJson {
    fn from(plan: &TeardownPlan) -> Self {
        Self {
            fingerprint: plan.fingerprint(),
            stack_count: plan.len(),
            stacks: plan
                .stacks
                .iter()
                .map(|p| PlanStackJson {
                    slot: p.slot.to_string(),
                    stack: p.stack.to_string(),
                })
                .collect(),
            self_stack: plan.self_stack.as_ref().map(ToString::to_string),
        }
    }
}

#[derive(Serialize)]
struct StatusJson<'a> {
    slot: &'a str,
    stack: &'a str,
    state: &'static str,
    error: Option<&'a str>,
}

impl<'a> From<&'a StackPresence> for StatusJson<'a> {
    fn from(presence: &'a StackPresence) -> Self {
        let (state, error) = match &presence.presence {
            Presence::Present => ("present", None),
            Presence::Absent => ("absent", None),
            Presence::Unknown(e) => ("unknown", Some(e.as_str())),
        };

        Self {
            slot: &presence.slot,
            stack: presence.stack.as_str(),
            state,
            error,
        }
    }
}

#[derive(Serialize)]
struct ValidationJson {
    valid: bool,
    errors: Vec<ValidationErrorJson>,
    warnings: Vec<String>,
}

#[derive(Serialize)]
struct ValidationErrorJson {
    field: String,
    message: String,
}

impl ValidationJson {
    fn new(result: &ValidationResult, show_warnings: bool) -> Self {
        Self {
            valid: result.is_valid(),
            errors: result
                .errors
                .iter()
                .map(|e| ValidationErrorJson {
                    field: e.field.clone(),
                    message: e.message.clone(),
                })
                .collect(),
            warnings: if show_warnings {
                result.warnings.clone()
            } else {
                Vec::new()
            },
        }
    }
}
