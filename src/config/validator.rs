//! Configuration validation for teardown configs.
//!
//! Validation runs before anything is planned, so a bad config never reaches
//! the backend.

use crate::error::{ConfigError, Result, TeardownError};
use std::collections::HashMap;
use tracing::debug;

use super::spec::{LockConfig, StackSlot, TeardownConfig, WaiterConfig};

/// Maximum stack name length accepted by `CloudFormation`.
const MAX_STACK_NAME_LEN: usize = 128;

/// Validator for teardown configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a teardown configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any were found.
    pub fn validate(&self, config: &TeardownConfig) -> Result<ValidationResult> {
        let result = self.check(config);

        match result.errors.first() {
            None => {
                debug!("Configuration validation passed");
                Ok(result)
            }
            Some(first) => Err(TeardownError::Config(ConfigError::validation(
                first.message.clone(),
                first.field.clone(),
            ))),
        }
    }

    /// Collects all errors and warnings without failing.
    #[must_use]
    pub fn check(&self, config: &TeardownConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_stacks(config, &mut result);
        Self::validate_waiter(&config.waiter, &mut result);
        if let Some(lock) = &config.lock {
            Self::validate_lock(lock, config, &mut result);
        }

        result
    }

    /// Validates stack names and their uniqueness.
    fn validate_stacks(config: &TeardownConfig, result: &mut ValidationResult) {
        let mut seen: HashMap<&str, String> = HashMap::new();

        let named = StackSlot::ORDERED
            .into_iter()
            .map(|slot| (format!("stacks.{slot}"), config.stacks.get(slot)))
            .chain(std::iter::once((
                String::from("stacks.self_destruct"),
                config.stacks.self_destruct.as_deref(),
            )));

        for (field, name) in named {
            let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
                continue;
            };

            if !is_valid_stack_name(name) {
                result.errors.push(ValidationError {
                    field: field.clone(),
                    message: format!(
                        "Stack name '{name}' is invalid. Must start with a letter and contain only alphanumerics and hyphens (max {MAX_STACK_NAME_LEN})."
                    ),
                });
            }

            if let Some(previous) = seen.get(name) {
                result.errors.push(ValidationError {
                    field: field.clone(),
                    message: format!("Stack '{name}' is already configured as {previous}"),
                });
            } else {
                seen.insert(name, field);
            }
        }

        let ordered_count = seen
            .values()
            .filter(|field| field.as_str() != "stacks.self_destruct")
            .count();
        if ordered_count == 0 {
            result
                .warnings
                .push(String::from("No stacks configured; teardown will only consider the self-destruct stack"));
        }
    }

    /// Validates the waiter settings.
    fn validate_waiter(waiter: &WaiterConfig, result: &mut ValidationResult) {
        if waiter.poll_interval_secs == 0 {
            result.errors.push(ValidationError {
                field: String::from("waiter.poll_interval_secs"),
                message: String::from("Poll interval must be at least 1 second"),
            });
        }

        if waiter.max_wait_secs == 0 {
            result.errors.push(ValidationError {
                field: String::from("waiter.max_wait_secs"),
                message: String::from("Maximum wait must be at least 1 second"),
            });
        } else if waiter.max_wait_secs < waiter.poll_interval_secs {
            result.warnings.push(format!(
                "waiter.max_wait_secs ({}) is shorter than the poll interval ({}); each stack gets a single poll",
                waiter.max_wait_secs, waiter.poll_interval_secs
            ));
        }

        if !waiter.timeout_is_error {
            result.warnings.push(String::from(
                "waiter.timeout_is_error is false: stacks that never disappear will be reported as deleted",
            ));
        }
    }

    /// Validates the run lock settings.
    fn validate_lock(lock: &LockConfig, config: &TeardownConfig, result: &mut ValidationResult) {
        if lock.path.trim().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("lock.path"),
                message: String::from("Lock path cannot be empty"),
            });
        }

        let stack_count = StackSlot::ORDERED
            .into_iter()
            .filter(|slot| config.stacks.get(*slot).is_some_and(|n| !n.trim().is_empty()))
            .count() as u64;
        let worst_case = stack_count.saturating_mul(config.waiter.max_wait_secs);

        if lock.expiry_secs < worst_case {
            result.warnings.push(format!(
                "lock.expiry_secs ({}) is shorter than the worst-case run ({worst_case}s); a slow run may lose its lock",
                lock.expiry_secs
            ));
        }
    }
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Checks a stack name against `CloudFormation` naming rules.
fn is_valid_stack_name(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_alphabetic());

    starts_with_letter
        && name.len() <= MAX_STACK_NAME_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackNames;

    fn config_with(stacks: StackNames) -> TeardownConfig {
        TeardownConfig {
            stacks,
            ..TeardownConfig::default()
        }
    }

    #[test]
    fn test_valid_config() {
        let config = config_with(StackNames {
            api: Some(String::from("prod-api")),
            auth: Some(String::from("prod-auth")),
            self_destruct: Some(String::from("prod-self-destruct")),
            ..StackNames::default()
        });

        let result = ConfigValidator::new()
            .validate(&config)
            .expect("config should be valid");
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_blank_names_are_ignored() {
        let config = config_with(StackNames {
            api: Some(String::from("prod-api")),
            dev: Some(String::from("   ")),
            ..StackNames::default()
        });

        assert!(ConfigValidator::new().check(&config).is_valid());
    }

    #[test]
    fn test_invalid_stack_name() {
        let config = config_with(StackNames {
            api: Some(String::from("1-prod_api")),
            ..StackNames::default()
        });

        let result = ConfigValidator::new().check(&config);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "stacks.api");
    }

    #[test]
    fn test_self_destruct_must_not_repeat_a_slot() {
        let config = config_with(StackNames {
            api: Some(String::from("prod-api")),
            self_destruct: Some(String::from("prod-api")),
            ..StackNames::default()
        });

        let result = ConfigValidator::new().check(&config);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "stacks.self_destruct");
        assert!(ConfigValidator::new().validate(&config).is_err());
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let mut config = config_with(StackNames {
            api: Some(String::from("prod-api")),
            ..StackNames::default()
        });
        config.waiter.poll_interval_secs = 0;

        let result = ConfigValidator::new().check(&config);
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.field == "waiter.poll_interval_secs")
        );
    }

    #[test]
    fn test_warnings() {
        let mut config = TeardownConfig::default();
        config.waiter.timeout_is_error = false;
        config.waiter.max_wait_secs = 5;
        config.lock = Some(LockConfig {
            path: String::from(".teardown"),
            expiry_secs: 60,
        });

        let result = ConfigValidator::new().check(&config);
        assert!(result.is_valid());
        // no stacks, short max wait, lenient timeouts
        assert_eq!(result.warnings.len(), 3);
    }

    #[test]
    fn test_stack_name_rules() {
        assert!(is_valid_stack_name("prod-app-api"));
        assert!(is_valid_stack_name("A1"));
        assert!(!is_valid_stack_name("-api"));
        assert!(!is_valid_stack_name("api_stack"));
        assert!(!is_valid_stack_name(&"a".repeat(129)));
    }
}
