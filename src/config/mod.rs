//! Configuration module for the teardown system.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `teardown.yaml`
//! - Overlaying environment variables (and `.env`) on top of the file
//! - Validation of stack names and waiter settings

mod spec;
mod parser;
mod validator;

pub use spec::{
    BackendConfig, LockConfig, SELF_DESTRUCT_ENV_KEY, StackNames, StackSlot, TeardownConfig,
    WaiterConfig,
};
pub use parser::{
    ConfigParser, DEFAULT_CONFIG_FILES, MAX_WAIT_ENV_KEY, POLL_INTERVAL_ENV_KEY, REGION_ENV_KEY,
    TIMEOUT_IS_ERROR_ENV_KEY, find_config_file,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
