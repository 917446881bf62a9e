//! Configuration specification types for the teardown system.
//!
//! This module defines the structs that map to `teardown.yaml`. Every value
//! can also be supplied through the environment; see [`super::ConfigParser`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The root configuration structure for a teardown run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeardownConfig {
    /// Names of the stacks to delete, one per slot.
    #[serde(default)]
    pub stacks: StackNames,
    /// Deletion waiter tuning.
    #[serde(default)]
    pub waiter: WaiterConfig,
    /// Backend connection settings.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Optional run lock.
    #[serde(default)]
    pub lock: Option<LockConfig>,
}

/// A named position in the teardown order.
///
/// Slots are listed consumers first: a stack is deleted before every stack it
/// depends on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StackSlot {
    /// Operational dashboards and alarms.
    Ops,
    /// Static site publishing.
    Publish,
    /// CDN edge distribution.
    Edge,
    /// Function-backed HTTP API.
    Api,
    /// Identity and sign-in.
    Auth,
    /// Tax authority integration.
    Hmrc,
    /// Customer account storage.
    Account,
    /// Developer tooling.
    Dev,
}

impl StackSlot {
    /// All ordered slots, in deletion order.
    pub const ORDERED: [Self; 8] = [
        Self::Ops,
        Self::Publish,
        Self::Edge,
        Self::Api,
        Self::Auth,
        Self::Hmrc,
        Self::Account,
        Self::Dev,
    ];

    /// Environment variable holding the stack name for this slot.
    #[must_use]
    pub const fn env_key(self) -> &'static str {
        match self {
            Self::Ops => "OPS_STACK_NAME",
            Self::Publish => "PUBLISH_STACK_NAME",
            Self::Edge => "EDGE_STACK_NAME",
            Self::Api => "API_STACK_NAME",
            Self::Auth => "AUTH_STACK_NAME",
            Self::Hmrc => "HMRC_STACK_NAME",
            Self::Account => "ACCOUNT_STACK_NAME",
            Self::Dev => "DEV_STACK_NAME",
        }
    }

    /// Short lowercase name, as used in the configuration file.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ops => "ops",
            Self::Publish => "publish",
            Self::Edge => "edge",
            Self::Api => "api",
            Self::Auth => "auth",
            Self::Hmrc => "hmrc",
            Self::Account => "account",
            Self::Dev => "dev",
        }
    }
}

impl fmt::Display for StackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Environment variable holding the name of the stack that hosts the teardown
/// handler itself.
pub const SELF_DESTRUCT_ENV_KEY: &str = "SELF_DESTRUCT_STACK_NAME";

/// Stack names per slot. Absent or blank names are left out of the plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StackNames {
    /// Operations stack.
    #[serde(default)]
    pub ops: Option<String>,
    /// Publish stack.
    #[serde(default)]
    pub publish: Option<String>,
    /// Edge stack.
    #[serde(default)]
    pub edge: Option<String>,
    /// API stack.
    #[serde(default)]
    pub api: Option<String>,
    /// Auth stack.
    #[serde(default)]
    pub auth: Option<String>,
    /// HMRC integration stack.
    #[serde(default)]
    pub hmrc: Option<String>,
    /// Account stack.
    #[serde(default)]
    pub account: Option<String>,
    /// Dev stack.
    #[serde(default)]
    pub dev: Option<String>,
    /// The stack hosting the teardown handler. Deleted last, if at all.
    #[serde(default)]
    pub self_destruct: Option<String>,
}

impl StackNames {
    /// Builds stack names from a key lookup, typically the process environment.
    ///
    /// Keys are the slot environment keys plus [`SELF_DESTRUCT_ENV_KEY`].
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut names = Self::default();
        names.merge_lookup(lookup);
        names
    }

    /// Overrides slots for which the lookup returns a value.
    pub fn merge_lookup<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for slot in StackSlot::ORDERED {
            if let Some(value) = lookup(slot.env_key()) {
                *self.slot_mut(slot) = Some(value);
            }
        }
        if let Some(value) = lookup(SELF_DESTRUCT_ENV_KEY) {
            self.self_destruct = Some(value);
        }
    }

    /// Returns the configured name for a slot, if any.
    #[must_use]
    pub fn get(&self, slot: StackSlot) -> Option<&str> {
        let value = match slot {
            StackSlot::Ops => &self.ops,
            StackSlot::Publish => &self.publish,
            StackSlot::Edge => &self.edge,
            StackSlot::Api => &self.api,
            StackSlot::Auth => &self.auth,
            StackSlot::Hmrc => &self.hmrc,
            StackSlot::Account => &self.account,
            StackSlot::Dev => &self.dev,
        };
        value.as_deref()
    }

    /// Mutable access to a slot.
    const fn slot_mut(&mut self, slot: StackSlot) -> &mut Option<String> {
        match slot {
            StackSlot::Ops => &mut self.ops,
            StackSlot::Publish => &mut self.publish,
            StackSlot::Edge => &mut self.edge,
            StackSlot::Api => &mut self.api,
            StackSlot::Auth => &mut self.auth,
            StackSlot::Hmrc => &mut self.hmrc,
            StackSlot::Account => &mut self.account,
            StackSlot::Dev => &mut self.dev,
        }
    }
}

/// Deletion waiter configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WaiterConfig {
    /// Seconds between existence polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Maximum seconds to wait for a single stack to disappear.
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u64,
    /// Record a wait timeout as an error instead of a deletion.
    #[serde(default = "default_timeout_is_error")]
    pub timeout_is_error: bool,
}

impl WaiterConfig {
    /// Poll interval as a duration.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Maximum wait as a duration.
    #[must_use]
    pub const fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_wait_secs: default_max_wait(),
            timeout_is_error: default_timeout_is_error(),
        }
    }
}

/// Backend connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// AWS region (falls back to the AWS environment when unset).
    #[serde(default)]
    pub region: Option<String>,
}

/// Local run lock settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockConfig {
    /// Directory holding the lock file.
    pub path: String,
    /// Seconds after which a stale lock may be taken over.
    #[serde(default = "default_lock_expiry")]
    pub expiry_secs: u64,
}

// Default value functions

const fn default_poll_interval() -> u64 {
    10
}

const fn default_max_wait() -> u64 {
    600
}

const fn default_timeout_is_error() -> bool {
    true
}

const fn default_lock_expiry() -> u64 {
    7200
}
