//! Rate limit policies and the per-operation policy table.
//!
//! A policy is a `limit` of admitted requests per fixed window of
//! `window_seconds`. Policies are looked up by operation tag, with a fallback
//! default for operations that have no entry of their own.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Result, TurnstileError};

/// Operation tag for sending login links.
pub const AUTH_SEND: &str = "auth-send";
/// Operation tag for location lookups.
pub const LOCATION: &str = "location";
/// Operation tag for event creation.
pub const EVENT_CREATE: &str = "event-create";

/// Maximum admitted requests per fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Maximum admitted requests per window
    pub limit: u64,
    /// Window length in seconds
    pub window_seconds: u64,
}

impl Policy {
    /// Create a policy. Use [`Policy::validate`] before relying on it.
    pub const fn new(limit: u64, window_seconds: u64) -> Self {
        Self {
            limit,
            window_seconds,
        }
    }

    /// Reject zero limits and zero windows.
    ///
    /// These are configuration mistakes; they are never clamped to a usable
    /// value because that would hide the mistake.
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 || self.window_seconds == 0 {
            return Err(TurnstileError::InvalidPolicy {
                limit: self.limit,
                window_seconds: self.window_seconds,
            });
        }
        Ok(())
    }

    /// Window length in milliseconds.
    pub fn window_ms(&self) -> i64 {
        i64::try_from(self.window_seconds)
            .ok()
            .and_then(|secs| secs.checked_mul(1000))
            .unwrap_or(i64::MAX)
    }
}

/// Policies keyed by operation tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyTable {
    /// Policy for operations without an explicit entry
    #[serde(default = "default_policy")]
    pub default: Policy,

    /// Operation tag -> policy
    #[serde(default = "default_operations")]
    pub operations: HashMap<String, Policy>,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self {
            default: default_policy(),
            operations: default_operations(),
        }
    }
}

fn default_policy() -> Policy {
    Policy::new(10, 60)
}

fn default_operations() -> HashMap<String, Policy> {
    HashMap::from([
        (AUTH_SEND.to_string(), Policy::new(3, 60)),
        (LOCATION.to_string(), Policy::new(20, 60)),
        (EVENT_CREATE.to_string(), Policy::new(5, 60)),
    ])
}

impl PolicyTable {
    /// Load and validate a policy table from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let table: PolicyTable = serde_yaml::from_str(yaml).map_err(|e| {
            TurnstileError::Config(format!("Failed to parse rate limit policies: {}", e))
        })?;
        table.validate()?;
        Ok(table)
    }

    /// Validate every policy in the table, including the default.
    pub fn validate(&self) -> Result<()> {
        self.default.validate()?;
        for (operation, policy) in &self.operations {
            policy.validate().map_err(|e| {
                TurnstileError::Config(format!("operation '{}': {}", operation, e))
            })?;
        }
        Ok(())
    }

    /// Get the policy for an operation, falling back to the default.
    pub fn policy_for(&self, operation: &str) -> Policy {
        self.operations
            .get(operation)
            .copied()
            .unwrap_or(self.default)
    }
}
