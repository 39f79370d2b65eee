//! Static permission policy

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// What the policy says about a permission class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Allow,
    Deny,
    Ask,
}

impl FromStr for PermissionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            "ask" => Ok(Self::Ask),
            other => Err(format!("Unknown permission level: {other}. Use: allow, deny, or ask")),
        }
    }
}

/// Map from permission class to level, deny-by-default for unknown classes
#[derive(Debug, Clone)]
pub struct PermissionPolicy {
    policy: HashMap<String, PermissionLevel>,
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        let mut policy = HashMap::new();
        policy.insert("file_read".to_string(), PermissionLevel::Allow);
        policy.insert("file_write".to_string(), PermissionLevel::Ask);
        policy.insert("shell_exec".to_string(), PermissionLevel::Ask);
        policy.insert("net_access".to_string(), PermissionLevel::Allow);
        Self { policy }
    }
}

impl PermissionPolicy {
    /// Apply configuration overrides; invalid levels are skipped with a warning
    pub fn with_overrides(mut self, overrides: &HashMap<String, String>) -> Self {
        for (class, level) in overrides {
            match level.parse::<PermissionLevel>() {
                Ok(level) => {
                    self.policy.insert(class.clone(), level);
                }
                Err(e) => warn!(%class, %e, "PermissionPolicy::with_overrides: skipping invalid override"),
            }
        }
        self
    }

    /// Level for a permission class; unknown classes are denied
    pub fn level(&self, permission: &str) -> PermissionLevel {
        self.policy.get(permission).copied().unwrap_or(PermissionLevel::Deny)
    }

    /// True if this permission class requires explicit approval
    pub fn requires_approval(&self, permission: &str) -> bool {
        self.level(permission) == PermissionLevel::Ask
    }
}
