//! Policy types: the permission record and gate decisions.

use serde::{Deserialize, Serialize};

/// Configuration governing what the executor may be asked to do.
///
/// An empty `allowed_command_prefixes` list means no prefix restriction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionPolicy {
    #[serde(default = "default_allow_commands")]
    pub allow_commands: bool,
    #[serde(default)]
    pub allow_high_risk: bool,
    #[serde(default)]
    pub allowed_command_prefixes: Vec<String>,
}

fn default_allow_commands() -> bool {
    true
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        Self {
            allow_commands: true,
            allow_high_risk: false,
            allowed_command_prefixes: Vec::new(),
        }
    }
}

/// Outcome of the permission gate. Advisory and stateless; the executor
/// re-derives it before acting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    Allow,
    RequireApproval { reason: String },
    Deny { reason: String },
}

impl GateDecision {
    pub fn is_deny(&self) -> bool {
        matches!(self, GateDecision::Deny { .. })
    }

    pub fn requires_approval(&self) -> bool {
        matches!(self, GateDecision::RequireApproval { .. })
    }
}
