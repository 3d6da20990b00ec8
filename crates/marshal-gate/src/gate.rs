//! The permission gate: pure decision functions between validation and
//! execution. Stateless and side-effect free so they are testable without
//! a live filesystem or process table — and cheap for the executor to
//! re-run as the last line of defense.

use marshal_protocol::{CommandMessage, GateDecision, PatchMessage, PermissionPolicy, RiskLevel};

/// Decide whether a validated command may proceed.
///
/// `Allow` is never returned for commands: the loosest outcome is
/// `RequireApproval`, deferring to an interactive human approval step.
pub fn evaluate_command(message: &CommandMessage, policy: &PermissionPolicy) -> GateDecision {
    if !policy.allow_commands {
        return GateDecision::Deny {
            reason: "command execution is disabled by policy".to_owned(),
        };
    }

    if message.risk == RiskLevel::High && !policy.allow_high_risk {
        return GateDecision::Deny {
            reason: "high-risk commands are disabled by policy".to_owned(),
        };
    }

    if !policy.allowed_command_prefixes.is_empty()
        && !policy
            .allowed_command_prefixes
            .iter()
            .any(|prefix| message.command.starts_with(prefix))
    {
        return GateDecision::Deny {
            reason: format!(
                "command does not start with any allowed prefix: {}",
                policy.allowed_command_prefixes.join(", ")
            ),
        };
    }

    GateDecision::RequireApproval {
        reason: format!("command (risk={}) awaits explicit approval", message.risk),
    }
}

/// Decide whether a validated patch may proceed.
///
/// File mutation is never automatic; every patch defers to human approval.
pub fn evaluate_patch(message: &PatchMessage, _policy: &PermissionPolicy) -> GateDecision {
    GateDecision::RequireApproval {
        reason: format!("patch to {} awaits explicit approval", message.file),
    }
}
