//! Audit records: immutable proof that an executor action occurred.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Action tag recorded with every audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    PatchApplied,
    CommandExecuted,
    PathViolation,
    PolicyDenied,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::PatchApplied => "PATCH_APPLIED",
            AuditAction::CommandExecuted => "COMMAND_EXECUTED",
            AuditAction::PathViolation => "PATH_VIOLATION",
            AuditAction::PolicyDenied => "POLICY_DENIED",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only audit entry: timestamp, action tag, free-text detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub detail: String,
}

impl AuditRecord {
    pub fn new(action: AuditAction, detail: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            detail: detail.into(),
        }
    }

    /// On-disk entry format: `[ISO-8601 timestamp] ACTION\ndetail\n\n`.
    pub fn render(&self) -> String {
        format!(
            "[{}] {}\n{}\n\n",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.action,
            self.detail
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_matches_entry_format() {
        let record = AuditRecord::new(AuditAction::CommandExecuted, "echo hello (risk=low)");
        let rendered = record.render();
        assert!(rendered.starts_with('['));
        assert!(rendered.contains("] COMMAND_EXECUTED\n"));
        assert!(rendered.ends_with("echo hello (risk=low)\n\n"));
    }

    #[test]
    fn action_wire_names() {
        let json = serde_json::to_string(&AuditAction::PathViolation).unwrap();
        assert_eq!(json, "\"path_violation\"");
        assert_eq!(AuditAction::PathViolation.to_string(), "PATH_VIOLATION");
    }
}
