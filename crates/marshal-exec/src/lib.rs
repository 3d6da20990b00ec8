//! # marshal-exec — the audited executor
//!
//! The single trust boundary permitted to write files or spawn processes.
//! It treats itself as the last line of defense: policy and path
//! constraints are re-verified here rather than trusted from upstream, and
//! every action appends one audit record.

pub mod diff;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use marshal_audit::AuditSink;
use marshal_gate::{ApprovalGrant, evaluate_command, evaluate_patch};
use marshal_protocol::{
    AuditAction, AuditRecord, CommandMessage, GateDecision, MarshalError, MarshalResult,
    PatchMessage, PermissionPolicy,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Result of a successful patch application.
#[derive(Debug, Clone, Serialize)]
pub struct PatchOutcome {
    pub file: String,
    pub bytes_written: usize,
    /// SHA-256 of the resulting file content, hex-encoded.
    pub content_hash: String,
}

/// Result of one command invocation. A non-zero exit code is a normal,
/// reportable outcome, not an executor failure.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: i64,
}

/// Executes approved patches and commands inside a project root.
#[derive(Clone)]
pub struct Executor {
    root: PathBuf,
    policy: PermissionPolicy,
    audit: Arc<dyn AuditSink>,
}

impl Executor {
    pub fn new(root: impl Into<PathBuf>, policy: PermissionPolicy, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            root: root.into(),
            policy,
            audit,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> &PermissionPolicy {
        &self.policy
    }

    /// Apply an approved patch atomically with respect to its diff.
    ///
    /// Fails with `PathViolation` before any write when the target escapes
    /// the project root, and with `PatchConflict` (no partial write) when
    /// the diff does not apply cleanly against current content.
    #[instrument(skip(self, message, grant), fields(file = %message.file))]
    pub async fn apply_patch(
        &self,
        message: &PatchMessage,
        grant: &ApprovalGrant,
    ) -> MarshalResult<PatchOutcome> {
        if let GateDecision::Deny { reason } = evaluate_patch(message, &self.policy) {
            self.record(AuditAction::PolicyDenied, format!("{}: {reason}", message.file))
                .await?;
            return Err(MarshalError::PolicyDenied(reason));
        }
        if !grant.covers_patch(message) {
            return Err(MarshalError::ApprovalRequired(format!(
                "approval grant does not cover patch to {}",
                message.file
            )));
        }

        let target = match contained_path(&self.root, &message.file) {
            Ok(target) => target,
            Err(error) => {
                warn!(file = %message.file, "patch target escapes project root");
                self.record(AuditAction::PathViolation, message.file.clone())
                    .await?;
                return Err(error);
            }
        };

        let parsed = diff::parse_diff(&message.diff)?;
        let exists = fs::try_exists(&target).await.unwrap_or(false);
        if parsed.creates_file() && exists {
            return Err(MarshalError::PatchConflict(format!(
                "{} already exists but the diff creates it",
                message.file
            )));
        }
        let original = if exists {
            fs::read_to_string(&target).await?
        } else {
            String::new()
        };

        let patched = diff::apply_hunks(&original, &parsed.hunks)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, &patched).await?;

        let content_hash = hex::encode(Sha256::digest(patched.as_bytes()));
        self.record(
            AuditAction::PatchApplied,
            format!("{} ({}) sha256={content_hash}", message.file, message.summary),
        )
        .await?;
        debug!(bytes = patched.len(), "patch applied");

        Ok(PatchOutcome {
            file: message.file.clone(),
            bytes_written: patched.len(),
            content_hash,
        })
    }

    /// Run an approved command to completion, capturing exit code and both
    /// output streams in full. Re-evaluates the gate itself; a `Deny`
    /// decision wins over any presented grant.
    #[instrument(skip(self, message, grant), fields(command = %message.command, risk = %message.risk))]
    pub async fn run_command(
        &self,
        message: &CommandMessage,
        grant: &ApprovalGrant,
        cwd: Option<&Path>,
    ) -> MarshalResult<CommandOutcome> {
        match evaluate_command(message, &self.policy) {
            GateDecision::Deny { reason } => {
                warn!(%reason, "command denied at execution time");
                self.record(
                    AuditAction::PolicyDenied,
                    format!("{} (risk={}): {reason}", message.command, message.risk),
                )
                .await?;
                return Err(MarshalError::PolicyDenied(reason));
            }
            GateDecision::Allow | GateDecision::RequireApproval { .. } => {
                if !grant.covers_command(message) {
                    return Err(MarshalError::ApprovalRequired(format!(
                        "approval grant does not cover command `{}`",
                        message.command
                    )));
                }
            }
        }

        let started_at = Utc::now();
        let output = Command::new("sh")
            .arg("-c")
            .arg(&message.command)
            .current_dir(cwd.unwrap_or(&self.root))
            .output()
            .await?;
        let ended_at = Utc::now();

        let outcome = CommandOutcome {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            started_at,
            ended_at,
            duration_ms: (ended_at - started_at).num_milliseconds(),
        };

        self.record(
            AuditAction::CommandExecuted,
            format!(
                "{} (risk={}) exit={}",
                message.command, message.risk, outcome.exit_code
            ),
        )
        .await?;
        debug!(
            exit_code = outcome.exit_code,
            duration_ms = outcome.duration_ms,
            "command finished"
        );
        Ok(outcome)
    }

    async fn record(&self, action: AuditAction, detail: String) -> MarshalResult<()> {
        self.audit
            .append(&AuditRecord::new(action, detail))
            .await
            .map_err(|error| MarshalError::Audit(error.to_string()))
    }
}

/// Resolve a target path and verify it stays inside the project root.
///
/// Absolute paths and `..` components are rejected lexically; when the
/// parent already exists it is canonicalized as a symlink backstop.
fn contained_path(root: &Path, relative: &str) -> MarshalResult<PathBuf> {
    let rel = Path::new(relative);
    if rel.is_absolute() {
        return Err(MarshalError::PathViolation(format!(
            "{relative}: absolute paths are not allowed"
        )));
    }
    if rel
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        return Err(MarshalError::PathViolation(format!(
            "{relative}: path escapes project root"
        )));
    }

    let candidate = root.join(rel);
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    if let Some(parent) = candidate.parent()
        && parent.exists()
    {
        let canonical_parent = parent
            .canonicalize()
            .map_err(|error| MarshalError::Io(error.to_string()))?;
        if !canonical_parent.starts_with(&root) {
            return Err(MarshalError::PathViolation(format!(
                "{relative}: path escapes project root"
            )));
        }
    }
    Ok(candidate)
}
