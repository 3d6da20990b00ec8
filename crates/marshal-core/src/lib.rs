//! # marshal-core — the message pipeline
//!
//! Wires the three stages together: validate the raw record, run the
//! permission gate, park gated proposals in the approval queue, and drive
//! the executor once a human resolves them. All filesystem mutation and
//! process spawning goes through the executor owned here.

use std::path::PathBuf;
use std::sync::Arc;

use marshal_audit::{AuditSink, FileAuditLog};
use marshal_exec::{CommandOutcome, Executor, PatchOutcome};
use marshal_gate::{
    ApprovalQueue, ApprovalTicket, GatedProposal, evaluate_command, evaluate_patch,
    validate_message,
};
use marshal_protocol::{
    AgentMessage, ApprovalId, AuditAction, AuditRecord, GateDecision, MarshalError, MarshalResult,
    MessageBody, MessageId, PermissionPolicy,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

/// Builder for a [`Pipeline`] rooted at a project directory.
#[derive(Clone)]
pub struct PipelineBuilder {
    root: PathBuf,
    policy: PermissionPolicy,
    audit: Option<Arc<dyn AuditSink>>,
}

impl PipelineBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            policy: PermissionPolicy::default(),
            audit: None,
        }
    }

    pub fn policy(mut self, policy: PermissionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Inject a caller-owned audit store (tests use an in-memory one).
    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn build(self) -> Pipeline {
        let audit = self
            .audit
            .unwrap_or_else(|| Arc::new(FileAuditLog::for_root(&self.root)));
        let executor = Executor::new(&self.root, self.policy.clone(), audit.clone());
        Pipeline {
            policy: self.policy,
            executor,
            approvals: ApprovalQueue::default(),
            audit,
        }
    }
}

/// Outcome of submitting a raw message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Submission {
    /// Plans and text carry no side effects; they pass validation and stop.
    Accepted {
        message_id: MessageId,
        message: AgentMessage,
    },
    /// Commands and patches wait for a human decision.
    PendingApproval {
        message_id: MessageId,
        ticket: ApprovalTicket,
    },
}

/// What the executor produced once an approval went through.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Patch(PatchOutcome),
    Command(CommandOutcome),
}

/// Outcome of resolving a pending approval.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum Resolution {
    Denied { actor: String },
    Executed { actor: String, outcome: ExecutionOutcome },
}

/// The validate → gate → approve → execute pipeline.
#[derive(Clone)]
pub struct Pipeline {
    policy: PermissionPolicy,
    executor: Executor,
    approvals: ApprovalQueue,
    audit: Arc<dyn AuditSink>,
}

impl Pipeline {
    pub fn policy(&self) -> &PermissionPolicy {
        &self.policy
    }

    pub fn pending(&self) -> Vec<ApprovalTicket> {
        self.approvals.pending()
    }

    /// Validate a raw record and route it through the gate.
    ///
    /// Validation failure and gate denial are terminal for the message;
    /// gated proposals come back as a pending ticket.
    #[instrument(skip(self, raw))]
    pub async fn submit(&self, raw: &Value) -> MarshalResult<Submission> {
        let message = validate_message(raw)?;
        let message_id = MessageId::new_uuid();
        debug!(%message_id, kind = message.kind(), "message validated");

        let (proposal, decision) = match &message.body {
            MessageBody::Plan(_) | MessageBody::Text(_) => {
                return Ok(Submission::Accepted {
                    message_id,
                    message,
                });
            }
            MessageBody::Command(command) => (
                GatedProposal::Command(command.clone()),
                evaluate_command(command, &self.policy),
            ),
            MessageBody::Patch(patch) => (
                GatedProposal::Patch(patch.clone()),
                evaluate_patch(patch, &self.policy),
            ),
        };

        match decision {
            GateDecision::Deny { reason } => {
                self.audit
                    .append(&AuditRecord::new(
                        AuditAction::PolicyDenied,
                        format!("{} message: {reason}", message.kind()),
                    ))
                    .await
                    .map_err(|error| MarshalError::Audit(error.to_string()))?;
                Err(MarshalError::PolicyDenied(reason))
            }
            GateDecision::RequireApproval { reason } => {
                let ticket = self.approvals.enqueue(proposal, reason);
                info!(approval_id = %ticket.approval_id, "proposal awaiting approval");
                Ok(Submission::PendingApproval { message_id, ticket })
            }
            // The gate never auto-allows commands or patches today; an
            // Allow still goes through the queue so the executor always
            // receives a grant.
            GateDecision::Allow => {
                let ticket = self.approvals.enqueue(proposal, "gated for approval");
                Ok(Submission::PendingApproval { message_id, ticket })
            }
        }
    }

    /// Resolve a pending ticket. Approval drives the executor immediately;
    /// denial just closes the ticket.
    #[instrument(skip(self, actor), fields(%approval_id))]
    pub async fn resolve(
        &self,
        approval_id: &ApprovalId,
        approved: bool,
        actor: impl Into<String>,
    ) -> MarshalResult<Resolution> {
        let resolved = self
            .approvals
            .resolve(approval_id, approved, actor)
            .ok_or_else(|| {
                MarshalError::ApprovalRequired(format!("no pending approval with id {approval_id}"))
            })?;

        let actor = resolved.resolution.actor.clone();
        let Some(grant) = resolved.grant else {
            info!(%actor, "proposal denied by human");
            return Ok(Resolution::Denied { actor });
        };

        let outcome = match &resolved.proposal {
            GatedProposal::Command(command) => ExecutionOutcome::Command(
                self.executor.run_command(command, &grant, None).await?,
            ),
            GatedProposal::Patch(patch) => {
                ExecutionOutcome::Patch(self.executor.apply_patch(patch, &grant).await?)
            }
        };
        Ok(Resolution::Executed { actor, outcome })
    }
}
