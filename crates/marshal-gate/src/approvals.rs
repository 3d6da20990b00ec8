//! Approval queue: pending tickets and the single-use grants minted when a
//! human approves one.
//!
//! A grant binds the exact proposal that was approved (command text + risk,
//! or patch file + diff); the executor refuses a grant that does not cover
//! the operation it is handed.

use std::collections::HashMap;
use std::sync::Arc;

use marshal_protocol::{ApprovalId, CommandMessage, PatchMessage};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

/// A gated proposal awaiting human approval.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GatedProposal {
    Command(CommandMessage),
    Patch(PatchMessage),
}

impl GatedProposal {
    fn describe(&self) -> String {
        match self {
            GatedProposal::Command(command) => {
                format!("command `{}` (risk={})", command.command, command.risk)
            }
            GatedProposal::Patch(patch) => format!("patch to {}", patch.file),
        }
    }
}

/// A pending entry in the approval queue.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalTicket {
    pub approval_id: ApprovalId,
    pub proposal: GatedProposal,
    pub reason: String,
}

/// Outcome recorded when a ticket is resolved.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalResolution {
    pub approved: bool,
    pub actor: String,
}

/// Evidence of one explicit human approval, scoped to one exact proposal.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalGrant {
    approval_id: ApprovalId,
    actor: String,
    proposal: GatedProposal,
}

impl ApprovalGrant {
    pub fn approval_id(&self) -> &ApprovalId {
        &self.approval_id
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Whether this grant covers exactly this command/risk pair.
    pub fn covers_command(&self, message: &CommandMessage) -> bool {
        matches!(
            &self.proposal,
            GatedProposal::Command(granted)
                if granted.command == message.command && granted.risk == message.risk
        )
    }

    /// Whether this grant covers exactly this patch.
    pub fn covers_patch(&self, message: &PatchMessage) -> bool {
        matches!(
            &self.proposal,
            GatedProposal::Patch(granted)
                if granted.file == message.file && granted.diff == message.diff
        )
    }
}

/// A resolved ticket: the resolution, the original proposal, and — when
/// approved — the grant to hand to the executor.
#[derive(Debug, Clone)]
pub struct ResolvedApproval {
    pub resolution: ApprovalResolution,
    pub proposal: GatedProposal,
    pub grant: Option<ApprovalGrant>,
}

/// In-memory queue of proposals awaiting a human decision.
///
/// Caller-owned, never ambient: tests inject an isolated queue per case.
#[derive(Debug, Default, Clone)]
pub struct ApprovalQueue {
    pending: Arc<Mutex<HashMap<ApprovalId, ApprovalTicket>>>,
    resolved: Arc<Mutex<HashMap<ApprovalId, ApprovalResolution>>>,
}

impl ApprovalQueue {
    pub fn enqueue(&self, proposal: GatedProposal, reason: impl Into<String>) -> ApprovalTicket {
        let ticket = ApprovalTicket {
            approval_id: ApprovalId::new_uuid(),
            proposal,
            reason: reason.into(),
        };
        debug!(
            approval_id = %ticket.approval_id,
            proposal = %ticket.proposal.describe(),
            "approval enqueued"
        );
        self.pending
            .lock()
            .insert(ticket.approval_id.clone(), ticket.clone());
        ticket
    }

    /// Resolve a pending ticket. Returns `None` for unknown ids; approving
    /// mints a grant bound to the ticket's proposal.
    pub fn resolve(
        &self,
        approval_id: &ApprovalId,
        approved: bool,
        actor: impl Into<String>,
    ) -> Option<ResolvedApproval> {
        let ticket = self.pending.lock().remove(approval_id)?;
        let actor = actor.into();
        let resolution = ApprovalResolution {
            approved,
            actor: actor.clone(),
        };
        self.resolved
            .lock()
            .insert(approval_id.clone(), resolution.clone());
        debug!(%approval_id, approved, %actor, "approval resolved");

        let grant = approved.then(|| ApprovalGrant {
            approval_id: approval_id.clone(),
            actor,
            proposal: ticket.proposal.clone(),
        });
        Some(ResolvedApproval {
            resolution,
            proposal: ticket.proposal,
            grant,
        })
    }

    pub fn pending(&self) -> Vec<ApprovalTicket> {
        self.pending.lock().values().cloned().collect()
    }

    pub fn resolution(&self, approval_id: &ApprovalId) -> Option<ApprovalResolution> {
        self.resolved.lock().get(approval_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marshal_protocol::RiskLevel;

    fn sample_command() -> CommandMessage {
        CommandMessage {
            command: "echo hello".to_owned(),
            reason: "demo".to_owned(),
            risk: RiskLevel::Low,
        }
    }

    #[test]
    fn approve_mints_a_grant_covering_the_exact_proposal() {
        let queue = ApprovalQueue::default();
        let ticket = queue.enqueue(GatedProposal::Command(sample_command()), "gated");
        assert_eq!(queue.pending().len(), 1);

        let resolved = queue.resolve(&ticket.approval_id, true, "alex").unwrap();
        assert!(resolved.resolution.approved);
        let grant = resolved.grant.unwrap();
        assert!(grant.covers_command(&sample_command()));
        assert!(queue.pending().is_empty());
        assert!(queue.resolution(&ticket.approval_id).unwrap().approved);
    }

    #[test]
    fn grant_does_not_cover_a_different_command_or_risk() {
        let queue = ApprovalQueue::default();
        let ticket = queue.enqueue(GatedProposal::Command(sample_command()), "gated");
        let grant = queue
            .resolve(&ticket.approval_id, true, "alex")
            .unwrap()
            .grant
            .unwrap();

        let other_text = CommandMessage {
            command: "echo goodbye".to_owned(),
            ..sample_command()
        };
        assert!(!grant.covers_command(&other_text));

        let other_risk = CommandMessage {
            risk: RiskLevel::High,
            ..sample_command()
        };
        assert!(!grant.covers_command(&other_risk));
    }

    #[test]
    fn denial_resolves_without_a_grant() {
        let queue = ApprovalQueue::default();
        let ticket = queue.enqueue(GatedProposal::Command(sample_command()), "gated");
        let resolved = queue.resolve(&ticket.approval_id, false, "alex").unwrap();
        assert!(!resolved.resolution.approved);
        assert!(resolved.grant.is_none());
    }

    #[test]
    fn unknown_and_double_resolution_return_none() {
        let queue = ApprovalQueue::default();
        assert!(queue.resolve(&ApprovalId::new_uuid(), true, "alex").is_none());

        let ticket = queue.enqueue(GatedProposal::Command(sample_command()), "gated");
        assert!(queue.resolve(&ticket.approval_id, true, "alex").is_some());
        assert!(queue.resolve(&ticket.approval_id, true, "alex").is_none());
    }
}
