//! # marshal-gate — validation and permission gating
//!
//! The single boundary that converts untyped agent records into the typed
//! [`marshal_protocol::AgentMessage`] sum type, plus the pure policy gate
//! that decides Allow / RequireApproval / Deny, and the approval queue that
//! turns human approvals into single-use grants.

pub mod approvals;
pub mod gate;
pub mod validate;

pub use approvals::{
    ApprovalGrant, ApprovalQueue, ApprovalResolution, ApprovalTicket, GatedProposal,
    ResolvedApproval,
};
pub use gate::{evaluate_command, evaluate_patch};
pub use validate::{MIN_COMMAND_LEN, MIN_DIFF_LEN, MIN_INSTRUCTIONS_LEN, validate_message};
