//! # marshal-protocol — Canonical marshal contract types
//!
//! This crate defines the shared types every marshal component depends on:
//! the typed message sum type, the permission policy record, audit records,
//! and the error taxonomy.
//!
//! It is intentionally dependency-light (no runtime deps like tokio) so it
//! can be used as a pure contract crate.
//!
//! ## Module Overview
//!
//! - [`ids`] — Typed ID wrappers (MessageId, ApprovalId)
//! - [`message`] — AgentMessage tagged union and its payloads
//! - [`policy`] — PermissionPolicy, GateDecision
//! - [`audit`] — AuditAction, AuditRecord
//! - [`error`] — MarshalError, MarshalResult

pub mod audit;
pub mod error;
pub mod ids;
pub mod message;
pub mod policy;

// Re-export the most commonly used types at the crate root.
pub use audit::{AuditAction, AuditRecord};
pub use error::{MarshalError, MarshalResult};
pub use ids::{ApprovalId, MessageId};
pub use message::{
    ActionTag, AgentMessage, CommandMessage, MessageBody, PatchMessage, PlanMessage, RiskLevel,
    Role, Task, TextMessage,
};
pub use policy::{GateDecision, PermissionPolicy};
