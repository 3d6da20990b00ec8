//! Error taxonomy for marshal operations.
//!
//! A non-zero command exit is deliberately NOT represented here: the
//! executor reports it as data inside `CommandOutcome`.

use thiserror::Error;

/// Errors that can occur while validating, gating, or executing a message.
#[derive(Debug, Error)]
pub enum MarshalError {
    /// The message failed validation. Carries every violated constraint,
    /// not just the first.
    #[error("schema violation: {}", violations.join("; "))]
    SchemaViolation { violations: Vec<String> },
    /// A target path resolved outside the project root.
    #[error("path violation: {0}")]
    PathViolation(String),
    /// The diff does not apply cleanly against current file contents.
    #[error("patch conflict: {0}")]
    PatchConflict(String),
    /// The active policy refuses this operation outright.
    #[error("policy denied: {0}")]
    PolicyDenied(String),
    /// The operation needs an approval grant the caller did not present.
    #[error("approval required: {0}")]
    ApprovalRequired(String),
    /// The audit store rejected an append.
    #[error("audit error: {0}")]
    Audit(String),
    #[error("io error: {0}")]
    Io(String),
}

impl MarshalError {
    /// Single-violation convenience constructor.
    pub fn schema(violation: impl Into<String>) -> Self {
        Self::SchemaViolation {
            violations: vec![violation.into()],
        }
    }
}

impl From<std::io::Error> for MarshalError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

/// Convenience result type for marshal operations.
pub type MarshalResult<T> = Result<T, MarshalError>;
