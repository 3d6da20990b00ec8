//! Message types: the tagged union every agent proposal flows through.
//!
//! Typed messages are only ever constructed by the validator in
//! `marshal-gate`; nothing downstream inspects untyped records again.
//! Messages are immutable after construction: produced once, validated
//! once, then either discarded or passed downstream exactly once.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A participant in the workspace, human or automated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Architect,
    Engineer,
    Reviewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Architect => "architect",
            Role::Engineer => "engineer",
            Role::Reviewer => "reviewer",
        }
    }

    /// All recognized participant identifiers, in wire form.
    pub const ALL: [&'static str; 4] = ["user", "architect", "engineer", "reviewer"];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse risk classification attached to a proposed command.
///
/// Used only to drive approval policy, never to alter execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    pub const ALL: [&'static str; 3] = ["low", "medium", "high"];
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed vocabulary of plan task actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTag {
    Create,
    Modify,
    Command,
    Review,
}

impl ActionTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionTag::Create => "create",
            ActionTag::Modify => "modify",
            ActionTag::Command => "command",
            ActionTag::Review => "review",
        }
    }

    pub const ALL: [&'static str; 4] = ["create", "modify", "command", "review"];
}

impl fmt::Display for ActionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a plan. Task ids must be unique within their plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub assignee: Role,
    pub action: ActionTag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub instructions: String,
}

/// An ordered multi-step proposal; carries no side effects itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMessage {
    pub goal: String,
    pub tasks: Vec<Task>,
}

/// A proposed file change expressed as a unified diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchMessage {
    pub file: String,
    pub diff: String,
    pub summary: String,
}

/// A proposed shell command with its justification and declared risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub command: String,
    pub reason: String,
    pub risk: RiskLevel,
}

/// Plain conversational text or a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessage {
    pub text: String,
}

/// The kind-specific body of an [`AgentMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum MessageBody {
    Plan(PlanMessage),
    Patch(PatchMessage),
    Command(CommandMessage),
    Text(TextMessage),
}

impl MessageBody {
    /// Wire name of the discriminator.
    pub fn kind(&self) -> &'static str {
        match self {
            MessageBody::Plan(_) => "plan",
            MessageBody::Patch(_) => "patch",
            MessageBody::Command(_) => "command",
            MessageBody::Text(_) => "text",
        }
    }
}

/// A validated agent message: `{role, kind, content}` on the wire.
///
/// `role` is optional on the wire; when present it must name a recognized
/// participant. Obtainable only through `marshal_gate::validate_message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(flatten)]
    pub body: MessageBody,
}

impl AgentMessage {
    pub fn kind(&self) -> &'static str {
        self.body.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::Engineer).unwrap(), "\"engineer\"");
        let back: Role = serde_json::from_str("\"reviewer\"").unwrap();
        assert_eq!(back, Role::Reviewer);
    }

    #[test]
    fn risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
    }

    #[test]
    fn command_message_wire_shape() {
        let message = AgentMessage {
            role: Some(Role::Engineer),
            body: MessageBody::Command(CommandMessage {
                command: "pip install pandas".to_owned(),
                reason: "CSV parsing".to_owned(),
                risk: RiskLevel::Low,
            }),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "engineer");
        assert_eq!(json["kind"], "command");
        assert_eq!(json["content"]["command"], "pip install pandas");
        assert_eq!(json["content"]["risk"], "low");
    }

    #[test]
    fn role_omitted_when_absent() {
        let message = AgentMessage {
            role: None,
            body: MessageBody::Text(TextMessage {
                text: "hello".to_owned(),
            }),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert!(json.get("role").is_none());
        assert_eq!(json["kind"], "text");
        assert_eq!(json["content"]["text"], "hello");
    }

    #[test]
    fn plan_task_serde_roundtrip() {
        let plan = MessageBody::Plan(PlanMessage {
            goal: "bootstrap the workspace".to_owned(),
            tasks: vec![Task {
                id: "t1".to_owned(),
                assignee: Role::Engineer,
                action: ActionTag::Create,
                target: Some("src/main.rs".to_owned()),
                instructions: "create the entry point module".to_owned(),
            }],
        });
        let json = serde_json::to_string(&plan).unwrap();
        let back: MessageBody = serde_json::from_str(&json).unwrap();
        assert_eq!(plan, back);
    }
}
