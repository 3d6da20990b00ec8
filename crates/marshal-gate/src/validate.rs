//! Strict structural validation of raw agent records.
//!
//! `validate_message` is a pure function of its input plus the fixed schema
//! table below. It collects every violated constraint before failing, and
//! rejects unrecognized fields at every level so an agent cannot smuggle
//! unvalidated instructions past the gate.

use indexmap::IndexSet;
use marshal_protocol::{
    ActionTag, AgentMessage, CommandMessage, MarshalError, MarshalResult, MessageBody,
    PatchMessage, PlanMessage, RiskLevel, Role, Task, TextMessage,
};
use serde_json::{Map, Value};

/// Minimum length of a command string.
pub const MIN_COMMAND_LEN: usize = 2;
/// Minimum length of a patch diff body.
pub const MIN_DIFF_LEN: usize = 8;
/// Minimum length of a plan task's instructions.
pub const MIN_INSTRUCTIONS_LEN: usize = 10;

const DIFF_MARKERS: [&str; 4] = ["--- ", "+++ ", "@@ ", "diff "];

#[derive(Debug, Default)]
struct Violations {
    seen: IndexSet<String>,
}

impl Violations {
    fn push(&mut self, violation: impl Into<String>) {
        self.seen.insert(violation.into());
    }

    fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn into_error(self) -> MarshalError {
        MarshalError::SchemaViolation {
            violations: self.seen.into_iter().collect(),
        }
    }
}

/// Validate a raw untyped record against the message schema table.
///
/// Returns the typed message, or a [`MarshalError::SchemaViolation`]
/// listing every violated constraint.
pub fn validate_message(raw: &Value) -> MarshalResult<AgentMessage> {
    let Some(object) = raw.as_object() else {
        return Err(MarshalError::schema("message: expected a JSON object"));
    };

    let mut violations = Violations::default();
    check_unknown_keys(object, &["role", "kind", "content"], "message", &mut violations);

    let role = match object.get("role") {
        None => None,
        Some(value) => parse_enum::<Role>(value, "message.role", &Role::ALL, &mut violations),
    };

    let kind = required_str(object, "kind", "message", &mut violations);
    let content = match object.get("content") {
        Some(Value::Object(map)) => Some(map),
        Some(_) => {
            violations.push("message.content: expected an object");
            None
        }
        None => {
            violations.push("message.content: missing required field");
            None
        }
    };

    let body = match kind {
        Some(kind @ ("plan" | "patch" | "command" | "text")) => {
            content.and_then(|content| match kind {
                "plan" => validate_plan(content, &mut violations).map(MessageBody::Plan),
                "patch" => validate_patch(content, &mut violations).map(MessageBody::Patch),
                "command" => validate_command(content, &mut violations).map(MessageBody::Command),
                _ => validate_text(content, &mut violations).map(MessageBody::Text),
            })
        }
        Some(other) => {
            violations.push(format!("message.kind: unrecognized message kind `{other}`"));
            None
        }
        None => None,
    };

    match body {
        Some(body) if violations.is_empty() => Ok(AgentMessage { role, body }),
        _ => Err(violations.into_error()),
    }
}

fn validate_plan(content: &Map<String, Value>, violations: &mut Violations) -> Option<PlanMessage> {
    check_unknown_keys(content, &["goal", "tasks"], "content", violations);
    let goal = required_non_empty(content, "goal", "content", violations);

    let tasks = match content.get("tasks") {
        Some(Value::Array(items)) => {
            if items.is_empty() {
                violations.push("content.tasks: a plan requires at least one task");
            }
            let mut seen_ids: IndexSet<&str> = IndexSet::new();
            let parsed: Vec<Option<Task>> = items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    validate_task(item, index, &mut seen_ids, violations)
                })
                .collect();
            parsed.into_iter().collect::<Option<Vec<Task>>>()
        }
        Some(_) => {
            violations.push("content.tasks: expected an array");
            None
        }
        None => {
            violations.push("content.tasks: missing required field");
            None
        }
    };

    Some(PlanMessage {
        goal: goal?.to_owned(),
        tasks: tasks?,
    })
}

fn validate_task<'a>(
    item: &'a Value,
    index: usize,
    seen_ids: &mut IndexSet<&'a str>,
    violations: &mut Violations,
) -> Option<Task> {
    let path = format!("content.tasks[{index}]");
    let Some(object) = item.as_object() else {
        violations.push(format!("{path}: expected an object"));
        return None;
    };

    check_unknown_keys(
        object,
        &["id", "assignee", "action", "target", "instructions"],
        &path,
        violations,
    );

    let id = required_non_empty(object, "id", &path, violations);
    if let Some(id) = id
        && !seen_ids.insert(id)
    {
        violations.push(format!("{path}.id: duplicate task id `{id}`"));
    }

    let assignee = match object.get("assignee") {
        Some(value) => parse_enum::<Role>(value, &format!("{path}.assignee"), &Role::ALL, violations),
        None => {
            violations.push(format!("{path}.assignee: missing required field"));
            None
        }
    };
    let action = match object.get("action") {
        Some(value) => {
            parse_enum::<ActionTag>(value, &format!("{path}.action"), &ActionTag::ALL, violations)
        }
        None => {
            violations.push(format!("{path}.action: missing required field"));
            None
        }
    };

    let target = match object.get("target") {
        None | Some(Value::Null) => None,
        Some(Value::String(target)) => Some(target.clone()),
        Some(_) => {
            violations.push(format!("{path}.target: expected a string"));
            None
        }
    };

    let instructions = required_min_len(
        object,
        "instructions",
        &path,
        MIN_INSTRUCTIONS_LEN,
        violations,
    );

    Some(Task {
        id: id?.to_owned(),
        assignee: assignee?,
        action: action?,
        target,
        instructions: instructions?.to_owned(),
    })
}

fn validate_patch(
    content: &Map<String, Value>,
    violations: &mut Violations,
) -> Option<PatchMessage> {
    check_unknown_keys(content, &["file", "diff", "summary"], "content", violations);
    let file = required_non_empty(content, "file", "content", violations);
    let diff = required_min_len(content, "diff", "content", MIN_DIFF_LEN, violations);
    if let Some(diff) = diff
        && !DIFF_MARKERS.iter().any(|marker| diff.starts_with(marker))
    {
        violations.push("content.diff: does not start with a recognized unified diff marker");
    }
    let summary = required_non_empty(content, "summary", "content", violations);

    Some(PatchMessage {
        file: file?.to_owned(),
        diff: diff?.to_owned(),
        summary: summary?.to_owned(),
    })
}

fn validate_command(
    content: &Map<String, Value>,
    violations: &mut Violations,
) -> Option<CommandMessage> {
    check_unknown_keys(content, &["command", "reason", "risk"], "content", violations);
    let command = required_min_len(content, "command", "content", MIN_COMMAND_LEN, violations);
    let reason = required_non_empty(content, "reason", "content", violations);
    let risk = match content.get("risk") {
        Some(value) => parse_enum::<RiskLevel>(value, "content.risk", &RiskLevel::ALL, violations),
        None => {
            violations.push("content.risk: missing required field");
            None
        }
    };

    Some(CommandMessage {
        command: command?.to_owned(),
        reason: reason?.to_owned(),
        risk: risk?,
    })
}

fn validate_text(content: &Map<String, Value>, violations: &mut Violations) -> Option<TextMessage> {
    check_unknown_keys(content, &["text"], "content", violations);
    let text = required_non_empty(content, "text", "content", violations);
    Some(TextMessage {
        text: text?.to_owned(),
    })
}

fn check_unknown_keys(
    object: &Map<String, Value>,
    allowed: &[&str],
    path: &str,
    violations: &mut Violations,
) {
    for key in object.keys() {
        if !allowed.contains(&key.as_str()) {
            violations.push(format!("{path}.{key}: unexpected field"));
        }
    }
}

fn required_str<'a>(
    object: &'a Map<String, Value>,
    field: &str,
    path: &str,
    violations: &mut Violations,
) -> Option<&'a str> {
    match object.get(field) {
        Some(Value::String(value)) => Some(value),
        Some(_) => {
            violations.push(format!("{path}.{field}: expected a string"));
            None
        }
        None => {
            violations.push(format!("{path}.{field}: missing required field"));
            None
        }
    }
}

fn required_non_empty<'a>(
    object: &'a Map<String, Value>,
    field: &str,
    path: &str,
    violations: &mut Violations,
) -> Option<&'a str> {
    let value = required_str(object, field, path, violations)?;
    if value.trim().is_empty() {
        violations.push(format!("{path}.{field}: must be non-empty"));
        return None;
    }
    Some(value)
}

fn required_min_len<'a>(
    object: &'a Map<String, Value>,
    field: &str,
    path: &str,
    min_len: usize,
    violations: &mut Violations,
) -> Option<&'a str> {
    let value = required_non_empty(object, field, path, violations)?;
    if value.len() < min_len {
        violations.push(format!(
            "{path}.{field}: shorter than minimum length {min_len}"
        ));
        return None;
    }
    Some(value)
}

fn parse_enum<T: serde::de::DeserializeOwned>(
    value: &Value,
    path: &str,
    expected: &[&str],
    violations: &mut Violations,
) -> Option<T> {
    match serde_json::from_value::<T>(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            violations.push(format!("{path}: expected one of {}", expected.join(", ")));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema_violations(raw: &Value) -> Vec<String> {
        match validate_message(raw) {
            Err(MarshalError::SchemaViolation { violations }) => violations,
            other => panic!("expected schema violation, got {other:?}"),
        }
    }

    #[test]
    fn valid_command_message_produces_typed_message() {
        let raw = json!({
            "role": "engineer",
            "kind": "command",
            "content": {
                "command": "pip install pandas",
                "reason": "CSV parsing",
                "risk": "low"
            }
        });
        let message = validate_message(&raw).unwrap();
        assert_eq!(message.role, Some(Role::Engineer));
        match message.body {
            MessageBody::Command(command) => {
                assert_eq!(command.command, "pip install pandas");
                assert_eq!(command.risk, RiskLevel::Low);
            }
            other => panic!("expected command body, got {other:?}"),
        }
    }

    #[test]
    fn patch_without_role_validates_structurally() {
        let raw = json!({
            "kind": "patch",
            "content": {
                "file": "../../etc/passwd",
                "diff": "--- a\n+++ b\n",
                "summary": "x"
            }
        });
        let message = validate_message(&raw).unwrap();
        assert_eq!(message.role, None);
        assert!(matches!(message.body, MessageBody::Patch(_)));
    }

    #[test]
    fn unknown_kind_names_the_discriminator() {
        let raw = json!({
            "kind": "execute_now",
            "content": {}
        });
        let violations = schema_violations(&raw);
        assert!(
            violations
                .iter()
                .any(|v| v.contains("unrecognized message kind `execute_now`")),
            "{violations:?}"
        );
    }

    #[test]
    fn missing_fields_never_yield_a_typed_message() {
        let raw = json!({
            "kind": "command",
            "content": { "command": "ls" }
        });
        let violations = schema_violations(&raw);
        assert!(violations.iter().any(|v| v.contains("content.reason")));
        assert!(violations.iter().any(|v| v.contains("content.risk")));
    }

    #[test]
    fn all_violations_are_reported_together() {
        let raw = json!({
            "role": "intruder",
            "kind": "command",
            "smuggled": true,
            "content": {
                "command": "x",
                "reason": "",
                "risk": "catastrophic"
            }
        });
        let violations = schema_violations(&raw);
        assert!(violations.iter().any(|v| v.contains("message.role")));
        assert!(violations.iter().any(|v| v.contains("message.smuggled: unexpected field")));
        assert!(violations.iter().any(|v| v.contains("shorter than minimum length")));
        assert!(violations.iter().any(|v| v.contains("content.reason: must be non-empty")));
        assert!(violations.iter().any(|v| v.contains("content.risk: expected one of")));
    }

    #[test]
    fn extra_content_fields_are_rejected() {
        let raw = json!({
            "kind": "text",
            "content": { "text": "hello", "payload": "rm -rf /" }
        });
        let violations = schema_violations(&raw);
        assert_eq!(violations, vec!["content.payload: unexpected field".to_owned()]);
    }

    #[test]
    fn diff_must_look_like_a_unified_diff() {
        let raw = json!({
            "kind": "patch",
            "content": {
                "file": "src/lib.rs",
                "diff": "just replace everything please",
                "summary": "rewrite"
            }
        });
        let violations = schema_violations(&raw);
        assert!(
            violations
                .iter()
                .any(|v| v.contains("recognized unified diff marker"))
        );
    }

    #[test]
    fn plan_with_duplicate_task_ids_is_rejected() {
        let raw = json!({
            "role": "architect",
            "kind": "plan",
            "content": {
                "goal": "refactor storage",
                "tasks": [
                    {
                        "id": "t1",
                        "assignee": "engineer",
                        "action": "modify",
                        "target": "src/store.rs",
                        "instructions": "split the store module"
                    },
                    {
                        "id": "t1",
                        "assignee": "reviewer",
                        "action": "review",
                        "instructions": "review the split module"
                    }
                ]
            }
        });
        let violations = schema_violations(&raw);
        assert!(violations.iter().any(|v| v.contains("duplicate task id `t1`")));
    }

    #[test]
    fn valid_plan_validates() {
        let raw = json!({
            "role": "architect",
            "kind": "plan",
            "content": {
                "goal": "refactor storage",
                "tasks": [
                    {
                        "id": "t1",
                        "assignee": "engineer",
                        "action": "modify",
                        "target": "src/store.rs",
                        "instructions": "split the store module"
                    }
                ]
            }
        });
        let message = validate_message(&raw).unwrap();
        match message.body {
            MessageBody::Plan(plan) => {
                assert_eq!(plan.tasks.len(), 1);
                assert_eq!(plan.tasks[0].assignee, Role::Engineer);
                assert_eq!(plan.tasks[0].action, ActionTag::Modify);
            }
            other => panic!("expected plan body, got {other:?}"),
        }
    }

    #[test]
    fn plan_requires_at_least_one_task() {
        let raw = json!({
            "kind": "plan",
            "content": { "goal": "do nothing", "tasks": [] }
        });
        let violations = schema_violations(&raw);
        assert!(violations.iter().any(|v| v.contains("at least one task")));
    }

    #[test]
    fn non_object_input_is_rejected() {
        let violations = schema_violations(&json!("just a string"));
        assert_eq!(violations, vec!["message: expected a JSON object".to_owned()]);
    }

    #[test]
    fn short_instructions_are_rejected() {
        let raw = json!({
            "kind": "plan",
            "content": {
                "goal": "quick fix",
                "tasks": [{
                    "id": "t1",
                    "assignee": "engineer",
                    "action": "modify",
                    "instructions": "fix"
                }]
            }
        });
        let violations = schema_violations(&raw);
        assert!(
            violations
                .iter()
                .any(|v| v.contains("content.tasks[0].instructions: shorter than minimum length"))
        );
    }
}
