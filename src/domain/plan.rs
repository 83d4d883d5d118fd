//! Change plan records produced by the planning collaborator.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Create,
    Modify,
    Move,
    Delete,
    ExtractAndModify,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Create => "CREATE",
            ActionType::Modify => "MODIFY",
            ActionType::Move => "MOVE",
            ActionType::Delete => "DELETE",
            ActionType::ExtractAndModify => "EXTRACT_AND_MODIFY",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared change, consumed once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeStep {
    pub action: ActionType,
    #[serde(alias = "file")]
    pub target_file: String,
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub detected_entities: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub impact: BTreeMap<String, JsonValue>,
}

impl ChangeStep {
    pub fn new(action: ActionType, target_file: impl Into<String>) -> Self {
        Self {
            action,
            target_file: normalize_plan_path(&target_file.into()),
            source_file: None,
            description: String::new(),
            detected_entities: Vec::new(),
            warnings: Vec::new(),
            impact: BTreeMap::new(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source_file = Some(normalize_plan_path(&source.into()));
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.detected_entities = entities.into_iter().map(Into::into).collect();
        self
    }

    fn normalize(&mut self) {
        self.target_file = normalize_plan_path(&self.target_file);
        if let Some(source) = self.source_file.as_mut() {
            *source = normalize_plan_path(source);
        }
    }
}

fn normalize_plan_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// An ordered list of change steps plus the task that produced them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub changes: Vec<ChangeStep>,
}

#[derive(Deserialize)]
struct NestedPlan {
    #[serde(default)]
    task: String,
    implementation_plan: Plan,
}

impl Plan {
    /// Parse a plan document. Accepts the flat `{task, changes}` shape and the
    /// planner's `{implementation_plan: {changes}}` envelope.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let raw: JsonValue = serde_json::from_str(text)?;
        let mut plan = if raw.get("implementation_plan").is_some() {
            let nested: NestedPlan = serde_json::from_value(raw)?;
            let mut plan = nested.implementation_plan;
            if plan.task.is_empty() {
                plan.task = nested.task;
            }
            plan
        } else {
            serde_json::from_value(raw)?
        };
        for step in &mut plan.changes {
            step.normalize();
        }
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_plan() {
        let plan = Plan::from_json(
            r#"{"task": "split utils", "changes": [
                {"action": "CREATE", "target_file": "pkg\\dates.py", "source_file": "pkg/utils.py",
                 "description": "move date helpers", "detected_entities": ["parse_date"]}
            ]}"#,
        )
        .expect("plan");
        assert_eq!(plan.task, "split utils");
        assert_eq!(plan.changes.len(), 1);
        let step = &plan.changes[0];
        assert_eq!(step.action, ActionType::Create);
        assert_eq!(step.target_file, "pkg/dates.py");
        assert_eq!(step.source_file.as_deref(), Some("pkg/utils.py"));
        assert_eq!(step.detected_entities, vec!["parse_date".to_string()]);
    }

    #[test]
    fn parses_nested_plan_with_file_alias() {
        let plan = Plan::from_json(
            r#"{"task": "t", "implementation_plan": {"changes": [
                {"action": "EXTRACT_AND_MODIFY", "file": "a.py", "source_file": "b.py"}
            ]}}"#,
        )
        .expect("plan");
        assert_eq!(plan.task, "t");
        assert_eq!(plan.changes[0].action, ActionType::ExtractAndModify);
        assert_eq!(plan.changes[0].target_file, "a.py");
        assert!(plan.changes[0].description.is_empty());
    }

    #[test]
    fn rejects_unknown_action() {
        let err = Plan::from_json(r#"{"changes": [{"action": "RENAME", "target_file": "a.py"}]}"#);
        assert!(err.is_err());
    }
}
