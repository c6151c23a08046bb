use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskData {
    #[serde(rename = "titel", alias = "title")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "teilaufgaben")]
    pub subtasks: Vec<Subtask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<TaskMeta>,
}

/// A sub-task with its solution path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    #[serde(rename = "frage")]
    pub question: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub title: String,
    /// The general formula, as math source.
    pub origin: String,
    /// The formula applied to this problem, as math source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMeta {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    /// Minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug)]
pub enum ImportError {
    Empty,
    Syntax(serde_json::Error),
    MissingTitle,
    MissingSubtasks,
    Shape(serde_json::Error),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Empty => write!(f, "input is empty"),
            ImportError::Syntax(e) => write!(f, "invalid JSON: {}", e),
            ImportError::MissingTitle => write!(f, "task needs a 'titel' field"),
            ImportError::MissingSubtasks => write!(f, "task needs a 'teilaufgaben' array"),
            ImportError::Shape(e) => write!(f, "malformed task record: {}", e),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Syntax(e) | ImportError::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl TaskData {
    /// Parse and validate a task record.
    pub fn from_json(input: &str) -> Result<Self, ImportError> {
        if input.trim().is_empty() {
            return Err(ImportError::Empty);
        }

        let value: Value = serde_json::from_str(input).map_err(ImportError::Syntax)?;

        let has_title = ["titel", "title"].iter().any(|key| {
            value
                .get(key)
                .and_then(Value::as_str)
                .is_some_and(|title| !title.is_empty())
        });
        if !has_title {
            return Err(ImportError::MissingTitle);
        }
        if !value.get("teilaufgaben").is_some_and(Value::is_array) {
            return Err(ImportError::MissingSubtasks);
        }

        serde_json::from_value(normalize_title(value)).map_err(ImportError::Shape)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Every annotated string in document order.
    pub fn annotated_texts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.title.as_str())
            .chain(self.description.as_deref())
            .chain(self.subtasks.iter().flat_map(|subtask| {
                std::iter::once(subtask.question.as_str()).chain(
                    subtask
                        .steps
                        .iter()
                        .flat_map(|step| [step.title.as_str(), step.explanation.as_str()]),
                )
            }))
    }
}

/// An empty `titel` next to a usable `title` would otherwise shadow it.
fn normalize_title(mut value: Value) -> Value {
    if let Some(object) = value.as_object_mut() {
        let titel_empty = object
            .get("titel")
            .and_then(Value::as_str)
            .is_none_or(str::is_empty);
        if titel_empty {
            if let Some(title) = object.remove("title") {
                object.insert("titel".to_string(), title);
            }
        } else {
            object.remove("title");
        }
    }
    value
}
