//! Core types for the todo reporter
//!
//! This module defines the context that travels with every recorded todo and
//! the errors surfaced to callers of [`crate::Todos::record`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Timestamp type used for due dates
pub type Timestamp = DateTime<Utc>;

/// Result type for todo operations
pub type Result<T> = std::result::Result<T, TodoError>;

/// What to do when a todo is recorded after its due date
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DueDateBehaviour {
    /// Do not check the due date at all
    #[default]
    Ignore,
    /// Log a warning and run the callback anyway
    Warn,
    /// Refuse to run the callback
    Error,
}

impl std::str::FromStr for DueDateBehaviour {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        // Same spelling as the serialized form
        match s {
            "ignore" => Ok(Self::Ignore),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!(
                "unknown due date behaviour '{other}' (expected ignore, warn or error)"
            )),
        }
    }
}

/// JSON names of the typed context fields
pub const RESERVED_KEYS: [&str; 3] = ["todo", "dueDate", "dueDateBehaviour"];

/// Context attached to a recorded todo
///
/// `todo` is the only required field. Any additional keys supplied by the
/// caller are kept in `extra` and are serialized inline next to the known
/// fields, so a report body looks like `{"todo":"...","team":"core"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoContext {
    /// Human-readable description of the pending work
    pub todo: String,

    /// When the todo is due
    #[serde(rename = "dueDate", default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Timestamp>,

    /// Policy applied once the due date has passed (absent means ignore)
    #[serde(
        rename = "dueDateBehaviour",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date_behaviour: Option<DueDateBehaviour>,

    /// Arbitrary caller-supplied fields (never holds [`RESERVED_KEYS`] when
    /// filled through [`TodoContext::insert`])
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TodoContext {
    /// Create a context with just a description
    pub fn new(todo: impl Into<String>) -> Self {
        Self {
            todo: todo.into(),
            due_date: None,
            due_date_behaviour: None,
            extra: Map::new(),
        }
    }

    /// Builder method: set the due date
    pub fn with_due_date(mut self, due_date: Timestamp) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Builder method: set the overdue policy
    pub fn with_behaviour(mut self, behaviour: DueDateBehaviour) -> Self {
        self.due_date_behaviour = Some(behaviour);
        self
    }

    /// Builder method: attach an extra field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a field, replacing any previous value under the same key
    ///
    /// The reserved keys `todo`, `dueDate` and `dueDateBehaviour` go to their
    /// typed fields and never into `extra`. A non-string `todo` is stored as
    /// its JSON text; a `dueDate` or `dueDateBehaviour` value that does not
    /// parse is logged and dropped, leaving the field unchanged. `null`
    /// clears the optional fields.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match key.as_str() {
            "todo" => {
                self.todo = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                }
            }
            "dueDate" => match serde_json::from_value(value) {
                Ok(due_date) => self.due_date = due_date,
                Err(e) => log::warn!("Ignoring invalid dueDate for '{}': {}", self.todo, e),
            },
            "dueDateBehaviour" => match serde_json::from_value(value) {
                Ok(behaviour) => self.due_date_behaviour = behaviour,
                Err(e) => log::warn!(
                    "Ignoring invalid dueDateBehaviour for '{}': {}",
                    self.todo,
                    e
                ),
            },
            _ => {
                self.extra.insert(key, value);
            }
        }
    }

    /// Move reserved keys written straight into `extra` to their typed fields
    pub fn normalize(&mut self) {
        for key in RESERVED_KEYS {
            if let Some(value) = self.extra.remove(key) {
                self.insert(key, value);
            }
        }
    }

    /// Look up an extra field
    ///
    /// Only searches `extra`; reserved keys live in typed fields, see
    /// [`TodoContext::field`].
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Look up any field by its JSON name, reserved keys included
    pub fn field(&self, key: &str) -> Option<Value> {
        match key {
            "todo" => Some(Value::from(self.todo.clone())),
            "dueDate" => self.due_date.map(|d| Value::from(d.to_rfc3339())),
            "dueDateBehaviour" => self
                .due_date_behaviour
                .and_then(|b| serde_json::to_value(b).ok()),
            _ => self.extra.get(key).cloned(),
        }
    }

    /// Effective overdue policy (absent means ignore)
    pub fn behaviour(&self) -> DueDateBehaviour {
        self.due_date_behaviour.unwrap_or_default()
    }

    /// Message used for both the overdue error and the overdue warning
    pub fn overdue_message(&self) -> String {
        format!("{} is overdue", self.todo)
    }
}

/// Errors returned synchronously by [`crate::Todos::record`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TodoError {
    #[error("init function not called")]
    Uninitialized,

    #[error("{todo} is overdue")]
    Overdue { todo: String },
}

/// Failures inside the reporting path
///
/// These never reach the caller of `record`; the reporter logs them and
/// counts the report as undelivered.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("HTTP delivery failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP client unavailable: {0}")]
    ClientUnavailable(String),

    #[error("middleware panicked: {0}")]
    Middleware(String),

    #[error("call function failed: {0}")]
    CallFunction(String),
}

/// Render a panic payload as text
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
