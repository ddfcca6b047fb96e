//! Structured errors, serialisable for JSON reports

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("[{code:?}] {message}")]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    /// Plan position of the action that produced this error, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_index: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    PlannerFailure,
    UnknownAction,
    InvalidAction,
    InteractionFailure,
    Timeout,
    PersistenceFailure,
    NotFound,
    Unsupported,
    Unknown,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            action_index: None,
            suggestions: Vec::new(),
            context: None,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Tag the error with the plan index of the failing action.
    pub fn at_step(mut self, index: usize) -> Self {
        self.action_index = Some(index);
        self
    }

    pub fn planner(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PlannerFailure, message)
    }

    pub fn unknown_action(kind: &str) -> Self {
        Self::new(
            ErrorCode::UnknownAction,
            format!("Unknown action kind: {}", kind),
        )
        .with_suggestions(vec![format!(
            "Use one of: {}",
            crate::action::ActionKind::ALL
                .iter()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )])
    }

    pub fn invalid_action(kind: &str, reason: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidAction,
            format!("Invalid parameters for {}: {}", kind, reason),
        )
    }

    pub fn interaction(action: &str, reason: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorCode::InteractionFailure,
            format!("{} failed: {}", action, reason),
        )
    }

    pub fn timeout(operation: &str, limit: Duration) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("Timeout after {}ms waiting for: {}", limit.as_millis(), operation),
        )
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PersistenceFailure, message)
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::NotFound, format!("Not found: {}", what))
    }

    pub fn unsupported(what: &str, feature: &str) -> Self {
        Self::new(
            ErrorCode::Unsupported,
            format!("{} is not available in this build", what),
        )
        .with_suggestions(vec![format!("Rebuild with `--features {}`", feature)])
    }

    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::Timeout
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Self::new(ErrorCode::Unknown, e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorCode::Unknown, e.to_string())
    }
}
