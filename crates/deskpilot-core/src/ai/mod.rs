//! Planner and AI capability collaborators
//!
//! Both are traits so the rest of the system never depends on a concrete
//! model API. Without an API key the session is built with [`NullAi`],
//! which reports itself unavailable and fails every call.

pub mod gemini;

use crate::action::{Action, Plan};
use crate::error::{Error, ErrorCode, Result};
use crate::screen::Screenshot;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use gemini::GeminiClient;

/// Turns a free-text instruction into a plan.
pub trait Planner: Send + Sync {
    fn generate_plan(&self, instruction: &str) -> Result<Plan>;
}

pub trait AiCapability: Send + Sync {
    /// False for the null object; recovery skips the AI fallback then.
    fn is_available(&self) -> bool;

    fn analyze_screen(&self, prompt: &str, screen: &Screenshot) -> Result<Value>;

    fn chat(&self, message: &str) -> Result<String>;

    fn suggest_recovery(&self, request: &RecoveryRequest) -> Result<Vec<Suggestion>>;
}

/// What the AI is told about a failed step.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryRequest {
    pub action: Action,
    pub error: String,
    pub screen: Value,
    pub max_suggestions: usize,
}

/// One alternative way to achieve a failed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(default)]
    pub approach: String,
    pub action: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub confidence: f64,
}

impl Suggestion {
    pub fn to_action(&self) -> Result<Action> {
        Action::from_parts(&self.action, self.parameters.clone())
    }
}

/// Stand-in used when no model is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAi;

impl NullAi {
    fn unavailable() -> Error {
        Error::new(ErrorCode::Unsupported, "AI capability is not configured")
            .with_suggestions(vec!["Set GEMINI_API_KEY or pass --api-key".to_string()])
    }
}

impl Planner for NullAi {
    fn generate_plan(&self, _instruction: &str) -> Result<Plan> {
        Err(Error::planner("No planner configured: set GEMINI_API_KEY or pass --api-key"))
    }
}

impl AiCapability for NullAi {
    fn is_available(&self) -> bool {
        false
    }

    fn analyze_screen(&self, _prompt: &str, _screen: &Screenshot) -> Result<Value> {
        Err(Self::unavailable())
    }

    fn chat(&self, _message: &str) -> Result<String> {
        Err(Self::unavailable())
    }

    fn suggest_recovery(&self, _request: &RecoveryRequest) -> Result<Vec<Suggestion>> {
        Err(Self::unavailable())
    }
}

/// Pull the first JSON object or array out of model output, tolerating
/// markdown fences and surrounding prose.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }
    let unfenced = trimmed
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    if let Ok(v) = serde_json::from_str::<Value>(unfenced) {
        return Some(v);
    }
    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (unfenced.find(open), unfenced.rfind(close)) {
            if start < end {
                if let Ok(v) = serde_json::from_str::<Value>(&unfenced[start..=end]) {
                    return Some(v);
                }
            }
        }
    }
    None
}
