//! The action model
//!
//! A plan is a list of steps shaped like
//! `{"action": "click_desktop_coordinates", "x": 50, "y": 220}`.
//! Parameters may also be nested under `"parameters"`, which is how recovery
//! suggestions arrive. Unknown kinds never abort parsing: they become
//! [`PlanStep::Rejected`] and fail when the executor reaches them.

use crate::error::{Error, ErrorCode, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One atomic UI operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    // desktop
    #[serde(rename = "click_desktop_coordinates")]
    ClickCoordinates { x: i32, y: i32 },
    TypeText { text: String },
    PressKey { key: String },
    WaitSeconds {
        #[serde(default = "default_wait")]
        seconds: f64,
    },
    OpenApplication { application: String },
    TakeScreenshot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
    DragAndDrop {
        from_x: i32,
        from_y: i32,
        to_x: i32,
        to_y: i32,
    },

    // browser
    NavigateUrl { url: String },
    SearchGoogle { query: String },
    ClickFirstResult {},
    ClickElement { target: String },
    ExtractText {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },

    // recording
    #[serde(rename = "start_workflow_recording")]
    StartRecording {
        #[serde(default = "default_recording_name")]
        name: String,
    },
    #[serde(rename = "stop_workflow_recording")]
    StopRecording {},
    ReplayWorkflow {
        file: String,
        #[serde(default = "default_speed")]
        speed: f64,
    },

    // ai
    AnalyzeScreen {
        #[serde(default = "default_prompt")]
        prompt: String,
    },
    #[serde(rename = "chat_with_ai")]
    ChatWithAi { message: String },
    ScrapeWebsite {
        url: String,
        #[serde(default = "default_scrape_description")]
        description: String,
    },
}

fn default_wait() -> f64 {
    3.0
}

fn default_recording_name() -> String {
    "untitled".to_string()
}

fn default_speed() -> f64 {
    1.0
}

fn default_prompt() -> String {
    "Analyze this screen".to_string()
}

fn default_scrape_description() -> String {
    "Extract all relevant data".to_string()
}

/// Which collaborator an action is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Desktop,
    Browser,
    Recording,
    Ai,
}

/// Discriminant of [`Action`], usable without the parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    #[serde(rename = "click_desktop_coordinates")]
    ClickCoordinates,
    TypeText,
    PressKey,
    WaitSeconds,
    OpenApplication,
    TakeScreenshot,
    DragAndDrop,
    NavigateUrl,
    SearchGoogle,
    ClickFirstResult,
    ClickElement,
    ExtractText,
    #[serde(rename = "start_workflow_recording")]
    StartRecording,
    #[serde(rename = "stop_workflow_recording")]
    StopRecording,
    ReplayWorkflow,
    AnalyzeScreen,
    #[serde(rename = "chat_with_ai")]
    ChatWithAi,
    ScrapeWebsite,
}

impl ActionKind {
    pub const ALL: [ActionKind; 18] = [
        ActionKind::ClickCoordinates,
        ActionKind::TypeText,
        ActionKind::PressKey,
        ActionKind::WaitSeconds,
        ActionKind::OpenApplication,
        ActionKind::TakeScreenshot,
        ActionKind::DragAndDrop,
        ActionKind::NavigateUrl,
        ActionKind::SearchGoogle,
        ActionKind::ClickFirstResult,
        ActionKind::ClickElement,
        ActionKind::ExtractText,
        ActionKind::StartRecording,
        ActionKind::StopRecording,
        ActionKind::ReplayWorkflow,
        ActionKind::AnalyzeScreen,
        ActionKind::ChatWithAi,
        ActionKind::ScrapeWebsite,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::ClickCoordinates => "click_desktop_coordinates",
            ActionKind::TypeText => "type_text",
            ActionKind::PressKey => "press_key",
            ActionKind::WaitSeconds => "wait_seconds",
            ActionKind::OpenApplication => "open_application",
            ActionKind::TakeScreenshot => "take_screenshot",
            ActionKind::DragAndDrop => "drag_and_drop",
            ActionKind::NavigateUrl => "navigate_url",
            ActionKind::SearchGoogle => "search_google",
            ActionKind::ClickFirstResult => "click_first_result",
            ActionKind::ClickElement => "click_element",
            ActionKind::ExtractText => "extract_text",
            ActionKind::StartRecording => "start_workflow_recording",
            ActionKind::StopRecording => "stop_workflow_recording",
            ActionKind::ReplayWorkflow => "replay_workflow",
            ActionKind::AnalyzeScreen => "analyze_screen",
            ActionKind::ChatWithAi => "chat_with_ai",
            ActionKind::ScrapeWebsite => "scrape_website",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == s)
    }

    pub fn family(self) -> Family {
        use ActionKind::*;
        match self {
            ClickCoordinates | TypeText | PressKey | WaitSeconds | OpenApplication
            | TakeScreenshot | DragAndDrop => Family::Desktop,
            NavigateUrl | SearchGoogle | ClickFirstResult | ClickElement | ExtractText => {
                Family::Browser
            }
            StartRecording | StopRecording | ReplayWorkflow => Family::Recording,
            AnalyzeScreen | ChatWithAi | ScrapeWebsite => Family::Ai,
        }
    }

    /// Pointer clicks and text entry get the larger retry budget.
    pub fn is_interactive(self) -> bool {
        matches!(
            self,
            ActionKind::ClickCoordinates | ActionKind::ClickElement | ActionKind::TypeText
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::ClickCoordinates { .. } => ActionKind::ClickCoordinates,
            Action::TypeText { .. } => ActionKind::TypeText,
            Action::PressKey { .. } => ActionKind::PressKey,
            Action::WaitSeconds { .. } => ActionKind::WaitSeconds,
            Action::OpenApplication { .. } => ActionKind::OpenApplication,
            Action::TakeScreenshot { .. } => ActionKind::TakeScreenshot,
            Action::DragAndDrop { .. } => ActionKind::DragAndDrop,
            Action::NavigateUrl { .. } => ActionKind::NavigateUrl,
            Action::SearchGoogle { .. } => ActionKind::SearchGoogle,
            Action::ClickFirstResult {} => ActionKind::ClickFirstResult,
            Action::ClickElement { .. } => ActionKind::ClickElement,
            Action::ExtractText { .. } => ActionKind::ExtractText,
            Action::StartRecording { .. } => ActionKind::StartRecording,
            Action::StopRecording {} => ActionKind::StopRecording,
            Action::ReplayWorkflow { .. } => ActionKind::ReplayWorkflow,
            Action::AnalyzeScreen { .. } => ActionKind::AnalyzeScreen,
            Action::ChatWithAi { .. } => ActionKind::ChatWithAi,
            Action::ScrapeWebsite { .. } => ActionKind::ScrapeWebsite,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.kind().is_interactive()
    }

    /// Parse a single step, flat or with nested `parameters`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::invalid_action("step", "expected a JSON object"))?;
        let kind = obj
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::invalid_action("step", "missing \"action\" field"))?;
        let params = obj.get("parameters").and_then(Value::as_object);
        let mut flat = Map::new();
        for (k, v) in obj.iter().filter(|(k, _)| k.as_str() != "parameters") {
            flat.insert(k.clone(), v.clone());
        }
        if let Some(params) = params {
            for (k, v) in params {
                flat.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        Self::from_parts(kind, flat)
    }

    /// Build an action from a kind name and its parameter map.
    pub fn from_parts(kind: &str, mut params: Map<String, Value>) -> Result<Self> {
        if ActionKind::parse(kind).is_none() {
            return Err(Error::unknown_action(kind));
        }
        params.insert("action".to_string(), Value::String(kind.to_string()));
        serde_json::from_value(Value::Object(params)).map_err(|e| Error::invalid_action(kind, e))
    }

    /// Short human description for logs.
    pub fn describe(&self) -> String {
        match self {
            Action::ClickCoordinates { x, y } => format!("click at ({}, {})", x, y),
            Action::TypeText { text } => format!("type {:?}", truncate(text, 40)),
            Action::PressKey { key } => format!("press {}", key),
            Action::WaitSeconds { seconds } => format!("wait {}s", seconds),
            Action::OpenApplication { application } => format!("open {}", application),
            Action::TakeScreenshot { filename } => match filename {
                Some(f) => format!("screenshot to {}", f),
                None => "screenshot".to_string(),
            },
            Action::DragAndDrop { from_x, from_y, to_x, to_y } => {
                format!("drag ({}, {}) -> ({}, {})", from_x, from_y, to_x, to_y)
            }
            Action::NavigateUrl { url } => format!("navigate to {}", url),
            Action::SearchGoogle { query } => format!("search {:?}", truncate(query, 40)),
            Action::ClickFirstResult {} => "click first search result".to_string(),
            Action::ClickElement { target } => format!("click element {}", target),
            Action::ExtractText { target } => match target {
                Some(t) => format!("extract text from {}", t),
                None => "extract page text".to_string(),
            },
            Action::StartRecording { name } => format!("start recording {:?}", name),
            Action::StopRecording {} => "stop recording".to_string(),
            Action::ReplayWorkflow { file, speed } => format!("replay {} at {}x", file, speed),
            Action::AnalyzeScreen { .. } => "analyze screen".to_string(),
            Action::ChatWithAi { message } => format!("chat {:?}", truncate(message, 40)),
            Action::ScrapeWebsite { url, .. } => format!("scrape {}", url),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
        out.push_str("...");
        out
    }
}

// ============================================================================
// Plans
// ============================================================================

/// A step as it came from the planner: ready to run, or rejected at parse time.
#[derive(Debug, Clone)]
pub enum PlanStep {
    Ready(Action),
    Rejected { kind: String, error: Error },
}

impl PlanStep {
    pub fn kind_name(&self) -> &str {
        match self {
            PlanStep::Ready(action) => action.kind().as_str(),
            PlanStep::Rejected { kind, .. } => kind,
        }
    }
}

impl From<Action> for PlanStep {
    fn from(action: Action) -> Self {
        PlanStep::Ready(action)
    }
}

/// Ordered list of steps produced by a planner.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        Self {
            steps: actions.into_iter().map(PlanStep::Ready).collect(),
        }
    }

    /// Parse `{"steps": [...]}` or a bare array. Individual bad steps are
    /// kept as rejected steps; only a malformed envelope is an error.
    pub fn from_value(value: &Value) -> Result<Self> {
        let steps = match value {
            Value::Array(items) => items,
            Value::Object(obj) => obj
                .get("steps")
                .and_then(Value::as_array)
                .ok_or_else(|| Error::planner("plan has no \"steps\" array"))?,
            _ => return Err(Error::planner("plan must be an object or an array")),
        };

        let steps = steps
            .iter()
            .map(|raw| match Action::from_value(raw) {
                Ok(action) => PlanStep::Ready(action),
                Err(error) => PlanStep::Rejected {
                    kind: raw
                        .get("action")
                        .and_then(Value::as_str)
                        .unwrap_or("<missing>")
                        .to_string(),
                    error,
                },
            })
            .collect();
        Ok(Self { steps })
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::new(ErrorCode::PlannerFailure, format!("plan is not JSON: {}", e)))?;
        Self::from_value(&value)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_flat_step() {
        let a = Action::from_value(&json!({"action": "click_desktop_coordinates", "x": 50, "y": 220}))
            .unwrap();
        assert_eq!(a, Action::ClickCoordinates { x: 50, y: 220 });
        assert!(a.is_interactive());
    }

    #[test]
    fn parse_nested_parameters() {
        let a = Action::from_value(&json!({"action": "type_text", "parameters": {"text": "hi"}}))
            .unwrap();
        assert_eq!(a, Action::TypeText { text: "hi".into() });
    }

    #[test]
    fn parse_defaults() {
        let a = Action::from_value(&json!({"action": "wait_seconds"})).unwrap();
        assert_eq!(a, Action::WaitSeconds { seconds: 3.0 });
        let a = Action::from_value(&json!({"action": "stop_workflow_recording"})).unwrap();
        assert_eq!(a, Action::StopRecording {});
        let a = Action::from_value(&json!({"action": "replay_workflow", "file": "w.json"})).unwrap();
        assert_eq!(a, Action::ReplayWorkflow { file: "w.json".into(), speed: 1.0 });
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let e = Action::from_value(&json!({"action": "teleport"})).unwrap_err();
        assert_eq!(e.code, ErrorCode::UnknownAction);
    }

    #[test]
    fn missing_param_is_invalid() {
        let e = Action::from_value(&json!({"action": "navigate_url"})).unwrap_err();
        assert_eq!(e.code, ErrorCode::InvalidAction);
    }

    #[test]
    fn plan_keeps_rejected_steps() {
        let plan = Plan::from_value(&json!({"steps": [
            {"action": "press_key", "key": "Enter"},
            {"action": "levitate"},
            {"action": "wait_seconds", "seconds": 1}
        ]}))
        .unwrap();
        assert_eq!(plan.len(), 3);
        assert!(matches!(plan.steps[1], PlanStep::Rejected { ref kind, .. } if kind == "levitate"));
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::parse(kind.as_str()), Some(kind));
            let v = serde_json::to_value(kind).unwrap();
            assert_eq!(v, kind.as_str());
        }
    }

    #[test]
    fn only_clicks_and_typing_are_interactive() {
        let interactive: Vec<_> = ActionKind::ALL
            .into_iter()
            .filter(|k| k.is_interactive())
            .collect();
        assert_eq!(
            interactive,
            vec![ActionKind::ClickCoordinates, ActionKind::ClickElement, ActionKind::TypeText]
        );
    }

    #[test]
    fn serializes_flat() {
        let v = serde_json::to_value(Action::NavigateUrl { url: "https://a.b".into() }).unwrap();
        assert_eq!(v, json!({"action": "navigate_url", "url": "https://a.b"}));
    }
}
