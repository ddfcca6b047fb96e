//! Gemini REST client
//!
//! Implements both [`Planner`] and [`AiCapability`] over the
//! `generateContent` endpoint. The API key comes from configuration or the
//! `GEMINI_API_KEY` environment variable.

use super::{extract_json, AiCapability, Planner, RecoveryRequest, Suggestion};
use crate::action::{ActionKind, Plan};
use crate::error::{Error, ErrorCode, Result};
use crate::screen::{encode_png, Screenshot};
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Default model for Gemini provider
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";

const ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiClient {
    api_key: String,
    model: String,
    http: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::new(ErrorCode::Unknown, format!("http client: {}", e)))?;
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            http,
        })
    }

    /// Client keyed from `GEMINI_API_KEY`, if set.
    pub fn from_env(timeout: Duration) -> Option<Result<Self>> {
        let key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
        Some(Self::new(key, DEFAULT_MODEL, timeout))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, parts: Vec<Value>) -> Result<String> {
        let url = format!("{}/{}:generateContent", ENDPOINT, self.model);
        let body = json!({
            "contents": [{"role": "user", "parts": parts}],
            "generationConfig": {"temperature": 0.2}
        });

        let resp = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    Error::new(ErrorCode::Timeout, format!("Gemini request timed out: {}", e))
                } else {
                    Error::interaction("gemini request", e)
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().unwrap_or_default();
            return Err(Error::interaction(
                "gemini request",
                format!("HTTP {}: {}", status, truncate(&detail, 300)),
            ));
        }

        let parsed: GenerateResponse = resp
            .json()
            .map_err(|e| Error::interaction("gemini response", e))?;
        let text: String = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            return Err(Error::interaction("gemini response", "empty completion"));
        }
        debug!(chars = text.len(), "gemini completion");
        Ok(text)
    }

    fn generate_text(&self, prompt: String) -> Result<String> {
        self.generate(vec![json!({ "text": prompt })])
    }
}

impl Planner for GeminiClient {
    fn generate_plan(&self, instruction: &str) -> Result<Plan> {
        let text = self
            .generate_text(plan_prompt(instruction))
            .map_err(|e| Error::planner(e.message))?;
        let value = extract_json(&text)
            .ok_or_else(|| Error::planner("planner reply contained no JSON"))?;
        let plan = Plan::from_value(&value)?;
        if plan.is_empty() {
            return Err(Error::planner("planner returned an empty plan"));
        }
        Ok(plan)
    }
}

impl AiCapability for GeminiClient {
    fn is_available(&self) -> bool {
        true
    }

    fn analyze_screen(&self, prompt: &str, screen: &Screenshot) -> Result<Value> {
        let png = encode_png(screen)?;
        let data = base64::engine::general_purpose::STANDARD.encode(png);
        let text = self.generate(vec![
            json!({ "text": analysis_prompt(prompt) }),
            json!({ "inline_data": { "mime_type": "image/png", "data": data } }),
        ])?;
        Ok(extract_json(&text).unwrap_or_else(|| json!({ "analysis": text })))
    }

    fn chat(&self, message: &str) -> Result<String> {
        self.generate_text(message.to_string())
    }

    fn suggest_recovery(&self, request: &RecoveryRequest) -> Result<Vec<Suggestion>> {
        let text = self.generate_text(recovery_prompt(request))?;
        let value = extract_json(&text)
            .ok_or_else(|| Error::interaction("recovery suggestions", "reply contained no JSON"))?;
        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut obj) => match obj.remove("suggestions") {
                Some(Value::Array(items)) => items,
                _ => vec![Value::Object(obj)],
            },
            _ => Vec::new(),
        };
        Ok(items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<Suggestion>(item) {
                Ok(s) => Some(s),
                Err(e) => {
                    warn!("ignoring malformed suggestion: {}", e);
                    None
                }
            })
            .collect())
    }
}

fn plan_prompt(instruction: &str) -> String {
    let kinds = ActionKind::ALL
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "You are a computer automation assistant. Convert the user's request into a JSON \
         object with a \"steps\" array. Each step is an object with an \"action\" field and \
         its parameters at the same level.\n\
         Available actions: {kinds}.\n\
         Parameters: click_desktop_coordinates(x, y), type_text(text), press_key(key), \
         wait_seconds(seconds), open_application(application), take_screenshot(filename), \
         drag_and_drop(from_x, from_y, to_x, to_y), navigate_url(url), search_google(query), \
         click_element(target: CSS selector), extract_text(target), \
         start_workflow_recording(name), replay_workflow(file, speed), analyze_screen(prompt), \
         chat_with_ai(message), scrape_website(url, description).\n\
         Return ONLY valid JSON.\n\nRequest: {instruction}"
    )
}

fn analysis_prompt(prompt: &str) -> String {
    format!(
        "{prompt}\n\nAnalyze this screenshot and return JSON with the keys \
         \"applications_detected\", \"interface_state\", \"suggested_actions\", \
         \"clickable_elements\" and \"automation_opportunities\"."
    )
}

fn recovery_prompt(request: &RecoveryRequest) -> String {
    let step = serde_json::to_string_pretty(&request.action).unwrap_or_default();
    let screen = serde_json::to_string_pretty(&request.screen).unwrap_or_default();
    format!(
        "An automation step has failed. Suggest {n} alternative approaches to accomplish the \
         same goal.\n\nFailed step: {step}\nError: {error}\nScreen analysis: {screen}\n\n\
         Return a JSON array of objects with \"approach\", \"action\", \"parameters\" and \
         \"confidence\" (0 to 1). Only use the actions click_desktop_coordinates, type_text, \
         press_key, wait_seconds, navigate_url and click_element.",
        n = request.max_suggestions,
        error = request.error,
    )
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
