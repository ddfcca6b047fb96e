//! Step execution
//!
//! [`Executor::dispatch`] routes one action to its handler family. On top of
//! it [`Executor::execute`] applies the retry policy and, when the last
//! attempt fails, the recovery chain. [`Executor::execute_plan`] runs steps
//! in order and halts at the first failure.

use crate::config::Config;
use crate::recovery::{RecoveryChain, RecoveryContext, StrategyId};
use deskpilot_core::ai::extract_json;
use deskpilot_core::browser::{normalize_url, search_url};
use deskpilot_core::clock::{secs, Sleeper};
use deskpilot_core::deadline::run_with_deadline;
use deskpilot_core::keys::canonical_key;
use deskpilot_core::screen::save_png;
use deskpilot_core::{
    Action, AiCapability, BrowserManager, DesktopInput, Error, ErrorCode, MouseButton, Plan,
    PlanStep, Result, ScreenChangePolicy,
};
use deskpilot_recorder::{Replayer, StopOutcome, WorkflowRecorder};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

const FIRST_RESULT_SELECTOR: &str = "#search a h3";
const SCRAPE_TEXT_LIMIT: usize = 30_000;

/// The collaborators actions are dispatched to.
#[derive(Clone)]
pub struct Capabilities {
    pub desktop: Arc<dyn DesktopInput>,
    pub browser: Arc<BrowserManager>,
    pub ai: Arc<dyn AiCapability>,
    pub sleeper: Arc<dyn Sleeper>,
    pub screen_policy: Arc<dyn ScreenChangePolicy>,
}

/// What a handler produced.
#[derive(Debug, Default)]
pub struct Outcome {
    pub payload: Option<Value>,
}

impl Outcome {
    pub fn done() -> Self {
        Self::default()
    }

    pub fn with(payload: Value) -> Self {
        Self { payload: Some(payload) }
    }
}

/// Result of one step. Built once and never changed.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub index: usize,
    pub kind: String,
    pub succeeded: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovered_via: Option<StrategyId>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Error>,
}

impl ExecutionResult {
    fn success(index: usize, action: &Action, attempts: u32, outcome: Outcome) -> Self {
        Self {
            index,
            kind: action.kind().to_string(),
            succeeded: true,
            attempts,
            recovered_via: None,
            message: action.describe(),
            payload: outcome.payload,
            error: None,
        }
    }

    fn recovered(index: usize, action: &Action, attempts: u32, via: StrategyId) -> Self {
        Self {
            index,
            kind: action.kind().to_string(),
            succeeded: true,
            attempts,
            recovered_via: Some(via),
            message: format!("{} (recovered via {})", action.describe(), via),
            payload: None,
            error: None,
        }
    }

    fn failure(index: usize, kind: &str, attempts: u32, error: Error) -> Self {
        let error = error.at_step(index);
        Self {
            index,
            kind: kind.to_string(),
            succeeded: false,
            attempts,
            recovered_via: None,
            message: error.message.clone(),
            payload: None,
            error: Some(error),
        }
    }
}

/// Results of one run, in execution order. Append-only.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ExecutionLog {
    entries: Vec<ExecutionResult>,
}

impl ExecutionLog {
    fn push(&mut self, result: ExecutionResult) {
        self.entries.push(result);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExecutionResult> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&ExecutionResult> {
        self.entries.last()
    }

    pub fn as_slice(&self) -> &[ExecutionResult] {
        &self.entries
    }
}

impl<'a> IntoIterator for &'a ExecutionLog {
    type Item = &'a ExecutionResult;
    type IntoIter = std::slice::Iter<'a, ExecutionResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub steps_executed: usize,
    pub steps_total: usize,
    pub log: ExecutionLog,
    /// Index of the step that failed and stopped the plan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted_at: Option<usize>,
    /// The caller asked the run to stop before it finished.
    pub stopped: bool,
}

impl PlanReport {
    pub fn succeeded(&self) -> bool {
        self.halted_at.is_none() && !self.stopped
    }

    pub fn summary(&self) -> String {
        format!("Executed {} of {} steps", self.steps_executed, self.steps_total)
    }
}

/// Cooperative cancellation: checked before each step starts.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Executor {
    caps: Capabilities,
    recorder: Arc<WorkflowRecorder>,
    replayer: Replayer,
    recovery: RecoveryChain,
    config: Config,
}

impl Executor {
    pub fn new(caps: Capabilities, recorder: Arc<WorkflowRecorder>, config: Config) -> Self {
        let replayer = Replayer::new(caps.desktop.clone())
            .sleeper(caps.sleeper.clone())
            .settle(config.replay.settle)
            .max_gap(config.replay.max_gap);
        let recovery = RecoveryChain::standard(&config.recovery);
        Self { caps, recorder, replayer, recovery, config }
    }

    pub fn with_recovery(mut self, recovery: RecoveryChain) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub fn recorder(&self) -> &Arc<WorkflowRecorder> {
        &self.recorder
    }

    pub fn replayer(&self) -> &Replayer {
        &self.replayer
    }

    /// Run the plan in order, halting at the first failed step. The browser
    /// session is closed afterwards however the run ended.
    pub fn execute_plan(&self, plan: &Plan, stop: &StopHandle) -> PlanReport {
        let total = plan.len();
        let mut log = ExecutionLog::default();
        let mut halted_at = None;
        let mut stopped = false;

        for (index, step) in plan.steps.iter().enumerate() {
            if stop.is_stopped() {
                info!("stop requested, {} of {} steps not run", total - index, total);
                stopped = true;
                break;
            }
            info!("step {}/{}: {}", index + 1, total, step.kind_name());
            let result = self.execute_step(index, step);
            let failed = !result.succeeded;
            log.push(result);
            if failed {
                warn!("step {} failed, halting plan", index + 1);
                halted_at = Some(index);
                break;
            }
        }

        if let Err(e) = self.caps.browser.close() {
            warn!("failed to close browser: {}", e);
        }

        PlanReport {
            steps_executed: log.len(),
            steps_total: total,
            log,
            halted_at,
            stopped,
        }
    }

    pub fn execute_step(&self, index: usize, step: &PlanStep) -> ExecutionResult {
        match step {
            PlanStep::Ready(action) => self.execute(index, action),
            PlanStep::Rejected { kind, error } => {
                warn!("step {} rejected: {}", index + 1, error);
                ExecutionResult::failure(index, kind, 0, error.clone())
            }
        }
    }

    /// Dispatch with retries, then recovery if every attempt failed.
    pub fn execute(&self, index: usize, action: &Action) -> ExecutionResult {
        let allowed = self.config.retry.attempts_for(action.is_interactive());
        let mut attempts = 1;
        let error = loop {
            match self.dispatch(action) {
                Ok(outcome) => return ExecutionResult::success(index, action, attempts, outcome),
                Err(e) => {
                    warn!(
                        step = index + 1,
                        attempt = attempts,
                        "{} failed: {}",
                        action.describe(),
                        e
                    );
                    if attempts >= allowed {
                        break e;
                    }
                    self.caps.sleeper.sleep(self.config.retry.backoff);
                    attempts += 1;
                }
            }
        };

        let redo = |a: &Action| self.dispatch(a).map(|_| ());
        let cx = RecoveryContext {
            attempt_number: attempts,
            desktop: self.caps.desktop.as_ref(),
            browser: &self.caps.browser,
            ai: self.caps.ai.as_ref(),
            sleeper: self.caps.sleeper.as_ref(),
            screen_policy: self.caps.screen_policy.as_ref(),
            redo: &redo,
        };
        match self.recovery.recover(action, &error, &cx) {
            Some(via) => ExecutionResult::recovered(index, action, attempts, via),
            None => ExecutionResult::failure(index, action.kind().as_str(), attempts, error),
        }
    }

    /// One attempt at one action, no retry and no recovery.
    pub fn dispatch(&self, action: &Action) -> Result<Outcome> {
        debug!(action = %action.kind(), "dispatch");
        let settle = &self.config.settle;
        match action {
            // desktop
            Action::ClickCoordinates { x, y } => self.click_at(*x, *y),
            Action::TypeText { text } => {
                self.caps.desktop.type_text(text)?;
                self.caps.sleeper.sleep(settle.keyboard);
                Ok(Outcome::done())
            }
            Action::PressKey { key } => self.press_key(key),
            Action::WaitSeconds { seconds } => {
                self.caps.sleeper.sleep(secs(*seconds));
                Ok(Outcome::done())
            }
            Action::OpenApplication { application } => {
                self.caps.desktop.open_application(application)?;
                self.caps.sleeper.sleep(settle.launch);
                Ok(Outcome::done())
            }
            Action::TakeScreenshot { filename } => self.take_screenshot(filename.as_deref()),
            Action::DragAndDrop { from_x, from_y, to_x, to_y } => {
                self.caps.desktop.drag((*from_x, *from_y), (*to_x, *to_y))?;
                self.caps.sleeper.sleep(settle.pointer);
                Ok(Outcome::done())
            }

            // browser
            Action::NavigateUrl { url } => self.navigate(&normalize_url(url)),
            Action::SearchGoogle { query } => self.navigate(&search_url(query)?),
            Action::ClickFirstResult {} => {
                self.caps.browser.with_session(|s| s.click(FIRST_RESULT_SELECTOR))?;
                self.caps.sleeper.sleep(settle.page);
                Ok(Outcome::done())
            }
            Action::ClickElement { target } => {
                self.caps.browser.with_session(|s| s.click(target))?;
                self.caps.sleeper.sleep(settle.pointer);
                Ok(Outcome::done())
            }
            Action::ExtractText { target } => {
                let text = self
                    .caps
                    .browser
                    .with_session(|s| s.extract_text(target.as_deref()))?;
                Ok(Outcome::with(json!({ "text": text })))
            }

            // recording
            Action::StartRecording { name } => {
                self.recorder.start(name.clone())?;
                Ok(Outcome::with(json!({ "name": name })))
            }
            // As a plan step, a stop that saves nothing is a failed step.
            Action::StopRecording {} => match self.recorder.stop()? {
                StopOutcome::NotRecording => Err(Error::not_found("active recording")),
                StopOutcome::Empty => Err(Error::new(
                    ErrorCode::NotFound,
                    "Nothing was recorded, no workflow saved",
                )),
                saved => Ok(Outcome::with(to_payload(&saved)?)),
            },
            Action::ReplayWorkflow { file, speed } => {
                let report = self.replayer.replay(self.recorder.storage(), file, *speed)?;
                Ok(Outcome::with(to_payload(&report)?))
            }

            // ai
            Action::AnalyzeScreen { prompt } => self.analyze_screen(prompt),
            Action::ChatWithAi { message } => self.chat(message),
            Action::ScrapeWebsite { url, description } => self.scrape(url, description),
        }
    }

    fn click_at(&self, x: i32, y: i32) -> Result<Outcome> {
        let desktop = &self.caps.desktop;
        let before = if self.config.verify_clicks {
            match desktop.screenshot() {
                Ok(shot) => Some(shot),
                Err(e) => {
                    debug!("cannot verify click, capture failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        desktop.click(x, y, MouseButton::Left)?;
        self.caps.sleeper.sleep(self.config.settle.pointer);

        if let Some(before) = before {
            let after = desktop.screenshot()?;
            if !self.caps.screen_policy.changed(&before, &after) {
                return Err(Error::interaction(
                    "click",
                    format!("no visible effect at ({}, {})", x, y),
                ));
            }
        }
        Ok(Outcome::done())
    }

    /// A single key, or a `+`-joined combination such as `ctrl+shift+t`.
    fn press_key(&self, key: &str) -> Result<Outcome> {
        let parts: Vec<String> = if key.chars().count() > 1 && key.contains('+') {
            key.split('+')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(canonical_key)
                .collect()
        } else {
            vec![canonical_key(key)]
        };

        match parts.as_slice() {
            [] => return Err(Error::invalid_action("press_key", "empty key")),
            [single] => self.caps.desktop.key_press(single)?,
            combo => {
                let keys: Vec<&str> = combo.iter().map(String::as_str).collect();
                self.caps.desktop.key_combo(&keys)?;
            }
        }
        self.caps.sleeper.sleep(self.config.settle.keyboard);
        Ok(Outcome::done())
    }

    fn take_screenshot(&self, filename: Option<&str>) -> Result<Outcome> {
        let shot = self.caps.desktop.screenshot()?;
        let name = filename.map(str::trim).filter(|f| !f.is_empty()).unwrap_or("screenshot.png");
        let path = if name.to_lowercase().ends_with(".png") {
            PathBuf::from(name)
        } else {
            PathBuf::from(format!("{}.png", name))
        };
        save_png(&shot, &path)?;
        info!("screenshot saved to {}", path.display());
        Ok(Outcome::with(json!({
            "path": path.display().to_string(),
            "width": shot.width(),
            "height": shot.height(),
        })))
    }

    fn navigate(&self, url: &str) -> Result<Outcome> {
        self.caps.browser.with_session(|s| s.navigate(url))?;
        self.caps.sleeper.sleep(self.config.settle.page);
        Ok(Outcome::with(json!({ "url": url })))
    }

    fn analyze_screen(&self, prompt: &str) -> Result<Outcome> {
        let shot = self.caps.desktop.screenshot()?;
        let ai = self.caps.ai.clone();
        let prompt = prompt.to_string();
        let analysis = run_with_deadline("screen analysis", self.config.timeouts.ai, move || {
            ai.analyze_screen(&prompt, &shot)
        })?;
        Ok(Outcome::with(analysis))
    }

    fn chat(&self, message: &str) -> Result<Outcome> {
        let ai = self.caps.ai.clone();
        let message = message.to_string();
        let reply = run_with_deadline("chat", self.config.timeouts.ai, move || ai.chat(&message))?;
        Ok(Outcome::with(json!({ "reply": reply })))
    }

    /// Load the page and extract its text; with an AI available the text is
    /// distilled according to `description`.
    fn scrape(&self, url: &str, description: &str) -> Result<Outcome> {
        let url = normalize_url(url);
        let browser = self.caps.browser.clone();
        let ai = self.caps.ai.clone();
        let description = description.to_string();
        let data = run_with_deadline("scrape", self.config.timeouts.scrape, move || {
            let text = browser.with_session(|s| {
                s.navigate(&url)?;
                s.extract_text(None)
            })?;
            if !ai.is_available() {
                return Ok(json!({ "url": url, "text": text }));
            }
            let reply = ai.chat(&scrape_prompt(&description, &text))?;
            let data = extract_json(&reply).unwrap_or(Value::String(reply));
            Ok(json!({ "url": url, "data": data }))
        })?;
        Ok(Outcome::with(data))
    }
}

fn to_payload<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| Error::new(ErrorCode::Unknown, format!("failed to encode result: {}", e)))
}

fn scrape_prompt(description: &str, text: &str) -> String {
    let text: String = text.chars().take(SCRAPE_TEXT_LIMIT).collect();
    format!(
        "Extract the following from the web page text below: {}\n\
         Respond with JSON only.\n\n---\n{}",
        description, text
    )
}
