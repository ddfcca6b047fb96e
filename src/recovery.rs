//! Recovery strategies for actions that exhausted their retries
//!
//! The chain tries at most one heuristic: the first whose gate matches the
//! failed action and its error. If none matches, or the heuristic fails, the
//! AI-suggested fallback gets a turn.

use crate::config::RecoveryConfig;
use deskpilot_core::selector;
use deskpilot_core::{
    Action, ActionKind, AiCapability, BrowserManager, DesktopInput, Error, ErrorCode, Family,
    MouseButton, RecoveryRequest, ScreenChangePolicy, Sleeper,
};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyId {
    CoordinatePerturbation,
    FocusRecovery,
    WaitAndRetry,
    AlternativeSelector,
    AiSuggested,
}

impl StrategyId {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyId::CoordinatePerturbation => "coordinate_perturbation",
            StrategyId::FocusRecovery => "focus_recovery",
            StrategyId::WaitAndRetry => "wait_and_retry",
            StrategyId::AlternativeSelector => "alternative_selector",
            StrategyId::AiSuggested => "ai_suggested",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a strategy may touch while recovering one action.
pub struct RecoveryContext<'a> {
    /// Attempts already spent on the action
    pub attempt_number: u32,
    pub desktop: &'a dyn DesktopInput,
    pub browser: &'a BrowserManager,
    pub ai: &'a dyn AiCapability,
    pub sleeper: &'a dyn Sleeper,
    pub screen_policy: &'a dyn ScreenChangePolicy,
    /// Run an action through the executor's normal dispatch (no retry, no recovery)
    pub redo: &'a dyn Fn(&Action) -> deskpilot_core::Result<()>,
}

pub trait RecoveryStrategy: Send + Sync {
    fn id(&self) -> StrategyId;

    /// Whether this strategy is relevant to the failure.
    fn applies(&self, action: &Action, error: &Error) -> bool;

    /// Try to achieve the action's effect another way. True on success.
    fn attempt(&self, action: &Action, error: &Error, cx: &RecoveryContext<'_>) -> bool;
}

pub struct RecoveryChain {
    heuristics: Vec<Box<dyn RecoveryStrategy>>,
    fallback: Option<Box<dyn RecoveryStrategy>>,
}

impl RecoveryChain {
    pub fn new(
        heuristics: Vec<Box<dyn RecoveryStrategy>>,
        fallback: Option<Box<dyn RecoveryStrategy>>,
    ) -> Self {
        Self { heuristics, fallback }
    }

    /// Perturbation, focus, wait-and-retry and alternative selectors, with
    /// AI suggestions as the fallback.
    pub fn standard(config: &RecoveryConfig) -> Self {
        Self::new(
            vec![
                Box::new(CoordinatePerturbation {
                    offsets: config.offsets.clone(),
                    settle: config.click_settle,
                }),
                Box::new(FocusRecovery {
                    taskbar_point: config.taskbar_point,
                    pause: config.focus_step_pause,
                }),
                Box::new(WaitAndRetry { waits: config.waits.clone() }),
                Box::new(AlternativeSelector),
            ],
            Some(Box::new(AiSuggested {
                max_suggestions: config.max_suggestions,
                min_confidence: config.min_confidence,
            })),
        )
    }

    /// A chain that never recovers anything.
    pub fn none() -> Self {
        Self::new(Vec::new(), None)
    }

    pub fn recover(
        &self,
        action: &Action,
        error: &Error,
        cx: &RecoveryContext<'_>,
    ) -> Option<StrategyId> {
        if let Some(strategy) = self.heuristics.iter().find(|s| s.applies(action, error)) {
            info!(strategy = %strategy.id(), action = %action.kind(), "attempting recovery");
            if strategy.attempt(action, error, cx) {
                info!(strategy = %strategy.id(), "recovery succeeded");
                return Some(strategy.id());
            }
            debug!(strategy = %strategy.id(), "recovery failed");
        }

        let fallback = self.fallback.as_ref()?;
        if !fallback.applies(action, error) {
            return None;
        }
        info!(strategy = %fallback.id(), action = %action.kind(), "attempting fallback recovery");
        if fallback.attempt(action, error, cx) {
            info!(strategy = %fallback.id(), "recovery succeeded");
            Some(fallback.id())
        } else {
            warn!(action = %action.kind(), "all recovery strategies failed");
            None
        }
    }
}

fn mentions(error: &Error, needles: &[&str]) -> bool {
    let message = error.message.to_lowercase();
    needles.iter().any(|n| message.contains(n))
}

// ============================================================================
// Strategies
// ============================================================================

/// Click around the original point until the screen visibly changes.
pub struct CoordinatePerturbation {
    pub offsets: Vec<(i32, i32)>,
    pub settle: Duration,
}

impl RecoveryStrategy for CoordinatePerturbation {
    fn id(&self) -> StrategyId {
        StrategyId::CoordinatePerturbation
    }

    fn applies(&self, action: &Action, _error: &Error) -> bool {
        matches!(action, Action::ClickCoordinates { .. })
    }

    fn attempt(&self, action: &Action, _error: &Error, cx: &RecoveryContext<'_>) -> bool {
        let Action::ClickCoordinates { x, y } = action else {
            return false;
        };
        for &(dx, dy) in &self.offsets {
            let (px, py) = (x.saturating_add(dx), y.saturating_add(dy));
            let result = cx.desktop.screenshot().and_then(|before| {
                cx.desktop.click(px, py, MouseButton::Left)?;
                cx.sleeper.sleep(self.settle);
                let after = cx.desktop.screenshot()?;
                Ok(cx.screen_policy.changed(&before, &after))
            });
            match result {
                Ok(true) => {
                    info!("click at ({}, {}) changed the screen", px, py);
                    return true;
                }
                Ok(false) => debug!("click at ({}, {}) had no visible effect", px, py),
                Err(e) => warn!("click at ({}, {}) failed: {}", px, py, e),
            }
        }
        false
    }
}

/// Try to bring the intended window back to the foreground.
pub struct FocusRecovery {
    pub taskbar_point: (i32, i32),
    pub pause: Duration,
}

impl RecoveryStrategy for FocusRecovery {
    fn id(&self) -> StrategyId {
        StrategyId::FocusRecovery
    }

    fn applies(&self, _action: &Action, error: &Error) -> bool {
        mentions(error, &["focus", "window"])
    }

    // Reports success whether or not the individual gestures land.
    fn attempt(&self, _action: &Action, _error: &Error, cx: &RecoveryContext<'_>) -> bool {
        let step = |label: &str, result: deskpilot_core::Result<()>| {
            if let Err(e) = result {
                warn!("focus recovery {} failed: {}", label, e);
            }
            cx.sleeper.sleep(self.pause);
        };
        let (tx, ty) = self.taskbar_point;
        step("alt+tab", cx.desktop.key_combo(&["alt", "tab"]));
        step("taskbar click", cx.desktop.click(tx, ty, MouseButton::Left));
        step("os key", cx.desktop.key_press("cmd"));
        step("escape", cx.desktop.key_press("escape"));
        true
    }
}

/// Give a slow UI more time, re-running the action after each wait. Only
/// single input gestures are re-run; replays, scrapes and AI calls are not.
pub struct WaitAndRetry {
    pub waits: Vec<Duration>,
}

impl RecoveryStrategy for WaitAndRetry {
    fn id(&self) -> StrategyId {
        StrategyId::WaitAndRetry
    }

    fn applies(&self, action: &Action, error: &Error) -> bool {
        let retryable = matches!(
            action.kind(),
            ActionKind::ClickCoordinates
                | ActionKind::ClickElement
                | ActionKind::TypeText
                | ActionKind::PressKey
        );
        retryable
            && (matches!(error.code, ErrorCode::Timeout | ErrorCode::NotFound)
                || mentions(error, &["timeout", "not found"]))
    }

    fn attempt(&self, action: &Action, _error: &Error, cx: &RecoveryContext<'_>) -> bool {
        for wait in &self.waits {
            info!("waiting {:?} before retrying {}", wait, action.kind());
            cx.sleeper.sleep(*wait);
            match (cx.redo)(action) {
                Ok(()) => return true,
                Err(e) => debug!("retry after {:?} failed: {}", wait, e),
            }
        }
        false
    }
}

/// Retry an element click with selectors derived from the original.
pub struct AlternativeSelector;

impl RecoveryStrategy for AlternativeSelector {
    fn id(&self) -> StrategyId {
        StrategyId::AlternativeSelector
    }

    fn applies(&self, action: &Action, _error: &Error) -> bool {
        matches!(action, Action::ClickElement { .. })
    }

    fn attempt(&self, action: &Action, _error: &Error, cx: &RecoveryContext<'_>) -> bool {
        let Action::ClickElement { target } = action else {
            return false;
        };
        for candidate in selector::alternatives(target) {
            match cx.browser.with_session(|s| s.click(&candidate)) {
                Ok(()) => {
                    info!("clicked alternative selector {}", candidate);
                    return true;
                }
                Err(e) => debug!("alternative selector {} failed: {}", candidate, e),
            }
        }
        false
    }
}

/// Ask the AI for alternative actions and run the confident ones.
pub struct AiSuggested {
    pub max_suggestions: usize,
    pub min_confidence: f64,
}

impl RecoveryStrategy for AiSuggested {
    fn id(&self) -> StrategyId {
        StrategyId::AiSuggested
    }

    fn applies(&self, _action: &Action, _error: &Error) -> bool {
        true
    }

    fn attempt(&self, action: &Action, error: &Error, cx: &RecoveryContext<'_>) -> bool {
        if !cx.ai.is_available() {
            debug!("no AI capability, skipping suggestions");
            return false;
        }

        let screen = cx
            .desktop
            .screenshot()
            .and_then(|shot| {
                cx.ai.analyze_screen(
                    "Describe the current screen state, the focused window and any dialogs or errors",
                    &shot,
                )
            })
            .unwrap_or_else(|e| {
                warn!("screen analysis for recovery failed: {}", e);
                Value::Null
            });

        let request = RecoveryRequest {
            action: action.clone(),
            error: error.message.clone(),
            screen,
            max_suggestions: self.max_suggestions,
        };
        let mut suggestions = match cx.ai.suggest_recovery(&request) {
            Ok(s) => s,
            Err(e) => {
                warn!("recovery suggestions failed: {}", e);
                return false;
            }
        };
        suggestions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        for suggestion in suggestions.iter().take(self.max_suggestions) {
            if suggestion.confidence <= self.min_confidence {
                debug!(
                    "skipping suggestion {:?} (confidence {:.2})",
                    suggestion.approach, suggestion.confidence
                );
                continue;
            }
            let candidate = match suggestion.to_action() {
                Ok(a) => a,
                Err(e) => {
                    debug!("unusable suggestion {}: {}", suggestion.action, e);
                    continue;
                }
            };
            if !matches!(candidate.kind().family(), Family::Desktop | Family::Browser) {
                debug!("suggestion {} is not a desktop or browser action", candidate.kind());
                continue;
            }
            info!(
                "trying suggestion {:?}: {} (confidence {:.2})",
                suggestion.approach,
                candidate.describe(),
                suggestion.confidence
            );
            match (cx.redo)(&candidate) {
                Ok(()) => return true,
                Err(e) => debug!("suggestion failed: {}", e),
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(code: ErrorCode, message: &str) -> Error {
        Error::new(code, message)
    }

    #[test]
    fn gates() {
        let click = Action::ClickCoordinates { x: 1, y: 2 };
        let element = Action::ClickElement { target: "#go".into() };
        let key = Action::PressKey { key: "enter".into() };
        let generic = err(ErrorCode::InteractionFailure, "boom");

        assert!(CoordinatePerturbation { offsets: vec![], settle: Duration::ZERO }
            .applies(&click, &generic));
        assert!(!CoordinatePerturbation { offsets: vec![], settle: Duration::ZERO }
            .applies(&element, &generic));
        assert!(AlternativeSelector.applies(&element, &generic));

        let focus = FocusRecovery { taskbar_point: (0, 0), pause: Duration::ZERO };
        assert!(focus.applies(&key, &err(ErrorCode::InteractionFailure, "Window lost FOCUS")));
        assert!(!focus.applies(&key, &generic));

        let wait = WaitAndRetry { waits: vec![] };
        assert!(wait.applies(&key, &err(ErrorCode::Timeout, "slow")));
        assert!(wait.applies(&key, &err(ErrorCode::InteractionFailure, "Element not found: #x")));
        assert!(!wait.applies(&key, &generic));
    }

    #[test]
    fn wait_and_retry_only_reruns_input_gestures() {
        let wait = WaitAndRetry { waits: vec![] };
        let timeout = err(ErrorCode::Timeout, "timed out");
        let missing = err(ErrorCode::NotFound, "Not found: workflow 'x'");

        assert!(wait.applies(&Action::TypeText { text: "a".into() }, &timeout));
        assert!(wait.applies(&Action::ClickElement { target: "#go".into() }, &timeout));
        assert!(!wait.applies(&Action::NavigateUrl { url: "a.b".into() }, &timeout));
        assert!(!wait.applies(
            &Action::ScrapeWebsite { url: "a.b".into(), description: "all".into() },
            &timeout
        ));
        assert!(!wait.applies(
            &Action::ReplayWorkflow { file: "x".into(), speed: 1.0 },
            &missing
        ));
    }

    #[test]
    fn strategy_ids_serialize_snake_case() {
        assert_eq!(
            serde_json::to_value(StrategyId::AlternativeSelector).unwrap(),
            serde_json::json!("alternative_selector")
        );
        assert_eq!(StrategyId::AiSuggested.to_string(), "ai_suggested");
    }
}
