//! Runtime configuration
//!
//! Every pause, retry count and deadline the engine uses lives here so tests
//! (and impatient users) can shrink them.

use deskpilot_core::ai::gemini::DEFAULT_MODEL;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Gemini API key. Without one the session runs with no planner or AI.
    pub api_key: Option<String>,
    pub model: String,
    /// Defaults to `$HOME/.deskpilot/workflows`.
    pub workflows_dir: Option<PathBuf>,
    pub headless: bool,
    /// Compare captures around coordinate clicks and fail clicks with no visible effect.
    pub verify_clicks: bool,
    pub retry: RetryPolicy,
    pub recovery: RecoveryConfig,
    pub settle: SettleTimes,
    pub timeouts: Timeouts,
    pub replay: ReplayTiming,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            workflows_dir: None,
            headless: false,
            verify_clicks: true,
            retry: RetryPolicy::default(),
            recovery: RecoveryConfig::default(),
            settle: SettleTimes::default(),
            timeouts: Timeouts::default(),
            replay: ReplayTiming::default(),
        }
    }
}

impl Config {
    /// Defaults overridden by `GEMINI_API_KEY`, `DESKPILOT_MODEL` and
    /// `DESKPILOT_WORKFLOWS_DIR`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(key) = non_empty_env("GEMINI_API_KEY") {
            config.api_key = Some(key);
        }
        if let Some(model) = non_empty_env("DESKPILOT_MODEL") {
            config.model = model;
        }
        if let Some(dir) = non_empty_env("DESKPILOT_WORKFLOWS_DIR") {
            config.workflows_dir = Some(PathBuf::from(dir));
        }
        config
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_workflows_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workflows_dir = Some(dir.into());
        self
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn verify_clicks(mut self, verify: bool) -> Self {
        self.verify_clicks = verify;
        self
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Attempts per action before the recovery chain runs.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Coordinate clicks, element clicks and text entry
    pub interactive_attempts: u32,
    pub default_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interactive_attempts: 2,
            default_attempts: 1,
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn attempts_for(&self, interactive: bool) -> u32 {
        let n = if interactive {
            self.interactive_attempts
        } else {
            self.default_attempts
        };
        n.max(1)
    }
}

#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Click offsets tried, in order, around a failed coordinate click
    pub offsets: Vec<(i32, i32)>,
    /// Pause between a perturbed click and the after-capture
    pub click_settle: Duration,
    pub waits: Vec<Duration>,
    /// Where focus recovery clicks to bring the desktop forward
    pub taskbar_point: (i32, i32),
    pub focus_step_pause: Duration,
    pub max_suggestions: usize,
    /// Suggestions at or below this confidence are ignored
    pub min_confidence: f64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            offsets: vec![(0, 0), (10, 0), (-10, 0), (0, 10), (0, -10), (20, 20), (-20, -20)],
            click_settle: Duration::from_millis(500),
            waits: vec![
                Duration::from_secs(2),
                Duration::from_secs(5),
                Duration::from_secs(10),
            ],
            taskbar_point: (960, 1060),
            focus_step_pause: Duration::from_millis(500),
            max_suggestions: 3,
            min_confidence: 0.6,
        }
    }
}

/// Pauses after physical actions so the UI can catch up.
#[derive(Debug, Clone)]
pub struct SettleTimes {
    pub pointer: Duration,
    pub keyboard: Duration,
    pub launch: Duration,
    pub page: Duration,
}

impl Default for SettleTimes {
    fn default() -> Self {
        Self {
            pointer: Duration::from_millis(500),
            keyboard: Duration::from_secs(1),
            launch: Duration::from_secs(3),
            page: Duration::from_secs(3),
        }
    }
}

impl SettleTimes {
    /// No pauses at all.
    pub fn none() -> Self {
        Self {
            pointer: Duration::ZERO,
            keyboard: Duration::ZERO,
            launch: Duration::ZERO,
            page: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Timeouts {
    pub plan: Duration,
    pub scrape: Duration,
    /// Screen analysis and chat
    pub ai: Duration,
    /// Waiting for a browser session held by someone else
    pub browser_lock: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            plan: Duration::from_secs(60),
            scrape: Duration::from_secs(30),
            ai: Duration::from_secs(60),
            browser_lock: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplayTiming {
    pub settle: Duration,
    pub max_gap: Duration,
}

impl Default for ReplayTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(2),
            max_gap: Duration::from_secs(2),
        }
    }
}
