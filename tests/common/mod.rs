#![allow(dead_code)]

use crossbeam_channel::{unbounded, Sender};
use deskpilot::{AutomationSession, Config};
use deskpilot_core::{
    AiCapability, BrowserLauncher, BrowserSession, DesktopInput, Error, ErrorCode, MouseButton,
    Plan, Planner, RecoveryRequest, Result, Screenshot, Sleeper, Suggestion,
};
use deskpilot_recorder::{InputSource, RawInput, Subscription};
use image::Rgba;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Desktop
// ============================================================================

#[derive(Debug, Clone, Default)]
pub enum ClickMode {
    #[default]
    Effective,
    NoEffect,
    EffectiveAt(Vec<(i32, i32)>),
}

/// Records successful calls; a click with an effect changes the next capture.
#[derive(Default)]
pub struct MockDesktop {
    calls: Mutex<Vec<String>>,
    screen: AtomicU8,
    click_mode: Mutex<ClickMode>,
    failures: Mutex<HashMap<&'static str, (usize, String)>>,
}

impl MockDesktop {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_click_mode(&self, mode: ClickMode) {
        *self.click_mode.lock() = mode;
    }

    /// Make the next `times` calls to `method` fail (`usize::MAX` = always).
    pub fn fail(&self, method: &'static str, times: usize, message: &str) {
        self.failures.lock().insert(method, (times, message.to_string()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn check(&self, method: &'static str) -> Result<()> {
        let mut failures = self.failures.lock();
        if let Some((remaining, message)) = failures.get_mut(method) {
            if *remaining > 0 {
                if *remaining != usize::MAX {
                    *remaining -= 1;
                }
                return Err(Error::interaction(method, message.clone()));
            }
        }
        Ok(())
    }

    fn log(&self, call: String) {
        self.calls.lock().push(call);
    }
}

impl DesktopInput for MockDesktop {
    fn click(&self, x: i32, y: i32, _button: MouseButton) -> Result<()> {
        self.check("click")?;
        self.log(format!("click {} {}", x, y));
        let effective = match &*self.click_mode.lock() {
            ClickMode::Effective => true,
            ClickMode::NoEffect => false,
            ClickMode::EffectiveAt(points) => points.contains(&(x, y)),
        };
        if effective {
            self.screen.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn drag(&self, from: (i32, i32), to: (i32, i32)) -> Result<()> {
        self.check("drag")?;
        self.log(format!("drag {} {} {} {}", from.0, from.1, to.0, to.1));
        Ok(())
    }

    fn scroll(&self, x: i32, y: i32, dx: i64, dy: i64) -> Result<()> {
        self.check("scroll")?;
        self.log(format!("scroll {} {} {} {}", x, y, dx, dy));
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<()> {
        self.check("type_text")?;
        self.log(format!("type {}", text));
        Ok(())
    }

    fn key_press(&self, key: &str) -> Result<()> {
        self.check("key_press")?;
        self.log(format!("key {}", key));
        Ok(())
    }

    fn key_combo(&self, keys: &[&str]) -> Result<()> {
        self.check("key_combo")?;
        self.log(format!("combo {}", keys.join("+")));
        Ok(())
    }

    fn screenshot(&self) -> Result<Screenshot> {
        self.check("screenshot")?;
        let v = self.screen.load(Ordering::SeqCst).wrapping_mul(40);
        Ok(Screenshot::from_pixel(4, 4, Rgba([v, v, v, 255])))
    }

    fn open_application(&self, name: &str) -> Result<()> {
        self.check("open_application")?;
        self.log(format!("open {}", name));
        Ok(())
    }
}

// ============================================================================
// Browser
// ============================================================================

#[derive(Default)]
pub struct BrowserState {
    pub calls: Mutex<Vec<String>>,
    pub launches: AtomicUsize,
    pub closes: AtomicUsize,
    /// Selectors that can be clicked; `None` means all of them.
    pub clickable: Mutex<Option<Vec<String>>>,
    pub click_error: Mutex<String>,
    /// Remaining navigation failures and their message.
    pub navigate_failures: Mutex<(usize, String)>,
    /// How long each navigation blocks.
    pub navigate_delay: Mutex<Duration>,
    pub page_text: Mutex<String>,
}

impl BrowserState {
    pub fn new() -> Arc<Self> {
        let state = Self::default();
        *state.click_error.lock() = "click intercepted".to_string();
        *state.page_text.lock() = "Example Domain".to_string();
        Arc::new(state)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

pub struct MockLauncher(pub Arc<BrowserState>);

impl BrowserLauncher for MockLauncher {
    fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        self.0.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockBrowser(self.0.clone())))
    }
}

struct MockBrowser(Arc<BrowserState>);

impl BrowserSession for MockBrowser {
    fn navigate(&mut self, url: &str) -> Result<()> {
        let delay = *self.0.navigate_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        {
            let mut failures = self.0.navigate_failures.lock();
            if failures.0 > 0 {
                failures.0 -= 1;
                return Err(Error::new(ErrorCode::Timeout, failures.1.clone()));
            }
        }
        self.0.calls.lock().push(format!("navigate {}", url));
        Ok(())
    }

    fn click(&mut self, selector: &str) -> Result<()> {
        let allowed = match &*self.0.clickable.lock() {
            None => true,
            Some(list) => list.iter().any(|s| s == selector),
        };
        if !allowed {
            let message = self.0.click_error.lock().clone();
            return Err(Error::interaction("click", format!("{} ({})", message, selector)));
        }
        self.0.calls.lock().push(format!("click {}", selector));
        Ok(())
    }

    fn extract_text(&mut self, selector: Option<&str>) -> Result<String> {
        self.0
            .calls
            .lock()
            .push(format!("extract {}", selector.unwrap_or("page")));
        Ok(self.0.page_text.lock().clone())
    }

    fn close(&mut self) -> Result<()> {
        self.0.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// AI and planning
// ============================================================================

pub struct MockAi {
    pub available: bool,
    pub suggestions: Vec<Suggestion>,
    pub reply: String,
    pub requests: Mutex<Vec<RecoveryRequest>>,
}

impl MockAi {
    pub fn new(suggestions: Vec<Suggestion>) -> Arc<Self> {
        Arc::new(Self {
            available: true,
            suggestions,
            reply: "hello from the model".to_string(),
            requests: Mutex::new(Vec::new()),
        })
    }
}

impl AiCapability for MockAi {
    fn is_available(&self) -> bool {
        self.available
    }

    fn analyze_screen(&self, prompt: &str, screen: &Screenshot) -> Result<Value> {
        Ok(json!({ "prompt": prompt, "width": screen.width() }))
    }

    fn chat(&self, _message: &str) -> Result<String> {
        Ok(self.reply.clone())
    }

    fn suggest_recovery(&self, request: &RecoveryRequest) -> Result<Vec<Suggestion>> {
        self.requests.lock().push(request.clone());
        Ok(self.suggestions.clone())
    }
}

pub fn suggestion(action: &str, parameters: Value, confidence: f64) -> Suggestion {
    Suggestion {
        approach: format!("try {}", action),
        action: action.to_string(),
        parameters: parameters.as_object().cloned().unwrap_or_default(),
        confidence,
    }
}

pub struct FnPlanner<F>(pub F);

impl<F> Planner for FnPlanner<F>
where
    F: Fn(&str) -> Result<Plan> + Send + Sync,
{
    fn generate_plan(&self, instruction: &str) -> Result<Plan> {
        (self.0)(instruction)
    }
}

pub fn planner<F>(f: F) -> Arc<dyn Planner>
where
    F: Fn(&str) -> Result<Plan> + Send + Sync + 'static,
{
    Arc::new(FnPlanner(f))
}

// ============================================================================
// Time and input sources
// ============================================================================

#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.lock().push(duration);
    }
}

/// Subscriptions that stay open but never deliver anything.
#[derive(Default)]
pub struct IdleSource {
    senders: Mutex<Vec<(Sender<RawInput>, Sender<RawInput>)>>,
}

impl InputSource for IdleSource {
    fn subscribe(&self) -> Result<Subscription> {
        let (ptx, prx) = unbounded();
        let (ktx, krx) = unbounded();
        self.senders.lock().push((ptx, ktx));
        Ok(Subscription { pointer: prx, keyboard: krx })
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub session: AutomationSession,
    pub desktop: Arc<MockDesktop>,
    pub browser: Arc<BrowserState>,
    pub sleeper: Arc<RecordingSleeper>,
    pub dir: tempfile::TempDir,
}

pub fn harness(ai: Arc<dyn AiCapability>) -> Harness {
    harness_with(|c| c, ai, None)
}

pub fn harness_with(
    configure: impl FnOnce(Config) -> Config,
    ai: Arc<dyn AiCapability>,
    planner: Option<Arc<dyn Planner>>,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let desktop = MockDesktop::new();
    let browser = BrowserState::new();
    let sleeper = Arc::new(RecordingSleeper::default());

    let config = configure(Config::default().with_workflows_dir(dir.path()));
    let mut builder = AutomationSession::builder(config)
        .desktop(desktop.clone())
        .browser_launcher(Box::new(MockLauncher(browser.clone())))
        .ai(ai)
        .sleeper(sleeper.clone())
        .input_source(Arc::new(IdleSource::default()));
    if let Some(planner) = planner {
        builder = builder.planner(planner);
    }

    Harness {
        session: builder.build().unwrap(),
        desktop,
        browser,
        sleeper,
        dir,
    }
}

pub fn null_ai() -> Arc<dyn AiCapability> {
    Arc::new(deskpilot_core::NullAi)
}
