//! The owning service: one planner, one executor, one recorder.

use crate::config::Config;
use crate::executor::{Capabilities, ExecutionResult, Executor, PlanReport, StopHandle};
use crate::recovery::RecoveryChain;
use deskpilot_core::ai::GeminiClient;
use deskpilot_core::browser::default_launcher;
use deskpilot_core::deadline::run_with_deadline;
use deskpilot_core::{
    Action, AiCapability, BrowserLauncher, BrowserManager, DesktopInput, Error, NullAi,
    PixelDiffPolicy, Plan, Planner, Result, ScreenChangePolicy, Sleeper, ThreadSleeper,
};
use deskpilot_recorder::{
    default_source, InputSource, RecordingStatus, ReplayReport, StopOutcome, Workflow,
    WorkflowRecorder, WorkflowStorage, WorkflowSummary,
};
use std::sync::Arc;
use tracing::info;

pub struct AutomationSession {
    executor: Executor,
    planner: Arc<dyn Planner>,
    config: Config,
    stop: StopHandle,
}

impl AutomationSession {
    pub fn builder(config: Config) -> SessionBuilder {
        SessionBuilder::new(config)
    }

    /// A session with the backends compiled into this build.
    pub fn new(config: Config) -> Result<Self> {
        SessionBuilder::new(config).build()
    }

    /// Ask the planner for a plan and run it. Planner failures return an
    /// error before anything is executed.
    pub fn run_instruction(&self, instruction: &str) -> Result<PlanReport> {
        let plan = self.plan(instruction)?;
        info!("generated {} steps", plan.len());
        Ok(self.execute(&plan))
    }

    pub fn plan(&self, instruction: &str) -> Result<Plan> {
        let planner = self.planner.clone();
        let instruction = instruction.to_string();
        let plan = run_with_deadline("plan generation", self.config.timeouts.plan, move || {
            planner.generate_plan(&instruction)
        })?;
        if plan.is_empty() {
            return Err(Error::planner("Could not generate execution steps"));
        }
        Ok(plan)
    }

    pub fn execute(&self, plan: &Plan) -> PlanReport {
        self.stop.reset();
        let report = self.executor.execute_plan(plan, &self.stop);
        info!("{}", report.summary());
        report
    }

    /// Run one action outside a plan.
    pub fn execute_action(&self, action: &Action) -> ExecutionResult {
        self.executor.execute(0, action)
    }

    pub fn start_recording(&self, name: &str) -> Result<()> {
        self.recorder().start(name)
    }

    pub fn stop_recording(&self) -> Result<StopOutcome> {
        self.recorder().stop()
    }

    pub fn force_stop_recording(&self) -> bool {
        self.recorder().force_stop()
    }

    pub fn recording_status(&self) -> RecordingStatus {
        self.recorder().status()
    }

    pub fn replay(&self, id: &str, speed: f64) -> Result<ReplayReport> {
        self.executor.replayer().replay(self.storage(), id, speed)
    }

    pub fn list_workflows(&self) -> Result<Vec<WorkflowSummary>> {
        self.storage().list()
    }

    pub fn show_workflow(&self, id: &str) -> Result<Workflow> {
        self.storage().load(id)
    }

    pub fn delete_workflow(&self, id: &str) -> Result<()> {
        self.storage().delete(id)
    }

    /// Handle another thread can use to stop the running plan before its next step.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Discard any armed recording and close the browser.
    pub fn close(&self) -> Result<()> {
        self.recorder().force_stop();
        self.executor.capabilities().browser.close()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    fn recorder(&self) -> &WorkflowRecorder {
        self.executor.recorder()
    }

    fn storage(&self) -> &WorkflowStorage {
        self.recorder().storage()
    }
}

/// Swap any collaborator before building; the rest default to this build's backends.
pub struct SessionBuilder {
    config: Config,
    desktop: Option<Arc<dyn DesktopInput>>,
    launcher: Option<Box<dyn BrowserLauncher>>,
    planner: Option<Arc<dyn Planner>>,
    ai: Option<Arc<dyn AiCapability>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    screen_policy: Option<Arc<dyn ScreenChangePolicy>>,
    input_source: Option<Arc<dyn InputSource>>,
    recovery: Option<RecoveryChain>,
}

impl SessionBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            desktop: None,
            launcher: None,
            planner: None,
            ai: None,
            sleeper: None,
            screen_policy: None,
            input_source: None,
            recovery: None,
        }
    }

    pub fn desktop(mut self, desktop: Arc<dyn DesktopInput>) -> Self {
        self.desktop = Some(desktop);
        self
    }

    pub fn browser_launcher(mut self, launcher: Box<dyn BrowserLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn ai(mut self, ai: Arc<dyn AiCapability>) -> Self {
        self.ai = Some(ai);
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    pub fn screen_policy(mut self, policy: Arc<dyn ScreenChangePolicy>) -> Self {
        self.screen_policy = Some(policy);
        self
    }

    pub fn input_source(mut self, source: Arc<dyn InputSource>) -> Self {
        self.input_source = Some(source);
        self
    }

    pub fn recovery(mut self, chain: RecoveryChain) -> Self {
        self.recovery = Some(chain);
        self
    }

    pub fn build(self) -> Result<AutomationSession> {
        let config = self.config;

        let storage = match &config.workflows_dir {
            Some(dir) => WorkflowStorage::with_dir(dir)?,
            None => WorkflowStorage::new()?,
        };

        let gemini = match (&config.api_key, self.planner.is_none() || self.ai.is_none()) {
            (Some(key), true) => Some(Arc::new(GeminiClient::new(
                key.clone(),
                config.model.clone(),
                config.timeouts.ai,
            )?)),
            _ => None,
        };
        let planner: Arc<dyn Planner> = match (self.planner, &gemini) {
            (Some(p), _) => p,
            (None, Some(g)) => g.clone(),
            (None, None) => Arc::new(NullAi),
        };
        let ai: Arc<dyn AiCapability> = match (self.ai, &gemini) {
            (Some(a), _) => a,
            (None, Some(g)) => g.clone(),
            (None, None) => Arc::new(NullAi),
        };
        if gemini.is_some() {
            info!(model = %config.model, "using Gemini");
        } else if !ai.is_available() {
            info!("no AI configured; planning and AI actions are disabled");
        }

        let launcher = self.launcher.unwrap_or_else(|| default_launcher(config.headless));
        let caps = Capabilities {
            desktop: self.desktop.unwrap_or_else(deskpilot_core::desktop),
            browser: Arc::new(BrowserManager::new(launcher).lock_timeout(config.timeouts.browser_lock)),
            ai,
            sleeper: self.sleeper.unwrap_or_else(|| Arc::new(ThreadSleeper)),
            screen_policy: self
                .screen_policy
                .unwrap_or_else(|| Arc::new(PixelDiffPolicy::default())),
        };

        let source = self.input_source.unwrap_or_else(default_source);
        let recorder = Arc::new(WorkflowRecorder::new(source, Arc::new(storage)));

        let mut executor = Executor::new(caps, recorder, config.clone());
        if let Some(chain) = self.recovery {
            executor = executor.with_recovery(chain);
        }

        Ok(AutomationSession {
            executor,
            planner,
            config,
            stop: StopHandle::default(),
        })
    }
}
