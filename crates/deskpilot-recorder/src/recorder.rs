//! Workflow recorder
//!
//! A recorder owns at most one armed session. Arming subscribes to an
//! [`InputSource`] and starts two listener threads, one draining pointer
//! input and one draining keyboard input, both appending into the session
//! buffer under a single lock.
//!
//! Lifecycle: `Idle -> Armed -> Idle`. The transition back to idle happens
//! through [`WorkflowRecorder::stop`] (persist), [`WorkflowRecorder::force_stop`]
//! (discard) or the cancel key, which runs `stop` from the keyboard thread.

use crate::events::{EventData, RecordedEvent, Workflow};
use crate::source::{InputSource, RawInput, RawKind};
use crate::storage::WorkflowStorage;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use deskpilot_core::keys::canonical_key;
use deskpilot_core::{Error, ErrorCode, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Recorder configuration
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Upper bound on waiting for listener threads when stopping
    pub join_timeout: Duration,
    /// Key that stops the recording from the keyboard; not itself recorded
    pub cancel_key: Option<String>,
    /// How often idle listener threads check the stop flag
    pub poll_interval: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(2),
            cancel_key: Some("escape".to_string()),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Result of [`WorkflowRecorder::stop`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StopOutcome {
    /// Nothing was armed.
    NotRecording,
    /// Armed, but no events were captured; nothing was written.
    Empty,
    Saved { id: String, actions_count: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordingStatus {
    pub recording: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_name: Option<String>,
    pub actions_count: usize,
    pub duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_saved: Option<String>,
    /// How the most recent session ended, by stop or cancel key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<StopOutcome>,
    /// Why the most recent session could not be saved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<Error>,
}

pub struct WorkflowRecorder {
    shared: Arc<Shared>,
}

struct Shared {
    source: Arc<dyn InputSource>,
    storage: Arc<WorkflowStorage>,
    config: RecorderConfig,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    session: Option<Session>,
    generation: u64,
    last_saved: Option<String>,
    last_stop: Option<Result<StopOutcome>>,
}

struct Session {
    generation: u64,
    name: String,
    started: Instant,
    events: Vec<RecordedEvent>,
    listeners: Listeners,
}

struct Listeners {
    stop: Arc<AtomicBool>,
    done: Receiver<()>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkflowRecorder {
    pub fn new(source: Arc<dyn InputSource>, storage: Arc<WorkflowStorage>) -> Self {
        Self::with_config(source, storage, RecorderConfig::default())
    }

    pub fn with_config(
        source: Arc<dyn InputSource>,
        storage: Arc<WorkflowStorage>,
        config: RecorderConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                storage,
                config,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Arm a new session. A session that is still armed is force-stopped
    /// (its events are discarded) first.
    pub fn start(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if self.force_stop() {
            warn!("previous recording was still armed and has been discarded");
        }

        let subscription = self.shared.source.subscribe()?;
        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = bounded::<()>(2);

        let mut state = self.shared.state.lock();
        if let Some(previous) = state.session.take() {
            warn!(name = %previous.name, "discarding concurrently armed recording");
            previous.listeners.release(Duration::ZERO);
        }
        state.generation += 1;
        state.last_stop = None;
        let generation = state.generation;

        let mut threads = Vec::with_capacity(2);
        let spawned = spawn_listener(
            "recorder-pointer",
            self.shared.clone(),
            generation,
            subscription.pointer,
            stop.clone(),
            done_tx.clone(),
        )
        .and_then(|h| {
            threads.push(h);
            spawn_listener(
                "recorder-keyboard",
                self.shared.clone(),
                generation,
                subscription.keyboard,
                stop.clone(),
                done_tx,
            )
        });
        match spawned {
            Ok(h) => threads.push(h),
            Err(e) => {
                stop.store(true, Ordering::SeqCst);
                return Err(e);
            }
        }

        state.session = Some(Session {
            generation,
            name: name.clone(),
            started: Instant::now(),
            events: Vec::new(),
            listeners: Listeners { stop, done: done_rx, threads },
        });
        info!(name = %name, "recording started");
        Ok(())
    }

    /// Disarm, persist and return the workflow id. Idle recorders report
    /// [`StopOutcome::NotRecording`]; listeners are released even when
    /// saving fails.
    pub fn stop(&self) -> Result<StopOutcome> {
        self.shared.finish(None)
    }

    /// Tear down without saving. Never fails; returns whether a session was armed.
    pub fn force_stop(&self) -> bool {
        let session = self.shared.state.lock().session.take();
        match session {
            Some(session) => {
                info!(
                    name = %session.name,
                    discarded = session.events.len(),
                    "recording force-stopped"
                );
                session.listeners.release(Duration::ZERO);
                true
            }
            None => false,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.shared.state.lock().session.is_some()
    }

    pub fn status(&self) -> RecordingStatus {
        let state = self.shared.state.lock();
        let (last_outcome, last_error) = match &state.last_stop {
            Some(Ok(outcome)) => (Some(outcome.clone()), None),
            Some(Err(e)) => (None, Some(e.clone())),
            None => (None, None),
        };
        match &state.session {
            Some(s) => RecordingStatus {
                recording: true,
                workflow_name: Some(s.name.clone()),
                actions_count: s.events.len(),
                duration: s.started.elapsed().as_secs_f64(),
                last_saved: state.last_saved.clone(),
                last_outcome,
                last_error,
            },
            None => RecordingStatus {
                recording: false,
                workflow_name: None,
                actions_count: 0,
                duration: 0.0,
                last_saved: state.last_saved.clone(),
                last_outcome,
                last_error,
            },
        }
    }

    pub fn storage(&self) -> &WorkflowStorage {
        &self.shared.storage
    }
}

impl Drop for WorkflowRecorder {
    fn drop(&mut self) {
        self.force_stop();
    }
}

impl Shared {
    /// Stop the armed session. With `only` set, the session is stopped only
    /// if it is that generation (the cancel key must not end a newer session).
    fn finish(&self, only: Option<u64>) -> Result<StopOutcome> {
        let session = {
            let mut state = self.state.lock();
            match &state.session {
                Some(s) if only.map_or(true, |g| g == s.generation) => state.session.take(),
                _ => None,
            }
        };
        let Some(session) = session else {
            debug!("stop requested with no active recording");
            return Ok(StopOutcome::NotRecording);
        };

        let result = self.persist(session);
        let mut state = self.state.lock();
        if let Ok(StopOutcome::Saved { id, .. }) = &result {
            state.last_saved = Some(id.clone());
        }
        state.last_stop = Some(result.clone());
        result
    }

    fn persist(&self, session: Session) -> Result<StopOutcome> {
        let Session { name, started, mut events, listeners, .. } = session;
        let duration = started.elapsed().as_secs_f64();
        listeners.release(self.config.join_timeout);

        if events.is_empty() {
            info!(name = %name, "recording stopped, nothing recorded");
            return Ok(StopOutcome::Empty);
        }

        // Pointer and keyboard threads append independently
        events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        let workflow = Workflow::new(name, duration, events);
        let id = self.storage.save(&workflow).map_err(|e| {
            error!("failed to save recording {}: {}", workflow.name, e);
            e
        })?;
        info!(id = %id, events = workflow.actions_count, "recording saved");
        Ok(StopOutcome::Saved { id, actions_count: workflow.actions_count })
    }

    /// Append one observed event. Returns true when it was the cancel key.
    fn record(&self, generation: u64, input: RawInput) -> bool {
        let data = match input.kind {
            RawKind::ButtonPress { x, y, button } => EventData::MouseClick {
                x: x.round() as i32,
                y: y.round() as i32,
                button,
            },
            RawKind::Wheel { x, y, dx, dy } => EventData::MouseScroll {
                x: x.round() as i32,
                y: y.round() as i32,
                dx,
                dy,
            },
            RawKind::KeyPress { key } => {
                if self.is_cancel_key(&key) {
                    return true;
                }
                EventData::KeyPress { key }
            }
            RawKind::ButtonRelease { .. } | RawKind::Move { .. } | RawKind::KeyRelease { .. } => {
                return false
            }
        };

        let mut state = self.state.lock();
        if let Some(session) = state.session.as_mut() {
            if session.generation == generation {
                let t = input.at.saturating_duration_since(session.started).as_secs_f64();
                session.events.push(RecordedEvent::new(data, t));
            }
        }
        false
    }

    fn is_cancel_key(&self, key: &str) -> bool {
        self.config
            .cancel_key
            .as_deref()
            .is_some_and(|cancel| canonical_key(key) == canonical_key(cancel))
    }
}

impl Listeners {
    /// Signal the listener threads and wait up to `timeout` for them.
    /// Threads still running afterwards are detached. The calling thread is
    /// skipped, so a listener may release its own session.
    fn release(self, timeout: Duration) {
        self.stop.store(true, Ordering::SeqCst);

        let me = thread::current().id();
        let others: Vec<JoinHandle<()>> = self
            .threads
            .into_iter()
            .filter(|h| h.thread().id() != me)
            .collect();

        let deadline = Instant::now() + timeout;
        let mut exited = 0;
        while exited < others.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.done.recv_timeout(remaining) {
                Ok(()) => exited += 1,
                Err(_) => break,
            }
        }

        let all_exited = exited >= others.len();
        for handle in others {
            if all_exited || handle.is_finished() {
                let _ = handle.join();
            } else if !timeout.is_zero() {
                warn!(
                    thread = handle.thread().name().unwrap_or("listener"),
                    "listener did not stop within {:?}, detaching", timeout
                );
            }
        }
    }
}

fn spawn_listener(
    name: &str,
    shared: Arc<Shared>,
    generation: u64,
    rx: Receiver<RawInput>,
    stop: Arc<AtomicBool>,
    done: Sender<()>,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let poll = shared.config.poll_interval;
            while !stop.load(Ordering::SeqCst) {
                match rx.recv_timeout(poll) {
                    Ok(input) => {
                        if stop.load(Ordering::SeqCst) {
                            break;
                        }
                        if shared.record(generation, input) {
                            info!("cancel key pressed, stopping recording");
                            match shared.finish(Some(generation)) {
                                Ok(outcome) => debug!(?outcome, "recording stopped from keyboard"),
                                Err(e) => error!("stopping from keyboard failed: {}", e),
                            }
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            let _ = done.send(());
        })
        .map_err(|e| Error::new(ErrorCode::Unknown, format!("failed to spawn {}: {}", name, e)))
}
