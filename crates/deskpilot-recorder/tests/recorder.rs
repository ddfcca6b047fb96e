use crossbeam_channel::{unbounded, Sender};
use deskpilot_core::{Error, ErrorCode, MouseButton, Result};
use deskpilot_recorder::{
    EventData, InputSource, RawInput, RawKind, StopOutcome, Subscription, WorkflowRecorder,
    WorkflowStorage,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Input source fed by the test through channels.
#[derive(Default)]
struct ChannelSource {
    subs: Mutex<Vec<(Sender<RawInput>, Sender<RawInput>)>>,
}

impl ChannelSource {
    fn latest(&self) -> (Sender<RawInput>, Sender<RawInput>) {
        self.subs.lock().last().cloned().expect("no subscription yet")
    }
}

impl InputSource for ChannelSource {
    fn subscribe(&self) -> Result<Subscription> {
        let (ptx, prx) = unbounded();
        let (ktx, krx) = unbounded();
        self.subs.lock().push((ptx, ktx));
        Ok(Subscription { pointer: prx, keyboard: krx })
    }
}

struct BrokenSource;

impl InputSource for BrokenSource {
    fn subscribe(&self) -> Result<Subscription> {
        Err(Error::new(ErrorCode::InteractionFailure, "hook unavailable"))
    }
}

fn setup() -> (tempfile::TempDir, Arc<ChannelSource>, WorkflowRecorder) {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(WorkflowStorage::with_dir(dir.path()).unwrap());
    let source = Arc::new(ChannelSource::default());
    let recorder = WorkflowRecorder::new(source.clone(), storage);
    (dir, source, recorder)
}

fn wait_until(cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}

fn at(base: Instant, ms: u64, kind: RawKind) -> RawInput {
    RawInput { at: base + Duration::from_millis(ms), kind }
}

#[test]
fn records_presses_scrolls_and_keys_only() {
    let (_dir, source, recorder) = setup();
    recorder.start("demo").unwrap();
    let (pointer, keyboard) = source.latest();
    let base = Instant::now();

    pointer.send(at(base, 0, RawKind::Move { x: 1.0, y: 1.0 })).unwrap();
    pointer
        .send(at(base, 100, RawKind::ButtonPress { x: 10.0, y: 20.0, button: MouseButton::Right }))
        .unwrap();
    pointer
        .send(at(base, 150, RawKind::ButtonRelease { x: 10.0, y: 20.0, button: MouseButton::Right }))
        .unwrap();
    pointer.send(at(base, 200, RawKind::Wheel { x: 10.0, y: 20.0, dx: 0, dy: -3 })).unwrap();
    keyboard.send(at(base, 300, RawKind::KeyPress { key: "a".into() })).unwrap();
    keyboard.send(at(base, 350, RawKind::KeyRelease { key: "a".into() })).unwrap();

    assert!(wait_until(|| recorder.status().actions_count == 3));
    let status = recorder.status();
    assert!(status.recording);
    assert_eq!(status.workflow_name.as_deref(), Some("demo"));

    let id = match recorder.stop().unwrap() {
        StopOutcome::Saved { id, actions_count } => {
            assert_eq!(actions_count, 3);
            id
        }
        other => panic!("unexpected outcome: {:?}", other),
    };
    assert!(id.starts_with("demo_"));
    assert!(!recorder.is_recording());
    assert_eq!(recorder.status().last_saved.as_deref(), Some(id.as_str()));

    let workflow = recorder.storage().load(&id).unwrap();
    assert_eq!(workflow.actions_count, 3);
    assert!(matches!(
        workflow.actions[0].data,
        EventData::MouseClick { x: 10, y: 20, button: MouseButton::Right }
    ));
    assert!(matches!(workflow.actions[1].data, EventData::MouseScroll { dy: -3, .. }));
    assert_eq!(workflow.actions[2].data, EventData::KeyPress { key: "a".into() });
    assert!(workflow
        .actions
        .windows(2)
        .all(|w| w[0].timestamp <= w[1].timestamp));
}

#[test]
fn stop_when_idle_is_not_an_error() {
    let (_dir, _source, recorder) = setup();
    assert_eq!(recorder.stop().unwrap(), StopOutcome::NotRecording);
    assert!(!recorder.force_stop());
}

#[test]
fn empty_recording_writes_nothing() {
    let (_dir, _source, recorder) = setup();
    recorder.start("nothing").unwrap();
    assert_eq!(recorder.stop().unwrap(), StopOutcome::Empty);
    assert!(recorder.storage().list().unwrap().is_empty());
    assert_eq!(recorder.stop().unwrap(), StopOutcome::NotRecording);
}

#[test]
fn start_while_armed_discards_previous_session() {
    let (_dir, source, recorder) = setup();
    recorder.start("first").unwrap();
    let (pointer, _) = source.latest();
    pointer
        .send(RawInput::now(RawKind::ButtonPress { x: 1.0, y: 1.0, button: MouseButton::Left }))
        .unwrap();
    assert!(wait_until(|| recorder.status().actions_count == 1));

    recorder.start("second").unwrap();
    let status = recorder.status();
    assert_eq!(status.workflow_name.as_deref(), Some("second"));
    assert_eq!(status.actions_count, 0);

    assert_eq!(recorder.stop().unwrap(), StopOutcome::Empty);
    assert!(recorder.storage().list().unwrap().is_empty());
}

#[test]
fn escape_stops_and_saves_without_recording_itself() {
    let (_dir, source, recorder) = setup();
    recorder.start("cancelled").unwrap();
    let (pointer, keyboard) = source.latest();
    pointer
        .send(RawInput::now(RawKind::ButtonPress { x: 5.0, y: 5.0, button: MouseButton::Left }))
        .unwrap();
    assert!(wait_until(|| recorder.status().actions_count == 1));

    keyboard.send(RawInput::now(RawKind::KeyPress { key: "esc".into() })).unwrap();
    assert!(wait_until(|| !recorder.is_recording()));
    assert!(wait_until(|| recorder.status().last_saved.is_some()));

    let status = recorder.status();
    let id = status.last_saved.unwrap();
    assert_eq!(
        status.last_outcome,
        Some(StopOutcome::Saved { id: id.clone(), actions_count: 1 })
    );
    assert!(status.last_error.is_none());
    let workflow = recorder.storage().load(&id).unwrap();
    assert_eq!(workflow.actions.len(), 1);
    assert!(workflow
        .actions
        .iter()
        .all(|e| !matches!(e.data, EventData::KeyPress { .. })));
}

#[test]
fn escape_reports_a_failed_save() {
    let (dir, source, recorder) = setup();
    recorder.start("doomed").unwrap();
    let (pointer, keyboard) = source.latest();
    pointer
        .send(RawInput::now(RawKind::ButtonPress { x: 5.0, y: 5.0, button: MouseButton::Left }))
        .unwrap();
    assert!(wait_until(|| recorder.status().actions_count == 1));

    std::fs::remove_dir_all(dir.path()).unwrap();
    keyboard.send(RawInput::now(RawKind::KeyPress { key: "escape".into() })).unwrap();
    assert!(wait_until(|| recorder.status().last_error.is_some()));

    let status = recorder.status();
    assert!(!status.recording);
    assert!(status.last_outcome.is_none());
    assert!(status.last_saved.is_none());
    assert_eq!(status.last_error.unwrap().code, ErrorCode::PersistenceFailure);
}

#[test]
fn starting_again_clears_the_last_outcome() {
    let (_dir, _source, recorder) = setup();
    recorder.start("one").unwrap();
    recorder.stop().unwrap();
    assert_eq!(recorder.status().last_outcome, Some(StopOutcome::Empty));

    recorder.start("two").unwrap();
    assert!(recorder.status().last_outcome.is_none());
}

#[test]
fn subscribe_failure_leaves_recorder_idle() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(WorkflowStorage::with_dir(dir.path()).unwrap());
    let recorder = WorkflowRecorder::new(Arc::new(BrokenSource), storage);

    let err = recorder.start("x").unwrap_err();
    assert_eq!(err.code, ErrorCode::InteractionFailure);
    assert!(!recorder.is_recording());
}
