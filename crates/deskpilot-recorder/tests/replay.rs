use deskpilot_core::clock::Sleeper;
use deskpilot_core::{DesktopInput, Error, ErrorCode, MouseButton, Result, Screenshot};
use deskpilot_recorder::{EventData, RecordedEvent, Replayer, Workflow, WorkflowStorage};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct MockInput {
    calls: Mutex<Vec<String>>,
    fail_clicks: bool,
}

impl MockInput {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn push(&self, call: String) {
        self.calls.lock().push(call);
    }
}

impl DesktopInput for MockInput {
    fn click(&self, x: i32, y: i32, button: MouseButton) -> Result<()> {
        if self.fail_clicks {
            return Err(Error::interaction("click", "blocked"));
        }
        self.push(format!("click {} {} {}", x, y, button.as_str()));
        Ok(())
    }

    fn drag(&self, from: (i32, i32), to: (i32, i32)) -> Result<()> {
        self.push(format!("drag {:?} {:?}", from, to));
        Ok(())
    }

    fn scroll(&self, x: i32, y: i32, dx: i64, dy: i64) -> Result<()> {
        self.push(format!("scroll {} {} {} {}", x, y, dx, dy));
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<()> {
        self.push(format!("type {}", text));
        Ok(())
    }

    fn key_press(&self, key: &str) -> Result<()> {
        self.push(format!("key {}", key));
        Ok(())
    }

    fn key_combo(&self, keys: &[&str]) -> Result<()> {
        self.push(format!("combo {}", keys.join("+")));
        Ok(())
    }

    fn screenshot(&self) -> Result<Screenshot> {
        Ok(Screenshot::new(1, 1))
    }

    fn open_application(&self, name: &str) -> Result<()> {
        self.push(format!("open {}", name));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.lock().push(duration);
    }
}

fn event(data: EventData, timestamp: f64) -> RecordedEvent {
    RecordedEvent::new(data, timestamp)
}

fn replayer(input: Arc<MockInput>, sleeper: Arc<RecordingSleeper>) -> Replayer {
    Replayer::new(input).sleeper(sleeper)
}

#[test]
fn empty_workflow_returns_without_pausing() {
    let input = Arc::new(MockInput::default());
    let sleeper = Arc::new(RecordingSleeper::default());
    let report = replayer(input.clone(), sleeper.clone())
        .play(&Workflow::new("empty", 0.0, vec![]), 1.0)
        .unwrap();

    assert_eq!(report.events_total, 0);
    assert!(input.calls().is_empty());
    assert!(sleeper.slept.lock().is_empty());
}

#[test]
fn delays_scale_with_speed_and_are_capped() {
    let input = Arc::new(MockInput::default());
    let sleeper = Arc::new(RecordingSleeper::default());
    let workflow = Workflow::new(
        "timed",
        12.0,
        vec![
            event(EventData::MouseClick { x: 1, y: 2, button: MouseButton::Left }, 0.5),
            event(EventData::KeyPress { key: "a".into() }, 1.0),
            event(EventData::KeyPress { key: "b".into() }, 1.0),
            event(EventData::MouseScroll { x: 1, y: 2, dx: 0, dy: 5 }, 10.0),
        ],
    );

    let report = replayer(input, sleeper.clone()).play(&workflow, 2.0).unwrap();
    assert_eq!(report.events_played, 4);

    assert_eq!(
        *sleeper.slept.lock(),
        vec![
            Duration::from_secs(2),
            Duration::from_millis(250),
            Duration::from_millis(250),
            Duration::from_secs(2),
        ]
    );
}

#[test]
fn keys_are_typed_or_canonicalised() {
    let input = Arc::new(MockInput::default());
    let sleeper = Arc::new(RecordingSleeper::default());
    let workflow = Workflow::new(
        "keys",
        1.0,
        vec![
            event(EventData::KeyPress { key: "ctrl_l".into() }, 0.0),
            event(EventData::KeyPress { key: "A".into() }, 0.0),
            event(EventData::KeyPress { key: "esc".into() }, 0.0),
            event(EventData::MouseClick { x: 3, y: 4, button: MouseButton::Middle }, 0.0),
            event(EventData::MouseScroll { x: 3, y: 4, dx: -1, dy: 2 }, 0.0),
        ],
    );

    let report = replayer(input.clone(), sleeper).play(&workflow, 1.0).unwrap();
    assert_eq!((report.keys, report.clicks, report.scrolls), (3, 1, 1));
    assert_eq!(
        input.calls(),
        vec!["key ctrl", "type A", "key escape", "click 3 4 middle", "scroll 3 4 -1 2"]
    );
}

#[test]
fn failing_events_are_skipped() {
    let input = Arc::new(MockInput { fail_clicks: true, ..Default::default() });
    let sleeper = Arc::new(RecordingSleeper::default());
    let workflow = Workflow::new(
        "partial",
        1.0,
        vec![
            event(EventData::MouseClick { x: 1, y: 1, button: MouseButton::Left }, 0.1),
            event(EventData::KeyPress { key: "x".into() }, 0.2),
        ],
    );

    let report = replayer(input.clone(), sleeper).play(&workflow, 1.0).unwrap();
    assert_eq!(report.events_failed, 1);
    assert_eq!(report.events_played, 1);
    assert_eq!(input.calls(), vec!["type x"]);
}

#[test]
fn rejects_non_positive_speed() {
    let r = replayer(Arc::new(MockInput::default()), Arc::new(RecordingSleeper::default()));
    let w = Workflow::new("w", 0.0, vec![]);
    for speed in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        assert_eq!(r.play(&w, speed).unwrap_err().code, ErrorCode::InvalidAction);
    }
}

#[test]
fn replay_of_missing_workflow_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let storage = WorkflowStorage::with_dir(dir.path()).unwrap();
    let r = replayer(Arc::new(MockInput::default()), Arc::new(RecordingSleeper::default()));
    let err = r.replay(&storage, "nope_20240101_000000", 1.0).unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[test]
fn replay_from_storage() {
    let dir = tempfile::tempdir().unwrap();
    let storage = WorkflowStorage::with_dir(dir.path()).unwrap();
    let id = storage
        .save(&Workflow::new(
            "stored",
            1.0,
            vec![event(EventData::KeyPress { key: "enter".into() }, 0.3)],
        ))
        .unwrap();

    let input = Arc::new(MockInput::default());
    let report = replayer(input.clone(), Arc::new(RecordingSleeper::default()))
        .replay(&storage, &id, 1.0)
        .unwrap();
    assert_eq!(report.events_played, 1);
    assert_eq!(input.calls(), vec!["key enter"]);
}
