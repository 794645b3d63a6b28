use anyhow::{anyhow, Result};
use image::RgbaImage;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use vigil_overlay::capture::{
    CaptureMachine, CaptureSettings, CaptureState, RecorderFactory, RecordingBackend,
    StillExporter, TickOutcome,
};

#[derive(Default)]
struct Calls {
    created: AtomicUsize,
    started: AtomicUsize,
    captured: AtomicUsize,
    stopped: AtomicUsize,
    saved: AtomicUsize,
}

struct MockBackend {
    calls: Arc<Calls>,
    fail_capture_at: Option<usize>,
}

impl RecordingBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn start(&mut self) -> Result<()> {
        self.calls.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn capture(&mut self, _surface: &RgbaImage) -> Result<()> {
        let n = self.calls.captured.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_capture_at == Some(n) {
            return Err(anyhow!("encoder out of memory"));
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.calls.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn save(&mut self) -> Result<PathBuf> {
        self.calls.saved.fetch_add(1, Ordering::SeqCst);
        Ok(PathBuf::from("capture.gif"))
    }
}

struct MockFactory {
    calls: Arc<Calls>,
    fail_capture_at: Option<usize>,
    /// Creation attempts beyond this count fail.
    max_creations: usize,
}

impl RecorderFactory for MockFactory {
    fn create(&self) -> Result<Box<dyn RecordingBackend>> {
        let n = self.calls.created.fetch_add(1, Ordering::SeqCst) + 1;
        if n > self.max_creations {
            return Err(anyhow!("recording library missing"));
        }
        Ok(Box::new(MockBackend {
            calls: self.calls.clone(),
            fail_capture_at: self.fail_capture_at,
        }))
    }
}

fn machine(fail_capture_at: Option<usize>, max_creations: usize) -> (CaptureMachine, Arc<Calls>) {
    let calls = Arc::new(Calls::default());
    let factory = MockFactory {
        calls: calls.clone(),
        fail_capture_at,
        max_creations,
    };
    let machine = CaptureMachine::new(CaptureSettings::default(), Some(Box::new(factory)), None);
    (machine, calls)
}

fn surface() -> RgbaImage {
    RgbaImage::new(16, 9)
}

#[test]
fn full_session_captures_budget_then_saves_once() {
    let (mut machine, calls) = machine(None, usize::MAX);
    assert_eq!(machine.state(), CaptureState::Idle);
    assert!(machine.request_recording_start());
    assert_eq!(machine.state(), CaptureState::Recording);

    let mut finished = None;
    for tick in 1..=150u32 {
        match machine.on_tick(&surface()) {
            TickOutcome::Captured(session) => {
                assert_eq!(session.frames_captured, tick);
                assert_eq!(session.frame_budget, 150);
            }
            TickOutcome::Finished { saved } => {
                assert_eq!(tick, 150);
                finished = saved;
            }
            other => panic!("unexpected outcome at tick {tick}: {other:?}"),
        }
    }

    assert_eq!(finished, Some(PathBuf::from("capture.gif")));
    assert_eq!(calls.captured.load(Ordering::SeqCst), 150);
    assert_eq!(calls.stopped.load(Ordering::SeqCst), 1);
    assert_eq!(calls.saved.load(Ordering::SeqCst), 1);
    // Probe at construction plus reinitialisation after the save.
    assert_eq!(calls.created.load(Ordering::SeqCst), 2);
    assert_eq!(machine.state(), CaptureState::Idle);

    assert_eq!(machine.on_tick(&surface()), TickOutcome::NotRecording);
    assert_eq!(calls.captured.load(Ordering::SeqCst), 150);
}

#[test]
fn start_while_recording_is_a_no_op() {
    let (mut machine, calls) = machine(None, usize::MAX);
    assert!(machine.request_recording_start());
    machine.on_tick(&surface());
    assert!(!machine.request_recording_start());

    let session = machine.session().expect("session");
    assert_eq!(session.frames_captured, 1);
    assert_eq!(calls.started.load(Ordering::SeqCst), 1);
}

#[test]
fn capture_failure_aborts_without_save() {
    let (mut machine, calls) = machine(Some(3), usize::MAX);
    assert!(machine.request_recording_start());
    assert!(matches!(machine.on_tick(&surface()), TickOutcome::Captured(_)));
    assert!(matches!(machine.on_tick(&surface()), TickOutcome::Captured(_)));
    assert_eq!(machine.on_tick(&surface()), TickOutcome::Aborted);

    assert_eq!(machine.state(), CaptureState::Idle);
    assert_eq!(calls.saved.load(Ordering::SeqCst), 0);
    assert_eq!(machine.on_tick(&surface()), TickOutcome::NotRecording);
}

#[test]
fn missing_backend_is_unavailable() {
    let (mut machine, calls) = machine(None, 0);
    assert_eq!(machine.state(), CaptureState::Unavailable);
    assert!(!machine.request_recording_start());
    assert_eq!(machine.on_tick(&surface()), TickOutcome::NotRecording);
    assert_eq!(calls.started.load(Ordering::SeqCst), 0);
}

#[test]
fn failed_reinitialisation_makes_recording_unavailable() {
    let calls = Arc::new(Calls::default());
    let factory = MockFactory {
        calls: calls.clone(),
        fail_capture_at: None,
        max_creations: 1,
    };
    let settings = CaptureSettings {
        fps: 2,
        duration_secs: 1,
    };
    let mut machine = CaptureMachine::new(settings, Some(Box::new(factory)), None);
    assert!(machine.request_recording_start());
    machine.on_tick(&surface());
    let outcome = machine.on_tick(&surface());
    assert!(matches!(outcome, TickOutcome::Finished { saved: Some(_) }));
    assert_eq!(machine.state(), CaptureState::Unavailable);
    assert!(!machine.request_recording_start());
}

#[test]
fn abandon_saves_only_when_asked() {
    let (mut machine, calls) = machine(None, usize::MAX);
    assert!(machine.request_recording_start());
    for _ in 0..10 {
        machine.on_tick(&surface());
    }
    assert_eq!(machine.abandon(false), None);
    assert_eq!(machine.state(), CaptureState::Idle);
    assert_eq!(calls.saved.load(Ordering::SeqCst), 0);

    assert!(machine.request_recording_start());
    for _ in 0..10 {
        machine.on_tick(&surface());
    }
    assert_eq!(machine.abandon(true), Some(PathBuf::from("capture.gif")));
    assert_eq!(calls.saved.load(Ordering::SeqCst), 1);
    assert_eq!(machine.state(), CaptureState::Idle);

    assert_eq!(machine.abandon(true), None, "nothing left to abandon");
}

struct CountingExporter {
    exports: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl StillExporter for CountingExporter {
    fn export(&mut self, surface: &RgbaImage) -> Result<PathBuf> {
        self.exports.lock().unwrap().push(surface.dimensions());
        Ok(PathBuf::from("screenshot.png"))
    }
}

#[test]
fn still_export_is_independent_of_recording() {
    let exports = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(Calls::default());
    let factory = MockFactory {
        calls: calls.clone(),
        fail_capture_at: None,
        max_creations: usize::MAX,
    };
    let mut machine = CaptureMachine::new(
        CaptureSettings::default(),
        Some(Box::new(factory)),
        Some(Box::new(CountingExporter {
            exports: exports.clone(),
        })),
    );

    assert!(machine.request_recording_start());
    machine.on_tick(&surface());
    let path = machine.request_still_export(&surface()).expect("export");
    assert_eq!(path, PathBuf::from("screenshot.png"));
    assert_eq!(machine.state(), CaptureState::Recording);
    assert_eq!(machine.session().map(|s| s.frames_captured), Some(1));
    assert_eq!(exports.lock().unwrap().as_slice(), &[(16, 9)]);
}
