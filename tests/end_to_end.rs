use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

use vigil_overlay::capture::{
    CaptureMachine, CaptureSettings, GifRecorderFactory, PngExporter, TickOutcome,
};
use vigil_overlay::detect::{Completion, DetectorSource, Normalizer, NormalizerConfig, PoseDetector};
use vigil_overlay::frame::{Frame, FrameSource};
use vigil_overlay::geometry::{Point, Rect};
use vigil_overlay::ingest::SyntheticCamera;
use vigil_overlay::render::{
    Canvas, Color, PointerAction, RasterCanvas, RenderPipeline, RenderSettings, TextStyle,
};
use vigil_overlay::stream::{DetectionStream, DEFAULT_REQUEST_TIMEOUT};

#[derive(Clone, Debug, PartialEq)]
enum Op {
    Clear,
    Image(Rect),
    Fill(Rect, Color),
    Stroke(Rect),
    Line,
    Text(String),
}

/// Raster canvas that also logs every draw call in order.
struct LoggingCanvas {
    inner: RasterCanvas,
    ops: Vec<Op>,
}

impl LoggingCanvas {
    fn new(width: u32, height: u32) -> Self {
        Self {
            inner: RasterCanvas::new(width, height),
            ops: Vec::new(),
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.inner.resize(width, height);
    }

    fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Canvas for LoggingCanvas {
    fn width(&self) -> u32 {
        self.inner.width()
    }

    fn height(&self) -> u32 {
        self.inner.height()
    }

    fn clear(&mut self, color: Color) {
        self.ops.clear();
        self.ops.push(Op::Clear);
        self.inner.clear(color);
    }

    fn draw_image(&mut self, image: &image::RgbaImage, dest: Rect) {
        self.ops.push(Op::Image(dest));
        self.inner.draw_image(image, dest);
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.ops.push(Op::Fill(rect, color));
        self.inner.fill_rect(rect, color);
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, weight: f32) {
        self.ops.push(Op::Stroke(rect));
        self.inner.stroke_rect(rect, color, weight);
    }

    fn line(&mut self, from: Point, to: Point, color: Color, weight: f32) {
        self.ops.push(Op::Line);
        self.inner.line(from, to, color, weight);
    }

    fn text(&mut self, text: &str, at: Point, style: TextStyle) {
        self.ops.push(Op::Text(text.to_string()));
        self.inner.text(text, at, style);
    }

    fn surface(&self) -> &image::RgbaImage {
        self.inner.surface()
    }
}

/// Answers every request with the same batch.
struct FixedDetector {
    batch: Value,
}

impl PoseDetector for FixedDetector {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn detect(&mut self, _frame: &Frame, completion: Completion) -> Result<()> {
        completion.deliver(self.batch.clone());
        Ok(())
    }
}

fn person(x: f32, y: f32) -> Value {
    json!({"keypoints": [
        {"x": x, "y": y, "score": 0.9},
        {"x": x + 100.0, "y": y, "score": 0.9},
        {"x": x + 50.0, "y": y + 200.0, "score": 0.9},
    ]})
}

fn fixed_clock() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 6)
        .and_then(|d| d.and_hms_opt(7, 8, 9))
        .expect("valid timestamp")
}

struct Harness {
    pipeline: RenderPipeline,
    _stream: DetectionStream,
}

fn harness(batch: Option<Value>, out: &Path, capture: CaptureSettings) -> Harness {
    let frames: Arc<dyn FrameSource> =
        Arc::new(SyntheticCamera::new("stub://e2e", 800, 600).expect("camera"));
    let detector = batch.map(|batch| DetectorSource::batch(FixedDetector { batch }));
    let has_detector = detector.is_some();
    let stream = DetectionStream::new(
        frames.clone(),
        detector,
        Normalizer::new(NormalizerConfig::default(), 800, 600),
        DEFAULT_REQUEST_TIMEOUT,
    );
    if has_detector {
        stream.poll_once().expect("poll");
    }

    let factory = GifRecorderFactory {
        output_dir: out.to_path_buf(),
        name: "capture".into(),
        fps: capture.fps,
        max_width: 200,
    };
    let machine = CaptureMachine::new(
        capture,
        Some(Box::new(factory)),
        Some(Box::new(PngExporter::new(out, "screenshot"))),
    );
    let settings = RenderSettings {
        noise_seed: Some(42),
        ..RenderSettings::default()
    };
    let pipeline = RenderPipeline::new(frames, stream.publisher(), machine, settings)
        .with_clock(fixed_clock);
    Harness {
        pipeline,
        _stream: stream,
    }
}

#[test]
fn boxes_line_up_with_the_scaled_frame() {
    let out = tempfile::tempdir().unwrap();
    let mut h = harness(
        Some(json!([person(100.0, 100.0)])),
        out.path(),
        CaptureSettings::default(),
    );
    let mut canvas = LoggingCanvas::new(1600, 900);
    let report = h.pipeline.tick(&mut canvas);

    assert_eq!(report.transform.scale, 1.5);
    assert_eq!(report.transform.offset_x, 200.0);
    assert_eq!(report.transform.offset_y, 0.0);
    assert!(canvas
        .ops
        .contains(&Op::Image(Rect::from_corners(200.0, 0.0, 1400.0, 900.0))));

    // Keypoint hull [100,200]x[100,300], padded by 40, then scaled and offset.
    assert_eq!(
        report.boxes,
        vec![Rect::from_corners(290.0, 90.0, 560.0, 510.0)]
    );
    assert!(canvas.ops.contains(&Op::Stroke(report.boxes[0])));
    assert!(canvas.texts().contains(&"PERSON_001 85%"));
    assert!(!report.loading_overlay);
}

#[test]
fn loading_overlay_is_drawn_last() {
    let out = tempfile::tempdir().unwrap();
    let mut h = harness(None, out.path(), CaptureSettings::default());
    let mut canvas = LoggingCanvas::new(800, 600);
    let report = h.pipeline.tick(&mut canvas);

    assert!(report.loading_overlay);
    assert!(report.boxes.is_empty());
    let overlay = canvas
        .ops
        .iter()
        .rposition(|op| {
            *op == Op::Fill(
                Rect::from_corners(0.0, 0.0, 800.0, 600.0),
                Color::rgba(0, 0, 0, 220),
            )
        })
        .expect("loading overlay drawn");
    let buttons = canvas
        .ops
        .iter()
        .rposition(|op| *op == Op::Text("GIF".into()))
        .expect("buttons drawn");
    assert!(buttons < overlay);
    assert!(canvas.ops[overlay + 1..]
        .iter()
        .all(|op| matches!(op, Op::Text(_))));
    assert!(canvas.texts().contains(&"INITIALIZING SYSTEM"));
}

#[test]
fn hud_uses_the_injected_clock() {
    let out = tempfile::tempdir().unwrap();
    let mut h = harness(Some(json!([])), out.path(), CaptureSettings::default());
    let mut canvas = LoggingCanvas::new(800, 600);
    h.pipeline.tick(&mut canvas);
    let texts = canvas.texts();
    assert!(texts.contains(&"2024-05-06"));
    assert!(texts.contains(&"07:08:09"));
    assert!(texts.contains(&"SURVEILLANCE SYSTEM"));
}

#[test]
fn panels_stay_inside_a_small_surface() {
    let out = tempfile::tempdir().unwrap();
    let people: Vec<Value> = (0..10)
        .map(|i| person(20.0 + i as f32 * 60.0, 100.0))
        .collect();
    let mut h = harness(Some(Value::Array(people)), out.path(), CaptureSettings::default());
    let mut canvas = LoggingCanvas::new(640, 360);
    let report = h.pipeline.tick(&mut canvas);

    assert_eq!(report.panels.len(), 10);
    for panel in &report.panels {
        assert!(panel.max_y <= 360.0, "panel below surface: {panel:?}");
    }
}

#[test]
fn png_button_follows_resize_and_exports_next_tick() {
    let out = tempfile::tempdir().unwrap();
    let mut h = harness(Some(json!([])), out.path(), CaptureSettings::default());
    let mut canvas = LoggingCanvas::new(800, 600);
    h.pipeline.tick(&mut canvas);

    assert_eq!(
        h.pipeline.pointer_pressed(50.0, 565.0),
        Some(PointerAction::ExportStill)
    );
    let report = h.pipeline.tick(&mut canvas);
    let path = report.still_exported.expect("still exported");
    assert_eq!(path, out.path().join("screenshot.png"));
    let image = image::open(&path).unwrap().to_rgba8();
    assert_eq!((image.width(), image.height()), (800, 600));
    assert!(image.pixels().all(|p| p[3] == 255), "exported still is opaque");

    canvas.resize(1280, 720);
    h.pipeline.tick(&mut canvas);
    assert_eq!(h.pipeline.pointer_pressed(50.0, 565.0), None);
    assert_eq!(
        h.pipeline.pointer_pressed(50.0, 685.0),
        Some(PointerAction::ExportStill)
    );
}

#[test]
fn still_taken_while_loading_omits_the_loading_screen() {
    let out = tempfile::tempdir().unwrap();
    let mut h = harness(None, out.path(), CaptureSettings::default());
    let mut canvas = LoggingCanvas::new(800, 600);
    h.pipeline.tick(&mut canvas);

    h.pipeline.queue(PointerAction::ExportStill);
    let report = h.pipeline.tick(&mut canvas);
    assert!(report.loading_overlay);
    let exported = image::open(report.still_exported.expect("still exported"))
        .unwrap()
        .to_rgba8();

    // The visible surface is dimmed by the overlay; the export is not.
    assert_ne!(exported.as_raw(), canvas.surface().as_raw());
    let brightness = |img: &image::RgbaImage| -> u64 {
        img.pixels().map(|p| p[0] as u64 + p[1] as u64 + p[2] as u64).sum()
    };
    assert!(brightness(&exported) > brightness(canvas.surface()));
}

#[test]
fn gif_button_records_a_bounded_capture() {
    let out = tempfile::tempdir().unwrap();
    let settings = CaptureSettings {
        fps: 2,
        duration_secs: 1,
    };
    let mut h = harness(Some(json!([person(100.0, 100.0)])), out.path(), settings);
    let mut canvas = LoggingCanvas::new(800, 600);
    h.pipeline.tick(&mut canvas);

    assert_eq!(
        h.pipeline.pointer_pressed(100.0, 565.0),
        Some(PointerAction::StartRecording)
    );
    let first = h.pipeline.tick(&mut canvas);
    assert!(first.recording_started);
    assert!(matches!(first.capture, TickOutcome::Captured(_)));

    let second = h.pipeline.tick(&mut canvas);
    assert!(canvas.texts().contains(&"REC 1/2"));
    assert_eq!(
        second.capture,
        TickOutcome::Finished {
            saved: Some(out.path().join("capture.gif"))
        }
    );

    let third = h.pipeline.tick(&mut canvas);
    assert_eq!(third.capture, TickOutcome::NotRecording);
    assert!(!canvas.texts().iter().any(|t| t.starts_with("REC")));
    assert!(out.path().join("capture.gif").exists());
}

#[test]
fn seeded_noise_is_reproducible() {
    let out = tempfile::tempdir().unwrap();
    let mut a = harness(None, out.path(), CaptureSettings::default());
    let mut b = harness(None, out.path(), CaptureSettings::default());
    let mut ca = RasterCanvas::new(320, 240);
    let mut cb = RasterCanvas::new(320, 240);
    a.pipeline.tick(&mut ca);
    b.pipeline.tick(&mut cb);
    assert_eq!(ca.surface().as_raw(), cb.surface().as_raw());
}
