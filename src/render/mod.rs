//! Per-tick composition of the overlay.
//!
//! `RenderPipeline::tick` draws, in order: base frame, tint, detections with
//! their panels, noise, HUD and capture controls. It then applies queued
//! pointer actions and advances the capture machine with the composited
//! surface. The loading overlay goes last, on top, whenever the detector is
//! not ready.

pub mod canvas;
pub mod classify;
pub mod layers;
pub mod ui;

pub use canvas::{Canvas, Color, RasterCanvas, TextAlign, TextRun, TextStyle};
pub use classify::{Classification, PersonClassifier, UnknownClassifier};
pub use ui::{Button, ButtonLayout};

use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use crate::capture::{CaptureMachine, TickOutcome};
use crate::frame::{Frame, FrameSource};
use crate::geometry::{DisplayTransform, Rect};
use crate::stream::{DetectorStatus, SnapshotPublisher};

pub const DEFAULT_TINT_ALPHA: u8 = 38;
pub const DEFAULT_NOISE_STEP: u32 = 8;
pub const DEFAULT_NOISE_ALPHA_MIN: u8 = 6;
pub const DEFAULT_NOISE_ALPHA_MAX: u8 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSettings {
    pub tint_alpha: u8,
    pub noise_step: u32,
    pub noise_alpha_min: u8,
    pub noise_alpha_max: u8,
    /// Fixed seed for reproducible noise; entropy-seeded when `None`.
    pub noise_seed: Option<u64>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            tint_alpha: DEFAULT_TINT_ALPHA,
            noise_step: DEFAULT_NOISE_STEP,
            noise_alpha_min: DEFAULT_NOISE_ALPHA_MIN,
            noise_alpha_max: DEFAULT_NOISE_ALPHA_MAX,
            noise_seed: None,
        }
    }
}

/// Operator request waiting for the next tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerAction {
    ExportStill,
    StartRecording,
}

impl From<Button> for PointerAction {
    fn from(button: Button) -> Self {
        match button {
            Button::Png => PointerAction::ExportStill,
            Button::Gif => PointerAction::StartRecording,
        }
    }
}

/// What one tick did.
#[derive(Debug)]
pub struct TickReport {
    pub tick: u64,
    pub transform: DisplayTransform,
    /// Display-space boxes, in snapshot order.
    pub boxes: Vec<Rect>,
    pub panels: Vec<Rect>,
    pub snapshot_sequence: u64,
    pub still_exported: Option<PathBuf>,
    pub recording_started: bool,
    pub capture: TickOutcome,
    pub loading_overlay: bool,
}

type Clock = Box<dyn Fn() -> NaiveDateTime + Send>;

pub struct RenderPipeline {
    frames: Arc<dyn FrameSource>,
    detections: Arc<SnapshotPublisher>,
    capture: CaptureMachine,
    classifier: Box<dyn PersonClassifier>,
    settings: RenderSettings,
    rng: StdRng,
    clock: Clock,
    pending: VecDeque<PointerAction>,
    layout: Option<ButtonLayout>,
    last_frame: Option<Frame>,
    tick: u64,
}

impl RenderPipeline {
    pub fn new(
        frames: Arc<dyn FrameSource>,
        detections: Arc<SnapshotPublisher>,
        capture: CaptureMachine,
        settings: RenderSettings,
    ) -> Self {
        let rng = match settings.noise_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            frames,
            detections,
            capture,
            classifier: Box::new(UnknownClassifier),
            settings,
            rng,
            clock: Box::new(|| chrono::Local::now().naive_local()),
            pending: VecDeque::new(),
            layout: None,
            last_frame: None,
            tick: 0,
        }
    }

    pub fn with_classifier(mut self, classifier: Box<dyn PersonClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Replace the HUD clock, for reproducible output.
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn capture(&self) -> &CaptureMachine {
        &self.capture
    }

    pub fn capture_mut(&mut self) -> &mut CaptureMachine {
        &mut self.capture
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Queue an action directly, bypassing hit-testing.
    pub fn queue(&mut self, action: PointerAction) {
        self.pending.push_back(action);
    }

    /// Hit-test a press against the latest button layout. A hit is queued
    /// and takes effect during the next tick.
    pub fn pointer_pressed(&mut self, x: f32, y: f32) -> Option<PointerAction> {
        let layout = self.layout?;
        let action = PointerAction::from(layout.hit(x, y)?);
        log::debug!("pointer at ({x}, {y}) -> {action:?}");
        self.pending.push_back(action);
        Some(action)
    }

    pub fn tick(&mut self, canvas: &mut dyn Canvas) -> TickReport {
        self.tick += 1;
        let (sw, sh) = (canvas.width(), canvas.height());
        let layout = ButtonLayout::for_surface(sw, sh);
        self.layout = Some(layout);

        canvas.clear(Color::BLACK);

        match self.frames.current_frame() {
            Ok(frame) => self.last_frame = Some(frame),
            Err(err) => log::warn!("frame unavailable, reusing previous: {:#}", err),
        }
        let (fw, fh) = match &self.last_frame {
            Some(frame) => (frame.width, frame.height),
            None => (self.frames.width(), self.frames.height()),
        };
        let transform = DisplayTransform::fit(fw, fh, sw, sh);
        let status = self.detections.status();
        let snapshot = self.detections.current();

        let mut boxes = Vec::new();
        let mut panels = Vec::new();
        if transform.is_renderable() {
            let frame_rect = transform.frame_rect(fw, fh);
            if let Some(frame) = &self.last_frame {
                match frame.to_rgba_image() {
                    Ok(image) => canvas.draw_image(&image, frame_rect),
                    Err(err) => log::warn!("frame {} not drawable: {:#}", frame.sequence, err),
                }
            }
            layers::draw_tint(canvas, frame_rect, self.settings.tint_alpha);

            if status == DetectorStatus::Ready {
                for (index, detection) in snapshot.iter().enumerate() {
                    let class = self.classifier.classify(index, detection);
                    let display_box = transform.map_rect(detection.bounding_box);
                    layers::draw_detection(canvas, index, detection, display_box, class);
                    panels.push(layers::draw_info_panel(canvas, index, detection, class));
                    boxes.push(display_box);
                }
            }
        }

        layers::draw_noise(
            canvas,
            &mut self.rng,
            self.settings.noise_step,
            self.settings.noise_alpha_min,
            self.settings.noise_alpha_max,
        );
        layers::draw_hud(canvas, (self.clock)());
        layers::draw_capture_controls(
            canvas,
            &layout,
            self.capture.state(),
            self.capture.session(),
        );

        // Exports and recordings see the overlay scene, never the loading screen.
        let mut still_exported = None;
        let mut recording_started = false;
        while let Some(action) = self.pending.pop_front() {
            match action {
                PointerAction::ExportStill => {
                    still_exported = self.capture.request_still_export(canvas.surface()).ok();
                }
                PointerAction::StartRecording => {
                    recording_started |= self.capture.request_recording_start();
                }
            }
        }
        let capture = self.capture.on_tick(canvas.surface());

        let loading_overlay = status != DetectorStatus::Ready;
        if loading_overlay {
            layers::draw_loading(canvas, self.tick);
        }

        TickReport {
            tick: self.tick,
            transform,
            boxes,
            panels,
            snapshot_sequence: snapshot.sequence,
            still_exported,
            recording_started,
            capture,
            loading_overlay,
        }
    }
}
