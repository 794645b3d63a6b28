//! Vigil overlay
//!
//! Renders a live camera feed with detected-person bounding boxes, per-person
//! info panels, a HUD and cosmetic layers, and lets the operator export a still
//! or a fixed-length animated capture of the composite.
//!
//! # Architecture
//!
//! The core reconciles an asynchronous, loosely-typed and possibly missing
//! detection stream with a fixed-rate render loop:
//!
//! 1. **Normalize before publish**: raw detector output is normalized in full,
//!    then swapped in as one immutable snapshot. The renderer never sees a
//!    partially updated sequence.
//! 2. **Newest request wins**: results from older requests are discarded.
//! 3. **One transform**: every overlay element is positioned through the same
//!    `DisplayTransform` as the video.
//! 4. **Bounded capture**: a recording session captures once per tick and
//!    ends itself at `fps * duration` frames.
//!
//! # Module Structure
//!
//! - `geometry`: aspect-fit transform, points and rectangles
//! - `frame`, `ingest`: camera frames and bundled sources
//! - `detect`: raw detector output, normalization, detector traits and stubs
//! - `stream`: snapshot publisher and polling controller
//! - `capture`: still export and the recording state machine
//! - `render`: canvas, layers, buttons and the per-tick pipeline
//! - `config`: file and environment configuration

pub mod capture;
pub mod config;
pub mod detect;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod render;
pub mod stream;

pub use capture::{
    CaptureMachine, CaptureSession, CaptureSettings, CaptureState, GifRecorderFactory,
    PngExporter, RecorderFactory, RecordingBackend, StillExporter, TickOutcome,
};
pub use config::OverlayConfig;
pub use detect::{
    DetectorSource, Normalizer, NormalizerConfig, PersonDetection, PoseDetector,
    PoseEventSource, RawBatch, RawDetection, StubPoseDetector, StubPoseEmitter,
};
pub use frame::{Frame, FrameSource};
pub use geometry::{DisplayTransform, Point, Rect};
pub use ingest::{open_source, ImageFileSource, SyntheticCamera};
pub use render::{
    Canvas, PointerAction, RasterCanvas, RenderPipeline, RenderSettings, TickReport,
};
pub use stream::{DetectionSnapshot, DetectionStream, DetectorStatus, SnapshotPublisher};
