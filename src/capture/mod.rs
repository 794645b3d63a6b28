//! Still export and fixed-length recording of the composited surface.
//!
//! `CaptureMachine` is driven from the render loop: `on_tick` is called once per
//! tick after compositing, and while recording it appends exactly one frame.
//! A session ends on its own once `fps * duration_secs` frames are captured.

pub mod backend;
pub mod gif;
pub mod png;

pub use backend::{RecorderFactory, RecordingBackend, StillExporter};
pub use gif::{GifRecorder, GifRecorderFactory};
pub use png::PngExporter;

use anyhow::{anyhow, Result};
use image::RgbaImage;
use std::path::PathBuf;

pub const DEFAULT_CAPTURE_FPS: u32 = 30;
pub const DEFAULT_CAPTURE_SECS: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureSettings {
    pub fps: u32,
    pub duration_secs: u32,
}

impl CaptureSettings {
    /// Frames in one complete session.
    pub fn frame_budget(&self) -> u32 {
        self.fps.saturating_mul(self.duration_secs).max(1)
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            fps: DEFAULT_CAPTURE_FPS,
            duration_secs: DEFAULT_CAPTURE_SECS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    /// No recording backend could be created.
    Unavailable,
    Idle,
    Recording,
}

/// Progress of the active recording.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureSession {
    pub frames_captured: u32,
    pub frame_budget: u32,
}

impl CaptureSession {
    pub fn is_complete(&self) -> bool {
        self.frames_captured >= self.frame_budget
    }
}

/// Result of one `on_tick`.
#[derive(Debug, PartialEq, Eq)]
pub enum TickOutcome {
    NotRecording,
    Captured(CaptureSession),
    /// Budget reached. `saved` is `None` when stop or save failed.
    Finished { saved: Option<PathBuf> },
    /// Backend failed mid-session; nothing was saved.
    Aborted,
}

pub struct CaptureMachine {
    settings: CaptureSettings,
    factory: Option<Box<dyn RecorderFactory>>,
    backend: Option<Box<dyn RecordingBackend>>,
    still: Option<Box<dyn StillExporter>>,
    session: Option<CaptureSession>,
}

impl CaptureMachine {
    /// Probes recording support by creating the first backend.
    pub fn new(
        settings: CaptureSettings,
        factory: Option<Box<dyn RecorderFactory>>,
        still: Option<Box<dyn StillExporter>>,
    ) -> Self {
        let mut machine = Self {
            settings,
            factory,
            backend: None,
            still,
            session: None,
        };
        machine.reinitialize();
        if let Some(backend) = &machine.backend {
            log::info!(
                "recording backend '{}' ready ({} frames per session)",
                backend.name(),
                settings.frame_budget()
            );
        }
        machine
    }

    pub fn settings(&self) -> CaptureSettings {
        self.settings
    }

    pub fn state(&self) -> CaptureState {
        match (&self.backend, &self.session) {
            (None, _) => CaptureState::Unavailable,
            (Some(_), Some(_)) => CaptureState::Recording,
            (Some(_), None) => CaptureState::Idle,
        }
    }

    pub fn session(&self) -> Option<CaptureSession> {
        self.session
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    pub fn can_export_still(&self) -> bool {
        self.still.is_some()
    }

    /// Export the current surface as a single image. Independent of recording.
    pub fn request_still_export(&mut self, surface: &RgbaImage) -> Result<PathBuf> {
        let exporter = self
            .still
            .as_mut()
            .ok_or_else(|| anyhow!("still export unavailable"))?;
        match exporter.export(surface) {
            Ok(path) => {
                log::info!("screenshot saved to {}", path.display());
                Ok(path)
            }
            Err(err) => {
                log::warn!("screenshot export failed: {:#}", err);
                Err(err)
            }
        }
    }

    /// Begin a session. Returns `false` (and changes nothing) when unavailable
    /// or already recording.
    pub fn request_recording_start(&mut self) -> bool {
        if self.session.is_some() {
            log::debug!("recording already in progress");
            return false;
        }
        let Some(backend) = self.backend.as_mut() else {
            log::warn!("recording unavailable");
            return false;
        };
        if let Err(err) = backend.start() {
            log::warn!("recording start failed: {:#}", err);
            return false;
        }
        let frame_budget = self.settings.frame_budget();
        log::info!("recording started ({} frames)", frame_budget);
        self.session = Some(CaptureSession {
            frames_captured: 0,
            frame_budget,
        });
        true
    }

    /// Capture this tick's composited surface if recording.
    pub fn on_tick(&mut self, surface: &RgbaImage) -> TickOutcome {
        let (Some(session), Some(backend)) = (self.session.as_mut(), self.backend.as_mut()) else {
            return TickOutcome::NotRecording;
        };

        if let Err(err) = backend.capture(surface) {
            log::warn!(
                "recording aborted after {} frames: {:#}",
                session.frames_captured,
                err
            );
            self.session = None;
            // The failed backend's partial output is never saved.
            self.reinitialize();
            return TickOutcome::Aborted;
        }

        session.frames_captured += 1;
        let progress = *session;
        if !progress.is_complete() {
            return TickOutcome::Captured(progress);
        }

        let saved = self.finish(true);
        TickOutcome::Finished { saved }
    }

    /// Leave an active session early (for example on shutdown). With
    /// `save_partial`, the frames captured so far are written out.
    pub fn abandon(&mut self, save_partial: bool) -> Option<PathBuf> {
        let session = self.session?;
        log::info!(
            "abandoning recording at {}/{} frames",
            session.frames_captured,
            session.frame_budget
        );
        if save_partial && session.frames_captured > 0 {
            return self.finish(true);
        }
        self.finish(false)
    }

    fn finish(&mut self, save: bool) -> Option<PathBuf> {
        self.session = None;
        let backend = self.backend.as_mut()?;
        let saved = if let Err(err) = backend.stop() {
            log::warn!("recording stop failed: {:#}", err);
            None
        } else if !save {
            None
        } else {
            match backend.save() {
                Ok(path) => {
                    log::info!("recording saved to {}", path.display());
                    Some(path)
                }
                Err(err) => {
                    log::warn!("recording save failed: {:#}", err);
                    None
                }
            }
        };
        // Backends are single-use after save, and an unsaved one is discarded
        // along with its partial output.
        self.reinitialize();
        saved
    }

    fn reinitialize(&mut self) {
        self.backend = None;
        let Some(factory) = &self.factory else {
            log::info!("no recording backend configured");
            return;
        };
        match factory.create() {
            Ok(backend) => self.backend = Some(backend),
            Err(err) => log::warn!("recording backend unavailable: {:#}", err),
        }
    }
}
