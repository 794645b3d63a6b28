use anyhow::Result;
use image::RgbaImage;
use std::path::PathBuf;

/// Multi-frame recorder for the composited surface.
///
/// A backend must accept `start` again after an aborted session (one that never
/// reached `save`). After `save`, the capture machine discards it and asks the
/// factory for a fresh one.
pub trait RecordingBackend: Send {
    fn name(&self) -> &'static str;

    fn start(&mut self) -> Result<()>;

    /// Append one composited frame.
    fn capture(&mut self, surface: &RgbaImage) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Write the artifact; returns its path.
    fn save(&mut self) -> Result<PathBuf>;
}

/// Creates recording backends. Called once at startup to probe availability,
/// and again after every save.
pub trait RecorderFactory: Send {
    fn create(&self) -> Result<Box<dyn RecordingBackend>>;
}

/// Single-image export of the composited surface to a fixed destination.
pub trait StillExporter: Send {
    fn export(&mut self, surface: &RgbaImage) -> Result<PathBuf>;
}
