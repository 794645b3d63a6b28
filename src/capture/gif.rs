//! Animated GIF recording via `image`'s GIF codec.
//!
//! Frames are encoded as they arrive into `<name>.gif.part` and renamed to
//! `<name>.gif` on save, so an aborted session never leaves a file that looks
//! finished. Frames wider than `max_width` are downscaled first.

use anyhow::{anyhow, bail, Context, Result};
use image::codecs::gif::{GifEncoder, Repeat};
use image::imageops::FilterType;
use image::{Delay, RgbaImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use super::backend::{RecorderFactory, RecordingBackend};

/// Encoder speed, 1 (best quality) to 30 (fastest).
const GIF_SPEED: i32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RecorderState {
    Ready,
    Recording,
    Stopped,
    /// Saved once; this instance cannot be reused.
    Spent,
}

pub struct GifRecorder {
    output_path: PathBuf,
    part_path: PathBuf,
    fps: u32,
    max_width: u32,
    encoder: Option<GifEncoder<BufWriter<File>>>,
    frames: u32,
    state: RecorderState,
}

impl GifRecorder {
    pub fn new(output_dir: &Path, name: &str, fps: u32, max_width: u32) -> Self {
        let output_path = output_dir.join(format!("{name}.gif"));
        let part_path = output_dir.join(format!("{name}.gif.part"));
        Self {
            output_path,
            part_path,
            fps: fps.max(1),
            max_width,
            encoder: None,
            frames: 0,
            state: RecorderState::Ready,
        }
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    fn scaled<'a>(&self, surface: &'a RgbaImage) -> std::borrow::Cow<'a, RgbaImage> {
        let (w, h) = surface.dimensions();
        if self.max_width == 0 || w <= self.max_width {
            return std::borrow::Cow::Borrowed(surface);
        }
        let scaled_h = ((h as u64 * self.max_width as u64) / w as u64).max(1) as u32;
        std::borrow::Cow::Owned(image::imageops::resize(
            surface,
            self.max_width,
            scaled_h,
            FilterType::Triangle,
        ))
    }
}

impl RecordingBackend for GifRecorder {
    fn name(&self) -> &'static str {
        "gif"
    }

    fn start(&mut self) -> Result<()> {
        if self.state == RecorderState::Spent {
            bail!("gif recorder already saved {}", self.output_path.display());
        }
        // Drop any encoder left over from an aborted session before truncating.
        self.encoder = None;
        let file = File::create(&self.part_path)
            .with_context(|| format!("creating {}", self.part_path.display()))?;
        let mut encoder = GifEncoder::new_with_speed(BufWriter::new(file), GIF_SPEED);
        encoder.set_repeat(Repeat::Infinite)?;
        self.encoder = Some(encoder);
        self.frames = 0;
        self.state = RecorderState::Recording;
        Ok(())
    }

    fn capture(&mut self, surface: &RgbaImage) -> Result<()> {
        let frame = self.scaled(surface).into_owned();
        let delay = Delay::from_numer_denom_ms(1000, self.fps);
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| anyhow!("gif recorder is not recording"))?;
        encoder
            .encode_frame(image::Frame::from_parts(frame, 0, 0, delay))
            .context("encoding gif frame")?;
        self.frames += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.state != RecorderState::Recording {
            bail!("gif recorder is not recording");
        }
        // Dropping the encoder writes the GIF trailer and flushes the file.
        self.encoder = None;
        self.state = RecorderState::Stopped;
        Ok(())
    }

    fn save(&mut self) -> Result<PathBuf> {
        if self.state != RecorderState::Stopped {
            bail!("gif recorder must be stopped before saving");
        }
        if self.frames == 0 {
            bail!("no frames captured");
        }
        std::fs::rename(&self.part_path, &self.output_path).with_context(|| {
            format!(
                "moving {} to {}",
                self.part_path.display(),
                self.output_path.display()
            )
        })?;
        self.state = RecorderState::Spent;
        Ok(self.output_path.clone())
    }
}

impl Drop for GifRecorder {
    fn drop(&mut self) {
        if !matches!(self.state, RecorderState::Recording | RecorderState::Stopped) {
            return;
        }
        self.encoder = None;
        if let Err(err) = std::fs::remove_file(&self.part_path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                log::warn!("could not remove {}: {}", self.part_path.display(), err);
            }
        }
    }
}

/// Creates [`GifRecorder`]s in a fixed output directory.
#[derive(Clone, Debug)]
pub struct GifRecorderFactory {
    pub output_dir: PathBuf,
    pub name: String,
    pub fps: u32,
    pub max_width: u32,
}

impl RecorderFactory for GifRecorderFactory {
    fn create(&self) -> Result<Box<dyn RecordingBackend>> {
        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("creating output dir {}", self.output_dir.display()))?;
        Ok(Box::new(GifRecorder::new(
            &self.output_dir,
            &self.name,
            self.fps,
            self.max_width,
        )))
    }
}
