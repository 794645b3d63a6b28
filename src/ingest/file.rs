//! Local still-image source.
//!
//! Serves one decoded image as a static camera. Useful for replaying a scene
//! through the overlay without a device. The file is decoded once at open; the
//! source never touches the network or writes to disk.

use anyhow::{Context, Result};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::frame::{Frame, FrameSource};

pub struct ImageFileSource {
    name: String,
    path: PathBuf,
    image: RgbaImage,
    frame_count: AtomicU64,
}

impl ImageFileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .with_context(|| format!("failed to decode image {}", path.display()))?
            .to_rgba8();
        log::info!(
            "ImageFileSource: loaded {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        Ok(Self {
            name: path.display().to_string(),
            path: path.to_path_buf(),
            image,
            frame_count: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for ImageFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn current_frame(&self) -> Result<Frame> {
        let sequence = self.frame_count.fetch_add(1, Ordering::Relaxed) + 1;
        Frame::new(
            self.image.as_raw().clone(),
            self.image.width(),
            self.image.height(),
            sequence,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serves_decoded_png() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("scene.png");
        RgbaImage::from_pixel(5, 4, image::Rgba([9, 8, 7, 255])).save(&path)?;

        let source = ImageFileSource::open(&path)?;
        assert_eq!((source.width(), source.height()), (5, 4));
        let frame = source.current_frame()?;
        assert_eq!(&frame.pixels()[..4], &[9, 8, 7, 255]);
        assert_eq!(source.current_frame()?.sequence, 2);
        Ok(())
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ImageFileSource::open("/nonexistent/scene.png")
            .err()
            .expect("open should fail");
        assert!(err.to_string().contains("scene.png"));
    }
}
