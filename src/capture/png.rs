use anyhow::{Context, Result};
use image::{ImageFormat, RgbaImage};
use std::path::PathBuf;

use super::backend::StillExporter;

/// Writes the surface to `<output_dir>/<name>.png`, overwriting previous exports.
#[derive(Clone, Debug)]
pub struct PngExporter {
    path: PathBuf,
}

impl PngExporter {
    pub fn new(output_dir: impl Into<PathBuf>, name: &str) -> Self {
        Self {
            path: output_dir.into().join(format!("{name}.png")),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl StillExporter for PngExporter {
    fn export(&mut self, surface: &RgbaImage) -> Result<PathBuf> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating output dir {}", dir.display()))?;
        }
        surface
            .save_with_format(&self.path, ImageFormat::Png)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(self.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exports_fixed_name() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut exporter = PngExporter::new(dir.path(), "screenshot");
        let surface = RgbaImage::from_pixel(4, 4, image::Rgba([0, 255, 0, 255]));
        let path = exporter.export(&surface)?;
        assert_eq!(path, dir.path().join("screenshot.png"));

        let decoded = image::open(&path)?.to_rgba8();
        assert_eq!(decoded.get_pixel(3, 3).0, [0, 255, 0, 255]);
        Ok(())
    }
}
