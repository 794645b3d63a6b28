//! Camera frames and the frame-provider boundary.
//!
//! - `Frame`: RGBA pixel container with fixed dimensions and a capture sequence number.
//! - `FrameSource`: read-only provider of the "current frame" at a fixed native resolution.
//!
//! The render tick and the detection poller both read from the same source, from
//! different threads, so sources must be `Send + Sync` and must never hand out a
//! partially written frame.

use anyhow::{anyhow, Result};
use image::RgbaImage;

/// Bytes per RGBA pixel.
pub const RGBA_CHANNELS: usize = 4;

/// One camera frame. Pixels are tightly packed RGBA8, row-major.
#[derive(Clone)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Monotonic per-source counter.
    pub sequence: u64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = expected_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGBA frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            sequence,
        })
    }

    /// Solid-colour frame, handy for sources that have nothing to show yet.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4], sequence: u64) -> Result<Self> {
        let len = expected_len(width, height)?;
        let data = rgba.iter().copied().cycle().take(len).collect();
        Self::new(data, width, height, sequence)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Copy into an `image` buffer for blitting or encoding.
    pub fn to_rgba_image(&self) -> Result<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", self.width, self.height))
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

fn expected_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(RGBA_CHANNELS))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

/// Opaque camera: fixed native resolution plus a "current frame" accessor.
///
/// Implementations must not be mutated by the overlay core; `current_frame`
/// takes `&self` and any internal counters use interior mutability.
pub trait FrameSource: Send + Sync {
    /// Source identifier for logs.
    fn name(&self) -> &str;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Latest frame available from the device.
    fn current_frame(&self) -> Result<Frame>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_wrong_length() {
        assert!(Frame::new(vec![0u8; 10], 2, 2, 0).is_err());
        assert!(Frame::new(vec![0u8; 16], 2, 2, 0).is_ok());
    }

    #[test]
    fn filled_frame_converts_to_image() -> Result<()> {
        let frame = Frame::filled(3, 2, [1, 2, 3, 255], 7)?;
        let img = frame.to_rgba_image()?;
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 1).0, [1, 2, 3, 255]);
        assert_eq!(frame.sequence, 7);
        Ok(())
    }
}
