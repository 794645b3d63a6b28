use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::frame::{Frame, FrameSource, RGBA_CHANNELS};

/// Synthetic camera for `stub://` URLs.
///
/// Produces a diagonal gradient that drifts by one pixel per frame, with a
/// scene change every 50 frames so downstream layers have something to show.
pub struct SyntheticCamera {
    url: String,
    width: u32,
    height: u32,
    frame_count: AtomicU64,
}

impl SyntheticCamera {
    pub fn new(url: &str, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("synthetic camera needs non-zero dimensions"));
        }
        log::info!("SyntheticCamera: connected to {} ({}x{})", url, width, height);
        Ok(Self {
            url: url.to_string(),
            width,
            height,
            frame_count: AtomicU64::new(0),
        })
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count.load(Ordering::Relaxed)
    }

    fn generate_pixels(&self, frame_count: u64) -> Vec<u8> {
        let w = self.width as usize;
        let h = self.height as usize;
        let scene_state = (frame_count / 50) as u8;
        let mut pixels = vec![0u8; w * h * RGBA_CHANNELS];
        for (i, px) in pixels.chunks_exact_mut(RGBA_CHANNELS).enumerate() {
            let x = (i % w) as u64;
            let y = (i / w) as u64;
            let v = ((x + y + frame_count) % 256) as u8;
            px[0] = v / 4;
            px[1] = v / 2;
            px[2] = v.wrapping_add(scene_state.wrapping_mul(40)) / 3;
            px[3] = 255;
        }
        pixels
    }
}

impl FrameSource for SyntheticCamera {
    fn name(&self) -> &str {
        &self.url
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn current_frame(&self) -> Result<Frame> {
        let frame_count = self.frame_count.fetch_add(1, Ordering::Relaxed) + 1;
        let pixels = self.generate_pixels(frame_count);
        Frame::new(pixels, self.width, self.height, frame_count)
    }
}
