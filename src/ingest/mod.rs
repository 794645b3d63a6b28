//! Frame sources.
//!
//! - `stub://<name>`: synthetic moving test pattern (no device needed)
//! - local image path: a still image served as a static camera
//!
//! Sources produce `Frame` values at a fixed native resolution. URL schemes other
//! than `stub://` are refused; device capture is provided by the host.

pub mod file;
pub mod synthetic;

use anyhow::{anyhow, Result};
use std::sync::Arc;

use crate::frame::FrameSource;

pub use file::ImageFileSource;
pub use synthetic::SyntheticCamera;

/// Open a frame source from a configured URL or path.
pub fn open_source(url: &str, width: u32, height: u32) -> Result<Arc<dyn FrameSource>> {
    if url.starts_with("stub://") {
        return Ok(Arc::new(SyntheticCamera::new(url, width, height)?));
    }
    if !is_local_file_path(url) {
        return Err(anyhow!(
            "unsupported camera url '{}': only stub:// and local image paths are supported",
            url
        ));
    }
    Ok(Arc::new(ImageFileSource::open(url)?))
}

fn is_local_file_path(path: &str) -> bool {
    !path.trim().is_empty() && !path.contains("://")
}
