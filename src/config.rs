use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::capture::{CaptureSettings, DEFAULT_CAPTURE_FPS, DEFAULT_CAPTURE_SECS};
use crate::detect::{
    NormalizerConfig, DEFAULT_BOX_PADDING, DEFAULT_CONFIDENCE, DEFAULT_KEYPOINT_THRESHOLD,
    DEFAULT_MIN_KEYPOINTS,
};
use crate::render::{
    RenderSettings, DEFAULT_NOISE_ALPHA_MAX, DEFAULT_NOISE_ALPHA_MIN, DEFAULT_NOISE_STEP,
    DEFAULT_TINT_ALPHA,
};

const DEFAULT_CAMERA_URL: &str = "stub://camera";
const DEFAULT_CAMERA_WIDTH: u32 = 800;
const DEFAULT_CAMERA_HEIGHT: u32 = 600;
const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 2000;
const DEFAULT_OUTPUT_DIR: &str = ".";
const DEFAULT_CAPTURE_MAX_WIDTH: u32 = 480;
const DEFAULT_SURFACE_WIDTH: u32 = 1280;
const DEFAULT_SURFACE_HEIGHT: u32 = 720;
const DEFAULT_TICK_HZ: u32 = 30;

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    camera: Option<CameraConfigFile>,
    detection: Option<DetectionConfigFile>,
    capture: Option<CaptureConfigFile>,
    render: Option<RenderConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    poll_interval_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    keypoint_threshold: Option<f32>,
    min_keypoints: Option<usize>,
    box_padding: Option<f32>,
    default_confidence: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    fps: Option<u32>,
    duration_secs: Option<u32>,
    output_dir: Option<PathBuf>,
    max_width: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct RenderConfigFile {
    surface_width: Option<u32>,
    surface_height: Option<u32>,
    tick_hz: Option<u32>,
    noise_step: Option<u32>,
    noise_alpha_min: Option<u8>,
    noise_alpha_max: Option<u8>,
    tint_alpha: Option<u8>,
    noise_seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct OverlayConfig {
    pub camera: CameraSettings,
    pub detection: DetectionSettings,
    pub capture: CaptureOutputSettings,
    pub render: SurfaceSettings,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub normalizer: NormalizerConfig,
}

#[derive(Debug, Clone)]
pub struct CaptureOutputSettings {
    pub settings: CaptureSettings,
    pub output_dir: PathBuf,
    /// GIF frames wider than this are downscaled; 0 keeps full size.
    pub max_width: u32,
}

#[derive(Debug, Clone)]
pub struct SurfaceSettings {
    pub width: u32,
    pub height: u32,
    pub tick_hz: u32,
    pub layers: RenderSettings,
}

impl SurfaceSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_hz.max(1) as f64)
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self::from_file(OverlayConfigFile::default())
    }
}

impl OverlayConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("VIGIL_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: OverlayConfigFile) -> Self {
        let camera = file.camera.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        let capture = file.capture.unwrap_or_default();
        let render = file.render.unwrap_or_default();

        Self {
            camera: CameraSettings {
                url: camera
                    .url
                    .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
                width: camera.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
            },
            detection: DetectionSettings {
                poll_interval: Duration::from_millis(
                    detection
                        .poll_interval_ms
                        .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
                ),
                request_timeout: Duration::from_millis(
                    detection
                        .request_timeout_ms
                        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
                ),
                normalizer: NormalizerConfig {
                    keypoint_threshold: detection
                        .keypoint_threshold
                        .unwrap_or(DEFAULT_KEYPOINT_THRESHOLD),
                    min_keypoints: detection.min_keypoints.unwrap_or(DEFAULT_MIN_KEYPOINTS),
                    box_padding: detection.box_padding.unwrap_or(DEFAULT_BOX_PADDING),
                    default_confidence: detection
                        .default_confidence
                        .unwrap_or(DEFAULT_CONFIDENCE),
                },
            },
            capture: CaptureOutputSettings {
                settings: CaptureSettings {
                    fps: capture.fps.unwrap_or(DEFAULT_CAPTURE_FPS),
                    duration_secs: capture.duration_secs.unwrap_or(DEFAULT_CAPTURE_SECS),
                },
                output_dir: capture
                    .output_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
                max_width: capture.max_width.unwrap_or(DEFAULT_CAPTURE_MAX_WIDTH),
            },
            render: SurfaceSettings {
                width: render.surface_width.unwrap_or(DEFAULT_SURFACE_WIDTH),
                height: render.surface_height.unwrap_or(DEFAULT_SURFACE_HEIGHT),
                tick_hz: render.tick_hz.unwrap_or(DEFAULT_TICK_HZ),
                layers: RenderSettings {
                    tint_alpha: render.tint_alpha.unwrap_or(DEFAULT_TINT_ALPHA),
                    noise_step: render.noise_step.unwrap_or(DEFAULT_NOISE_STEP),
                    noise_alpha_min: render.noise_alpha_min.unwrap_or(DEFAULT_NOISE_ALPHA_MIN),
                    noise_alpha_max: render.noise_alpha_max.unwrap_or(DEFAULT_NOISE_ALPHA_MAX),
                    noise_seed: render.noise_seed,
                },
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("VIGIL_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera.url = url;
            }
        }
        if let Some(ms) = env_number::<u64>("VIGIL_POLL_INTERVAL_MS")? {
            self.detection.poll_interval = Duration::from_millis(ms);
        }
        if let Ok(dir) = std::env::var("VIGIL_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.capture.output_dir = PathBuf::from(dir);
            }
        }
        if let Some(fps) = env_number::<u32>("VIGIL_CAPTURE_FPS")? {
            self.capture.settings.fps = fps;
        }
        if let Some(secs) = env_number::<u32>("VIGIL_CAPTURE_SECS")? {
            self.capture.settings.duration_secs = secs;
        }
        if let Some(seed) = env_number::<u64>("VIGIL_NOISE_SEED")? {
            self.render.layers.noise_seed = Some(seed);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera dimensions must be greater than zero"));
        }
        if self.render.width == 0 || self.render.height == 0 {
            return Err(anyhow!("surface dimensions must be greater than zero"));
        }
        if self.render.tick_hz == 0 {
            return Err(anyhow!("render tick_hz must be greater than zero"));
        }
        if self.detection.poll_interval.is_zero() {
            return Err(anyhow!("detection poll interval must be greater than zero"));
        }
        let normalizer = &self.detection.normalizer;
        if !(0.0..=1.0).contains(&normalizer.keypoint_threshold) {
            return Err(anyhow!("keypoint_threshold must be within [0, 1]"));
        }
        if normalizer.min_keypoints == 0 {
            return Err(anyhow!("min_keypoints must be at least 1"));
        }
        if !normalizer.box_padding.is_finite() || normalizer.box_padding < 0.0 {
            return Err(anyhow!("box_padding must be a non-negative number"));
        }
        if self.capture.settings.fps == 0 || self.capture.settings.duration_secs == 0 {
            return Err(anyhow!("capture fps and duration must be greater than zero"));
        }
        let layers = &self.render.layers;
        if layers.noise_step == 0 {
            return Err(anyhow!("noise_step must be greater than zero"));
        }
        if layers.noise_alpha_min > layers.noise_alpha_max {
            return Err(anyhow!("noise_alpha_min must not exceed noise_alpha_max"));
        }
        Ok(())
    }
}

fn env_number<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a non-negative integer", name)),
        _ => Ok(None),
    }
}

fn read_config_file(path: &Path) -> Result<OverlayConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
