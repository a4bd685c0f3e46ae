//! Daemon configuration: TOML file (via `MVGRAB_CONFIG`), then `MVGRAB_*`
//! environment overrides, then validation.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::settings::CameraSettings;

const DEFAULT_SERIAL: &str = "stub://cam0";
const DEFAULT_OUTPUT_ROOT: &str = "capture";
const DEFAULT_FRAME_TIMEOUT_MS: u64 = 3000;
const DEFAULT_VIDEO_FPS: f64 = 15.0;
const DEFAULT_PREVIEW_SCALE: u32 = 1;
const DEFAULT_DETECT_BACKEND: &str = "stub";

const MIN_FRAME_TIMEOUT_MS: u64 = 1000;
const MAX_FRAME_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    output_root: Option<String>,
    camera: Option<CameraConfigFile>,
    stream: Option<StreamConfigFile>,
    video: Option<VideoConfigFile>,
    detect: Option<DetectConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    serial: Option<String>,
    exposure_time_us: Option<f64>,
    gain_db: Option<f64>,
    frame_rate: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamConfigFile {
    frame_timeout_ms: Option<u64>,
    save_stills: Option<bool>,
    record_video: Option<bool>,
    preview: Option<bool>,
    preview_scale: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct VideoConfigFile {
    fps: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub output_root: PathBuf,
    pub camera: CameraSettings,
    pub frame_timeout: Duration,
    pub save_stills: bool,
    pub record_video: bool,
    pub preview: bool,
    pub preview_scale: u32,
    pub video_fps: f64,
    pub detect_backend: String,
    pub detect_model_path: Option<PathBuf>,
}

impl CaptureConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("MVGRAB_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: CaptureConfigFile) -> Self {
        let defaults = CameraSettings::default();
        let camera = CameraSettings {
            serial: file
                .camera
                .as_ref()
                .and_then(|camera| camera.serial.clone())
                .unwrap_or_else(|| DEFAULT_SERIAL.to_string()),
            exposure_time_us: file
                .camera
                .as_ref()
                .and_then(|camera| camera.exposure_time_us)
                .unwrap_or(defaults.exposure_time_us),
            gain_db: file
                .camera
                .as_ref()
                .and_then(|camera| camera.gain_db)
                .unwrap_or(defaults.gain_db),
            frame_rate: file
                .camera
                .as_ref()
                .and_then(|camera| camera.frame_rate)
                .unwrap_or(defaults.frame_rate),
        };
        let frame_timeout = Duration::from_millis(
            file.stream
                .as_ref()
                .and_then(|stream| stream.frame_timeout_ms)
                .unwrap_or(DEFAULT_FRAME_TIMEOUT_MS),
        );
        Self {
            output_root: PathBuf::from(
                file.output_root
                    .unwrap_or_else(|| DEFAULT_OUTPUT_ROOT.to_string()),
            ),
            camera,
            frame_timeout,
            save_stills: file
                .stream
                .as_ref()
                .and_then(|stream| stream.save_stills)
                .unwrap_or(true),
            record_video: file
                .stream
                .as_ref()
                .and_then(|stream| stream.record_video)
                .unwrap_or(true),
            preview: file
                .stream
                .as_ref()
                .and_then(|stream| stream.preview)
                .unwrap_or(false),
            preview_scale: file
                .stream
                .as_ref()
                .and_then(|stream| stream.preview_scale)
                .unwrap_or(DEFAULT_PREVIEW_SCALE),
            video_fps: file
                .video
                .as_ref()
                .and_then(|video| video.fps)
                .unwrap_or(DEFAULT_VIDEO_FPS),
            detect_backend: file
                .detect
                .as_ref()
                .and_then(|detect| detect.backend.clone())
                .unwrap_or_else(|| DEFAULT_DETECT_BACKEND.to_string()),
            detect_model_path: file.detect.and_then(|detect| detect.model_path),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(serial) = std::env::var("MVGRAB_SERIAL") {
            if !serial.trim().is_empty() {
                self.camera.serial = serial;
            }
        }
        if let Ok(root) = std::env::var("MVGRAB_OUTPUT_ROOT") {
            if !root.trim().is_empty() {
                self.output_root = PathBuf::from(root);
            }
        }
        if let Ok(exposure) = std::env::var("MVGRAB_EXPOSURE_US") {
            self.camera.exposure_time_us = exposure
                .parse()
                .map_err(|_| anyhow!("MVGRAB_EXPOSURE_US must be a number of microseconds"))?;
        }
        if let Ok(gain) = std::env::var("MVGRAB_GAIN_DB") {
            self.camera.gain_db = gain
                .parse()
                .map_err(|_| anyhow!("MVGRAB_GAIN_DB must be a number of decibels"))?;
        }
        if let Ok(rate) = std::env::var("MVGRAB_FRAME_RATE") {
            self.camera.frame_rate = rate
                .parse()
                .map_err(|_| anyhow!("MVGRAB_FRAME_RATE must be a number of frames per second"))?;
        }
        if let Ok(timeout) = std::env::var("MVGRAB_FRAME_TIMEOUT_MS") {
            let millis: u64 = timeout.parse().map_err(|_| {
                anyhow!("MVGRAB_FRAME_TIMEOUT_MS must be an integer number of milliseconds")
            })?;
            self.frame_timeout = Duration::from_millis(millis);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.camera.serial.trim().is_empty() {
            return Err(anyhow!("camera serial must not be empty"));
        }
        if !(self.camera.frame_rate > 0.0) {
            return Err(anyhow!("frame rate must be greater than zero"));
        }
        if !(self.video_fps > 0.0) {
            return Err(anyhow!("video fps must be greater than zero"));
        }
        let millis = self.frame_timeout.as_millis() as u64;
        if !(MIN_FRAME_TIMEOUT_MS..=MAX_FRAME_TIMEOUT_MS).contains(&millis) {
            return Err(anyhow!(
                "frame timeout must be between {} and {} ms",
                MIN_FRAME_TIMEOUT_MS,
                MAX_FRAME_TIMEOUT_MS
            ));
        }
        Ok(())
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::from_file(CaptureConfigFile::default())
    }
}

fn read_config_file(path: &Path) -> Result<CaptureConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = CaptureConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.camera.serial, DEFAULT_SERIAL);
        assert_eq!(cfg.frame_timeout, Duration::from_millis(3000));
        assert!(cfg.save_stills);
        assert!(!cfg.preview);
    }

    #[test]
    fn file_values_override_defaults() {
        let raw = r#"
            output_root = "/tmp/grab"

            [camera]
            serial = "CCA24130001"
            exposure_time_us = 2000.0

            [stream]
            frame_timeout_ms = 1500
            record_video = false

            [video]
            fps = 25.0
        "#;
        let file: CaptureConfigFile = toml::from_str(raw).unwrap();
        let cfg = CaptureConfig::from_file(file);
        assert_eq!(cfg.output_root, PathBuf::from("/tmp/grab"));
        assert_eq!(cfg.camera.serial, "CCA24130001");
        assert_eq!(cfg.camera.exposure_time_us, 2000.0);
        assert_eq!(cfg.frame_timeout, Duration::from_millis(1500));
        assert!(!cfg.record_video);
        assert_eq!(cfg.video_fps, 25.0);
    }

    #[test]
    fn rejects_out_of_range_timeout() {
        let mut cfg = CaptureConfig::default();
        cfg.frame_timeout = Duration::from_millis(100);
        assert!(cfg.validate().is_err());
        cfg.frame_timeout = Duration::from_millis(60_000);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_frame_rate() {
        let mut cfg = CaptureConfig::default();
        cfg.camera.frame_rate = 0.0;
        assert!(cfg.validate().is_err());
    }
}
