//! mvgrab - machine-vision camera capture
//!
//! This crate wraps an industrial Bayer-sensor camera behind a small set of
//! trait seams and runs a blocking acquisition loop over it.
//!
//! # Architecture
//!
//! - `camera`: device provider/handle traits, the scoped `CameraSession`
//!   guard, a synthetic in-process camera (`stub://` serials) and a
//!   feature-gated V4L2 backend
//! - `frame`: mosaic and RGB frame types, bit-depth downscale, demosaic
//! - `sink`: frame consumers (stills, MJPEG/AVI video, live preview) and
//!   the ordered dispatch set with its failure policy
//! - `stream`: the acquisition loop with guaranteed teardown ordering
//! - `detect` + `annotate`: offline detection over saved stills
//!
//! Per-frame failures (timeout, bad status, truncated payload) are
//! recoverable: the loop logs and skips, it never dies because of one bad
//! frame. The only failures surfaced to callers at startup are the
//! `CaptureError` variants below.

use thiserror::Error;

pub mod annotate;
pub mod camera;
pub mod config;
pub mod detect;
pub mod frame;
pub mod progress;
pub mod settings;
pub mod sink;
pub mod stream;

pub use camera::{CameraDevice, CameraSession, DeviceInfo, DeviceProvider, SyntheticProvider};
pub use detect::{Detection, DetectionResult, DetectorBackend};
pub use frame::{MosaicFrame, RgbFrame, Samples};
pub use settings::{AppliedSettings, CameraSettings, MosaicFormat};
pub use sink::{FrameSink, SinkKind, SinkSet, StillImageSink, VideoSink};
pub use stream::{run_stream, StreamOptions, StreamStats};

#[cfg(feature = "camera-v4l2")]
pub use camera::v4l2::V4l2Provider;
#[cfg(feature = "preview")]
pub use sink::preview::PreviewSink;

/// Setup failures surfaced to the caller.
///
/// Everything else that can go wrong per frame is swallowed and logged by
/// the acquisition loop.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Zero devices enumerated.
    #[error("no compatible device found")]
    NoDeviceFound,

    /// Devices exist, but none with the requested serial.
    #[error("device with serial '{serial}' not found")]
    DeviceNotFound { serial: String },

    /// `start`/`stop` invoked before `configure`.
    #[error("camera handle not initialized")]
    NotInitialized,

    /// A session for this serial is already open.
    #[error("device '{serial}' is already open")]
    AlreadyOpen { serial: String },
}
