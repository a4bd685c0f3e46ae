//! Camera device seam and the owned capture session.
//!
//! The vendor SDK sits behind two traits: `DeviceProvider` (enumerate and
//! open by serial) and `CameraDevice` (configure, start/stop, frame
//! requests, close). A synthetic in-process backend serves `stub://`
//! serials for tests and development; a V4L2 backend is feature-gated for
//! real hardware.
//!
//! `CameraSession` is the only owner of an open device. Teardown (stream
//! stop, then device close, as two independently fallible steps) runs on
//! `shutdown()` and again from `Drop`, so it happens on every exit path
//! regardless of how the acquisition loop ended.

pub mod synthetic;
#[cfg(feature = "camera-v4l2")]
pub mod v4l2;

pub use synthetic::{PlannedFrame, SyntheticProbe, SyntheticProvider, SyntheticSpec};

use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use crate::frame::MosaicFrame;
use crate::settings::{AppliedSettings, CameraSettings};
use crate::CaptureError;

/// Identity of an enumerated device.
#[derive(Clone, Debug, Serialize)]
pub struct DeviceInfo {
    pub serial: String,
    pub model: String,
    pub vendor: String,
    pub device_version: String,
}

/// Enumerates devices and opens handles by serial number.
pub trait DeviceProvider {
    fn enumerate(&self) -> Result<Vec<DeviceInfo>>;

    /// Open an exclusive handle. At most one handle per serial may be open
    /// at a time; opening an already-open serial fails with
    /// `CaptureError::AlreadyOpen`.
    fn open(&self, serial: &str) -> Result<Box<dyn CameraDevice>>;
}

/// One physical (or synthetic) sensor.
pub trait CameraDevice {
    fn info(&self) -> &DeviceInfo;

    /// Apply clamped settings and negotiate the pixel format. Reports what
    /// the device actually accepted.
    fn configure(&mut self, settings: &CameraSettings) -> Result<AppliedSettings>;

    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Request one frame, blocking up to `timeout`.
    ///
    /// `None` uniformly covers timeout, device error and malformed
    /// payload; all of them are recoverable per-frame conditions.
    fn request_frame(&mut self, timeout: Duration) -> Option<MosaicFrame>;

    fn close(&mut self) -> Result<()>;
}

/// Owned session around one open camera handle.
///
/// Lifecycle: `open` → `configure` → `start` → frame requests → `shutdown`
/// (explicit or via `Drop`). `start` or `stop_stream` before `configure`
/// surface `CaptureError::NotInitialized`.
pub struct CameraSession {
    device: Option<Box<dyn CameraDevice>>,
    applied: Option<AppliedSettings>,
    started: bool,
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("device", &self.device.as_ref().map(|_| "<dyn CameraDevice>"))
            .field("applied", &self.applied)
            .field("started", &self.started)
            .finish()
    }
}

impl CameraSession {
    /// Enumerate and open the device with the given serial.
    ///
    /// Zero enumerated devices is `CaptureError::NoDeviceFound`; a missing
    /// serial among present devices is `CaptureError::DeviceNotFound`.
    pub fn open(provider: &dyn DeviceProvider, serial: &str) -> Result<Self> {
        let devices = provider.enumerate()?;
        if devices.is_empty() {
            return Err(CaptureError::NoDeviceFound.into());
        }
        log::info!("found {} device(s)", devices.len());

        let device = provider.open(serial)?;
        Ok(Self {
            device: Some(device),
            applied: None,
            started: false,
        })
    }

    /// Apply settings (clamped to sensor ranges) and negotiate the format.
    pub fn configure(&mut self, settings: &CameraSettings) -> Result<AppliedSettings> {
        let device = self
            .device
            .as_mut()
            .ok_or(CaptureError::NotInitialized)?;
        let applied = device.configure(&settings.clamped())?;
        log::info!(
            "configured {}: exposure={:.1}us gain={:.1}dB rate={:.1}fps format={:?} {}x{}",
            device.info().serial,
            applied.exposure_time_us,
            applied.gain_db,
            applied.frame_rate,
            applied.format,
            applied.width,
            applied.height
        );
        self.applied = Some(applied.clone());
        Ok(applied)
    }

    pub fn start(&mut self) -> Result<()> {
        if self.applied.is_none() {
            return Err(CaptureError::NotInitialized.into());
        }
        let device = self
            .device
            .as_mut()
            .ok_or(CaptureError::NotInitialized)?;
        device.start()?;
        self.started = true;
        Ok(())
    }

    /// Stop streaming without closing the device.
    pub fn stop_stream(&mut self) -> Result<()> {
        if self.applied.is_none() {
            return Err(CaptureError::NotInitialized.into());
        }
        let device = self
            .device
            .as_mut()
            .ok_or(CaptureError::NotInitialized)?;
        if self.started {
            device.stop()?;
            self.started = false;
        }
        Ok(())
    }

    pub fn request_frame(&mut self, timeout: Duration) -> Option<MosaicFrame> {
        self.device.as_mut()?.request_frame(timeout)
    }

    pub fn applied(&self) -> Option<&AppliedSettings> {
        self.applied.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// Best-effort teardown: stop the stream, then close the device.
    ///
    /// The two steps are independent; a stop failure never prevents the
    /// close attempt. Failures are logged, not propagated. Idempotent: the
    /// handle is nulled after the first call, and `Drop` re-invokes this
    /// so teardown is guaranteed on every exit path.
    pub fn shutdown(&mut self) {
        let Some(mut device) = self.device.take() else {
            return;
        };
        if self.started {
            if let Err(e) = device.stop() {
                log::warn!("stream stop failed: {e:#}");
            }
            self.started = false;
        }
        if let Err(e) = device.close() {
            log::warn!("device close failed: {e:#}");
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CaptureError;

    #[test]
    fn open_with_no_devices_is_a_named_failure() {
        let provider = SyntheticProvider::empty();
        let err = CameraSession::open(&provider, "stub://cam0").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CaptureError>(),
            Some(CaptureError::NoDeviceFound)
        ));
    }

    #[test]
    fn open_with_unknown_serial_is_a_named_failure() {
        let provider = SyntheticProvider::single("stub://cam0");
        let err = CameraSession::open(&provider, "stub://other").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CaptureError>(),
            Some(CaptureError::DeviceNotFound { .. })
        ));
    }

    #[test]
    fn start_before_configure_is_not_initialized() {
        let provider = SyntheticProvider::single("stub://cam0");
        let mut session = CameraSession::open(&provider, "stub://cam0").unwrap();
        let err = session.start().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CaptureError>(),
            Some(CaptureError::NotInitialized)
        ));
    }

    #[test]
    fn stop_before_configure_is_not_initialized() {
        let provider = SyntheticProvider::single("stub://cam0");
        let mut session = CameraSession::open(&provider, "stub://cam0").unwrap();
        let err = session.stop_stream().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CaptureError>(),
            Some(CaptureError::NotInitialized)
        ));
    }

    #[test]
    fn second_open_of_same_serial_is_rejected_until_shutdown() {
        let provider = SyntheticProvider::single("stub://cam0");
        let session = CameraSession::open(&provider, "stub://cam0").unwrap();
        let err = CameraSession::open(&provider, "stub://cam0").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CaptureError>(),
            Some(CaptureError::AlreadyOpen { .. })
        ));

        drop(session);
        assert!(CameraSession::open(&provider, "stub://cam0").is_ok());
    }
}
