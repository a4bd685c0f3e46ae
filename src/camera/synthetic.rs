//! Synthetic camera backend.
//!
//! Serves `stub://` serials entirely in-process: no hardware, no vendor
//! SDK. Frames can be generated endlessly (a slowly changing uniform
//! scene) or follow a scripted plan of good and corrupt frames, which is
//! how the acquisition-loop tests drive skip/continue behavior.
//!
//! Each device carries a `SyntheticProbe` that records whether `stop` and
//! `close` were attempted, and can be told to fail `stop` to exercise the
//! teardown ordering guarantee.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};

use super::{CameraDevice, DeviceInfo, DeviceProvider};
use crate::frame::{MosaicFrame, Samples};
use crate::settings::{AppliedSettings, CameraSettings, FormatNegotiation, MosaicFormat};
use crate::CaptureError;

/// One scripted frame request outcome.
#[derive(Clone, Copy, Debug)]
pub enum PlannedFrame {
    /// A good frame at the negotiated depth.
    Good,
    /// Timeout / bad status / truncated payload; surfaces as `None`.
    Corrupt,
}

/// Shared observation point for a synthetic device's lifecycle.
#[derive(Debug, Default)]
pub struct SyntheticProbe {
    pub stop_attempted: AtomicBool,
    pub closed: AtomicBool,
    /// When set, `stop()` returns an error (close must still be tried).
    pub fail_stop: AtomicBool,
    pub frames_served: AtomicU64,
}

/// Description of one synthetic device.
#[derive(Clone)]
pub struct SyntheticSpec {
    pub info: DeviceInfo,
    pub width: u32,
    pub height: u32,
    /// Reject the preferred 8-bit mosaic format, forcing 10-bit fallback.
    pub reject_eight_bit: bool,
    /// Scripted frames; `None` generates good frames indefinitely.
    pub plan: Option<Vec<PlannedFrame>>,
    pub probe: Arc<SyntheticProbe>,
}

impl SyntheticSpec {
    pub fn new(serial: &str) -> Self {
        Self {
            info: DeviceInfo {
                serial: serial.to_string(),
                model: "SYN-130".to_string(),
                vendor: "mvgrab".to_string(),
                device_version: "1.0".to_string(),
            },
            width: 64,
            height: 48,
            reject_eight_bit: false,
            plan: None,
            probe: Arc::new(SyntheticProbe::default()),
        }
    }

    pub fn with_plan(mut self, plan: Vec<PlannedFrame>) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn with_ten_bit_only(mut self) -> Self {
        self.reject_eight_bit = true;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn probe(&self) -> Arc<SyntheticProbe> {
        self.probe.clone()
    }
}

/// Provider over a fixed set of synthetic devices.
pub struct SyntheticProvider {
    devices: Vec<SyntheticSpec>,
    open_serials: Arc<Mutex<HashSet<String>>>,
}

impl SyntheticProvider {
    pub fn empty() -> Self {
        Self {
            devices: Vec::new(),
            open_serials: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// One default device with the given serial.
    pub fn single(serial: &str) -> Self {
        Self::with_devices(vec![SyntheticSpec::new(serial)])
    }

    pub fn with_devices(devices: Vec<SyntheticSpec>) -> Self {
        Self {
            devices,
            open_serials: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

impl DeviceProvider for SyntheticProvider {
    fn enumerate(&self) -> Result<Vec<DeviceInfo>> {
        Ok(self.devices.iter().map(|d| d.info.clone()).collect())
    }

    fn open(&self, serial: &str) -> Result<Box<dyn CameraDevice>> {
        let spec = self
            .devices
            .iter()
            .find(|d| d.info.serial == serial)
            .ok_or_else(|| CaptureError::DeviceNotFound {
                serial: serial.to_string(),
            })?;

        {
            let mut open = self
                .open_serials
                .lock()
                .map_err(|_| anyhow!("open-serial registry poisoned"))?;
            if !open.insert(serial.to_string()) {
                return Err(CaptureError::AlreadyOpen {
                    serial: serial.to_string(),
                }
                .into());
            }
        }

        log::info!("opened synthetic device {}", serial);
        Ok(Box::new(SyntheticCamera {
            spec: spec.clone(),
            plan: spec.plan.clone().map(VecDeque::from),
            format: None,
            started: false,
            seq: 0,
            open_serials: self.open_serials.clone(),
        }))
    }
}

struct SyntheticCamera {
    spec: SyntheticSpec,
    plan: Option<VecDeque<PlannedFrame>>,
    format: Option<MosaicFormat>,
    started: bool,
    seq: u64,
    open_serials: Arc<Mutex<HashSet<String>>>,
}

impl SyntheticCamera {
    fn release_serial(&self) {
        if let Ok(mut open) = self.open_serials.lock() {
            open.remove(&self.spec.info.serial);
        }
    }

    fn generate(&mut self) -> MosaicFrame {
        let pixels = (self.spec.width * self.spec.height) as usize;
        // Uniform scene whose level tracks the sequence number; decoded
        // frames carry the sequence in every byte, which the tests read
        // back to check arrival order.
        let level = (self.seq % 256) as u8;
        let samples = match self.format.unwrap_or(MosaicFormat::BayerRg8) {
            MosaicFormat::BayerRg8 => Samples::U8(vec![level; pixels]),
            MosaicFormat::BayerRg10 => Samples::U16(vec![(level as u16) << 8; pixels]),
        };
        self.seq += 1;
        self.spec.probe.frames_served.fetch_add(1, Ordering::Relaxed);
        MosaicFrame {
            width: self.spec.width,
            height: self.spec.height,
            samples,
        }
    }
}

impl CameraDevice for SyntheticCamera {
    fn info(&self) -> &DeviceInfo {
        &self.spec.info
    }

    fn configure(&mut self, settings: &CameraSettings) -> Result<AppliedSettings> {
        let negotiated = if self.spec.reject_eight_bit {
            FormatNegotiation::Fallback(MosaicFormat::BayerRg10)
        } else {
            FormatNegotiation::Preferred(MosaicFormat::BayerRg8)
        };
        if let FormatNegotiation::Fallback(format) = negotiated {
            log::info!("8-bit mosaic rejected, falling back to {:?}", format);
        }
        self.format = Some(negotiated.format());
        Ok(AppliedSettings {
            exposure_time_us: settings.exposure_time_us,
            gain_db: settings.gain_db,
            frame_rate: settings.frame_rate,
            format: negotiated.format(),
            width: self.spec.width,
            height: self.spec.height,
        })
    }

    fn start(&mut self) -> Result<()> {
        if self.format.is_none() {
            return Err(CaptureError::NotInitialized.into());
        }
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.spec.probe.stop_attempted.store(true, Ordering::Relaxed);
        if self.spec.probe.fail_stop.load(Ordering::Relaxed) {
            return Err(anyhow!("injected stream-stop failure"));
        }
        self.started = false;
        Ok(())
    }

    fn request_frame(&mut self, _timeout: Duration) -> Option<MosaicFrame> {
        if !self.started {
            return None;
        }
        match &mut self.plan {
            None => Some(self.generate()),
            Some(plan) => match plan.pop_front() {
                Some(PlannedFrame::Good) => Some(self.generate()),
                // A corrupt plan entry still consumes a sequence slot, the
                // way a dropped sensor frame does.
                Some(PlannedFrame::Corrupt) => {
                    self.seq += 1;
                    None
                }
                // Plan exhausted: behave like a stalled camera.
                None => None,
            },
        }
    }

    fn close(&mut self) -> Result<()> {
        self.spec.probe.closed.store(true, Ordering::Relaxed);
        self.release_serial();
        Ok(())
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        self.release_serial();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(spec: SyntheticSpec) -> Box<dyn CameraDevice> {
        let serial = spec.info.serial.clone();
        let provider = SyntheticProvider::with_devices(vec![spec]);
        provider.open(&serial).unwrap()
    }

    #[test]
    fn unstarted_device_serves_no_frames() {
        let mut cam = open(SyntheticSpec::new("stub://cam0"));
        assert!(cam.request_frame(Duration::from_secs(1)).is_none());
    }

    #[test]
    fn plan_is_served_in_order() {
        let spec = SyntheticSpec::new("stub://cam0").with_plan(vec![
            PlannedFrame::Good,
            PlannedFrame::Corrupt,
            PlannedFrame::Good,
        ]);
        let mut cam = open(spec);
        cam.configure(&CameraSettings::default()).unwrap();
        cam.start().unwrap();

        let timeout = Duration::from_secs(1);
        assert!(cam.request_frame(timeout).is_some());
        assert!(cam.request_frame(timeout).is_none());
        assert!(cam.request_frame(timeout).is_some());
        // Exhausted plan stalls.
        assert!(cam.request_frame(timeout).is_none());
    }

    #[test]
    fn ten_bit_fallback_produces_u16_samples() {
        let spec = SyntheticSpec::new("stub://cam0").with_ten_bit_only();
        let mut cam = open(spec);
        let applied = cam.configure(&CameraSettings::default()).unwrap();
        assert_eq!(applied.format, MosaicFormat::BayerRg10);
        cam.start().unwrap();

        let frame = cam.request_frame(Duration::from_secs(1)).unwrap();
        assert!(matches!(frame.samples, Samples::U16(_)));
    }
}
