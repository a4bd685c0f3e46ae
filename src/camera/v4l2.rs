#![cfg(feature = "camera-v4l2")]

//! V4L2 camera backend.
//!
//! Real-hardware backend over libv4l. V4L2 has no vendor serial-number
//! open, so the configured "serial" is the device node path
//! (`/dev/video0`) or a bare index. Format negotiation tries the 8-bit
//! Bayer fourcc first and falls back to 10-bit; 10-bit payloads are
//! left-aligned into the 16-bit container before hand-off so the decode
//! path sees one fixed layout.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::FourCC;

use super::{CameraDevice, DeviceInfo, DeviceProvider};
use crate::frame::{MosaicFrame, Samples};
use crate::settings::{AppliedSettings, CameraSettings, FormatNegotiation, MosaicFormat};
use crate::CaptureError;

const FOURCC_BAYER_RG8: &[u8; 4] = b"RGGB";
const FOURCC_BAYER_RG10: &[u8; 4] = b"RG10";

// Standard V4L2 control IDs (videodev2.h).
const V4L2_CID_EXPOSURE_ABSOLUTE: u32 = 0x009a_0902;
const V4L2_CID_GAIN: u32 = 0x0098_0913;

/// Provider over local V4L2 device nodes.
pub struct V4l2Provider {
    open_paths: Arc<Mutex<HashSet<String>>>,
}

impl V4l2Provider {
    pub fn new() -> Self {
        Self {
            open_paths: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn resolve_path(serial: &str) -> String {
        match serial.parse::<usize>() {
            Ok(index) => format!("/dev/video{index}"),
            Err(_) => serial.to_string(),
        }
    }
}

impl Default for V4l2Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceProvider for V4l2Provider {
    fn enumerate(&self) -> Result<Vec<DeviceInfo>> {
        let nodes = v4l::context::enum_devices();
        Ok(nodes
            .iter()
            .map(|node| DeviceInfo {
                serial: node.path().display().to_string(),
                model: node.name().unwrap_or_else(|| "unknown".to_string()),
                vendor: "v4l2".to_string(),
                device_version: String::new(),
            })
            .collect())
    }

    fn open(&self, serial: &str) -> Result<Box<dyn CameraDevice>> {
        let path = Self::resolve_path(serial);

        {
            let mut open = self
                .open_paths
                .lock()
                .map_err(|_| anyhow!("open-path registry poisoned"))?;
            if !open.insert(path.clone()) {
                return Err(CaptureError::AlreadyOpen {
                    serial: path.clone(),
                }
                .into());
            }
        }

        let device = v4l::Device::with_path(&path).map_err(|e| {
            if let Ok(mut open) = self.open_paths.lock() {
                open.remove(&path);
            }
            anyhow!(CaptureError::DeviceNotFound {
                serial: path.clone(),
            })
            .context(e)
        })?;

        let info = DeviceInfo {
            serial: path.clone(),
            model: device
                .query_caps()
                .map(|caps| caps.card)
                .unwrap_or_else(|_| "unknown".to_string()),
            vendor: "v4l2".to_string(),
            device_version: String::new(),
        };
        log::info!("opened v4l2 device {} ({})", path, info.model);

        Ok(Box::new(V4l2Camera {
            info,
            path,
            device: Some(device),
            stream: None,
            format: None,
            frame_len: 0,
            width: 0,
            height: 0,
            open_paths: self.open_paths.clone(),
        }))
    }
}

#[self_referencing]
struct StreamState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: MmapStream<'this, v4l::Device>,
}

struct V4l2Camera {
    info: DeviceInfo,
    path: String,
    /// Held between `configure` and `start`; moved into `stream` on start.
    device: Option<v4l::Device>,
    stream: Option<StreamState>,
    format: Option<MosaicFormat>,
    frame_len: usize,
    width: u32,
    height: u32,
    open_paths: Arc<Mutex<HashSet<String>>>,
}

impl V4l2Camera {
    fn negotiate_format(device: &v4l::Device) -> Result<FormatNegotiation> {
        let mut format = device.format().context("read v4l2 format")?;

        format.fourcc = FourCC::new(FOURCC_BAYER_RG8);
        match device.set_format(&format) {
            Ok(applied) if applied.fourcc == FourCC::new(FOURCC_BAYER_RG8) => {
                return Ok(FormatNegotiation::Preferred(MosaicFormat::BayerRg8));
            }
            Ok(_) | Err(_) => {}
        }

        format.fourcc = FourCC::new(FOURCC_BAYER_RG10);
        let applied = device
            .set_format(&format)
            .context("set 10-bit bayer format")?;
        if applied.fourcc != FourCC::new(FOURCC_BAYER_RG10) {
            return Err(anyhow!(
                "device accepts neither 8-bit nor 10-bit bayer (got {})",
                applied.fourcc
            ));
        }
        Ok(FormatNegotiation::Fallback(MosaicFormat::BayerRg10))
    }

    fn apply_control(device: &v4l::Device, id: u32, value: i64, name: &str) {
        use v4l::control::{Control, Value};
        let control = Control {
            id,
            value: Value::Integer(value),
        };
        if let Err(e) = device.set_control(control) {
            log::warn!("{} control not applied: {}", name, e);
        }
    }

    fn release_path(&self) {
        if let Ok(mut open) = self.open_paths.lock() {
            open.remove(&self.path);
        }
    }
}

impl CameraDevice for V4l2Camera {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn configure(&mut self, settings: &CameraSettings) -> Result<AppliedSettings> {
        let device = self
            .device
            .as_ref()
            .ok_or(CaptureError::NotInitialized)?;

        let negotiated = Self::negotiate_format(device)?;
        if let FormatNegotiation::Fallback(format) = negotiated {
            log::info!("8-bit bayer rejected by {}, using {:?}", self.path, format);
        }
        let format = negotiated.format();

        // Exposure-absolute is in 100 us units per the V4L2 spec.
        Self::apply_control(
            device,
            V4L2_CID_EXPOSURE_ABSOLUTE,
            (settings.exposure_time_us / 100.0).round() as i64,
            "exposure",
        );
        Self::apply_control(
            device,
            V4L2_CID_GAIN,
            settings.gain_db.round() as i64,
            "gain",
        );

        if settings.frame_rate > 0.0 {
            let params =
                v4l::video::capture::Parameters::with_fps(settings.frame_rate.round() as u32);
            if let Err(e) = device.set_params(&params) {
                log::warn!("frame rate not applied on {}: {}", self.path, e);
            }
        }

        let active = device.format().context("read negotiated v4l2 format")?;
        self.format = Some(format);
        self.width = active.width;
        self.height = active.height;
        self.frame_len = match format {
            MosaicFormat::BayerRg8 => (active.width * active.height) as usize,
            MosaicFormat::BayerRg10 => (active.width * active.height * 2) as usize,
        };

        Ok(AppliedSettings {
            exposure_time_us: settings.exposure_time_us,
            gain_db: settings.gain_db,
            frame_rate: settings.frame_rate,
            format,
            width: active.width,
            height: active.height,
        })
    }

    fn start(&mut self) -> Result<()> {
        if self.format.is_none() {
            return Err(CaptureError::NotInitialized.into());
        }
        let device = self
            .device
            .take()
            .ok_or(CaptureError::NotInitialized)?;
        let state = StreamStateBuilder {
            device,
            stream_builder: |device| {
                MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|e| anyhow::Error::new(e).context("create v4l2 mmap stream"))
            },
        }
        .try_build()?;
        self.stream = Some(state);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.format.is_none() {
            return Err(CaptureError::NotInitialized.into());
        }
        // Dropping the stream turns streaming off and hands the device
        // back for a possible restart.
        if let Some(state) = self.stream.take() {
            self.device = Some(state.into_heads().device);
        }
        Ok(())
    }

    fn request_frame(&mut self, _timeout: Duration) -> Option<MosaicFrame> {
        let state = self.stream.as_mut()?;
        let format = self.format?;

        let result = state.with_stream_mut(|stream| stream.next().map(|(buf, _meta)| buf.to_vec()));
        let buf = match result {
            Ok(buf) => buf,
            Err(e) => {
                log::warn!("v4l2 capture failed on {}: {}", self.path, e);
                return None;
            }
        };

        if buf.len() < self.frame_len {
            log::warn!(
                "short v4l2 payload on {}: {} of {} bytes",
                self.path,
                buf.len(),
                self.frame_len
            );
            return None;
        }

        let samples = match format {
            MosaicFormat::BayerRg8 => Samples::U8(buf[..self.frame_len].to_vec()),
            MosaicFormat::BayerRg10 => {
                // 10 significant bits little-endian; left-align into the
                // 16-bit container expected by the depth downscale.
                let samples = buf[..self.frame_len]
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]) << 6)
                    .collect();
                Samples::U16(samples)
            }
        };

        Some(MosaicFrame {
            width: self.width,
            height: self.height,
            samples,
        })
    }

    fn close(&mut self) -> Result<()> {
        self.stream = None;
        self.device = None;
        self.release_path();
        Ok(())
    }
}

impl Drop for V4l2Camera {
    fn drop(&mut self) {
        self.release_path();
    }
}
