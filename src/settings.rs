//! Camera settings and pixel-format negotiation.

use serde::Deserialize;

/// Exposure range accepted by the sensor, in microseconds.
pub const EXPOSURE_RANGE_US: (f64, f64) = (10.0, 50_000.0);

/// Analog gain range accepted by the sensor, in decibels.
pub const GAIN_RANGE_DB: (f64, f64) = (0.0, 24.0);

/// Requested sensor configuration.
///
/// Values are clamped to the sensor's accepted ranges before being applied;
/// out-of-range requests are not an error.
#[derive(Clone, Debug, Deserialize)]
pub struct CameraSettings {
    pub serial: String,
    /// Exposure time in microseconds.
    pub exposure_time_us: f64,
    /// Analog gain in decibels.
    pub gain_db: f64,
    /// Acquisition frame rate in frames per second.
    pub frame_rate: f64,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            serial: String::new(),
            exposure_time_us: 10_000.0,
            gain_db: 0.0,
            frame_rate: 30.0,
        }
    }
}

impl CameraSettings {
    /// Clamp exposure and gain into the sensor's accepted ranges.
    pub fn clamped(&self) -> Self {
        Self {
            serial: self.serial.clone(),
            exposure_time_us: self
                .exposure_time_us
                .clamp(EXPOSURE_RANGE_US.0, EXPOSURE_RANGE_US.1),
            gain_db: self.gain_db.clamp(GAIN_RANGE_DB.0, GAIN_RANGE_DB.1),
            frame_rate: self.frame_rate,
        }
    }
}

/// Sensor readout format for the Bayer mosaic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MosaicFormat {
    /// 8 bits per sample, RGGB layout.
    BayerRg8,
    /// 10 bits per sample in a 16-bit container, RGGB layout.
    BayerRg10,
}

impl MosaicFormat {
    pub fn bits_per_sample(self) -> u32 {
        match self {
            MosaicFormat::BayerRg8 => 8,
            MosaicFormat::BayerRg10 => 10,
        }
    }
}

/// Outcome of pixel-format negotiation.
///
/// The 8-bit mosaic format is tried first; a device that rejects it falls
/// back to 10-bit. This is an explicit two-branch result, not error-driven
/// control flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatNegotiation {
    Preferred(MosaicFormat),
    Fallback(MosaicFormat),
}

impl FormatNegotiation {
    pub fn format(self) -> MosaicFormat {
        match self {
            FormatNegotiation::Preferred(f) | FormatNegotiation::Fallback(f) => f,
        }
    }
}

/// What the device actually accepted after clamping and negotiation.
#[derive(Clone, Debug)]
pub struct AppliedSettings {
    pub exposure_time_us: f64,
    pub gain_db: f64,
    pub frame_rate: f64,
    pub format: MosaicFormat,
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(exposure: f64, gain: f64) -> CameraSettings {
        CameraSettings {
            serial: "stub://cam0".to_string(),
            exposure_time_us: exposure,
            gain_db: gain,
            frame_rate: 30.0,
        }
    }

    #[test]
    fn exposure_clamps_to_upper_bound() {
        let clamped = settings(100_000.0, 5.0).clamped();
        assert_eq!(clamped.exposure_time_us, 50_000.0);
        assert_eq!(clamped.gain_db, 5.0);
    }

    #[test]
    fn gain_clamps_to_lower_bound() {
        let clamped = settings(20_000.0, -5.0).clamped();
        assert_eq!(clamped.exposure_time_us, 20_000.0);
        assert_eq!(clamped.gain_db, 0.0);
    }

    #[test]
    fn in_range_values_pass_through() {
        let clamped = settings(10.0, 24.0).clamped();
        assert_eq!(clamped.exposure_time_us, 10.0);
        assert_eq!(clamped.gain_db, 24.0);
    }

    #[test]
    fn negotiation_reports_which_branch_was_taken() {
        let preferred = FormatNegotiation::Preferred(MosaicFormat::BayerRg8);
        let fallback = FormatNegotiation::Fallback(MosaicFormat::BayerRg10);
        assert_eq!(preferred.format(), MosaicFormat::BayerRg8);
        assert_eq!(fallback.format(), MosaicFormat::BayerRg10);
        assert_eq!(fallback.format().bits_per_sample(), 10);
    }
}
