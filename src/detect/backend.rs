use anyhow::Result;

use crate::detect::result::DetectionResult;

/// Detection capabilities supported by backends.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionCapability {
    Motion,
    ObjectDetection,
}

/// Detector backend seam.
///
/// Implementations receive RGB pixels read-only and must not retain the
/// slice beyond the call. A backend reports which capabilities it covers;
/// the offline annotation pass only requires one.
pub trait DetectorBackend {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Returns true when the backend supports a capability.
    fn supports(&self, capability: DetectionCapability) -> bool;

    /// Run detection on one interleaved RGB frame.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DetectionResult>;

    /// Optional warm-up hook (model load checks, first-run allocation).
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
