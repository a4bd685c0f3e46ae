use anyhow::Result;

use crate::detect::backend::{DetectionCapability, DetectorBackend};
use crate::detect::result::DetectionResult;

/// Mean absolute luminance delta (0..255) above which the scene is
/// considered to have changed.
const MOTION_THRESHOLD: f32 = 2.0;

/// Default backend: frame-to-frame motion by mean absolute luminance
/// difference. Needs no model file.
pub struct StubBackend {
    last_luma: Option<Vec<u8>>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self { last_luma: None }
    }

    fn luminance(pixels: &[u8]) -> Vec<u8> {
        pixels
            .chunks_exact(3)
            .map(|px| {
                ((px[0] as u32 * 299 + px[1] as u32 * 587 + px[2] as u32 * 114) / 1000) as u8
            })
            .collect()
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        matches!(capability, DetectionCapability::Motion)
    }

    fn detect(&mut self, pixels: &[u8], _width: u32, _height: u32) -> Result<DetectionResult> {
        let luma = Self::luminance(pixels);

        let delta = match &self.last_luma {
            Some(prev) if prev.len() == luma.len() && !luma.is_empty() => {
                let sum: u64 = prev
                    .iter()
                    .zip(&luma)
                    .map(|(&a, &b)| (a as i32 - b as i32).unsigned_abs() as u64)
                    .sum();
                sum as f32 / luma.len() as f32
            }
            // First frame, or a resolution change: nothing to compare.
            _ => 0.0,
        };

        self.last_luma = Some(luma);

        let motion = delta >= MOTION_THRESHOLD;
        Ok(DetectionResult {
            motion_detected: motion,
            detections: vec![],
            confidence: (delta / 32.0).min(1.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_scene_reports_no_motion() {
        let mut backend = StubBackend::new();
        let frame = vec![100u8; 4 * 4 * 3];

        let r1 = backend.detect(&frame, 4, 4).unwrap();
        assert!(!r1.motion_detected);

        let r2 = backend.detect(&frame, 4, 4).unwrap();
        assert!(!r2.motion_detected);
    }

    #[test]
    fn scene_change_reports_motion() {
        let mut backend = StubBackend::new();
        let dark = vec![10u8; 4 * 4 * 3];
        let bright = vec![200u8; 4 * 4 * 3];

        backend.detect(&dark, 4, 4).unwrap();
        let r = backend.detect(&bright, 4, 4).unwrap();
        assert!(r.motion_detected);
        assert!(r.confidence > 0.5);
    }

    #[test]
    fn resolution_change_resets_comparison() {
        let mut backend = StubBackend::new();
        backend.detect(&vec![0u8; 4 * 4 * 3], 4, 4).unwrap();
        let r = backend.detect(&vec![255u8; 2 * 2 * 3], 2, 2).unwrap();
        assert!(!r.motion_detected);
    }
}
