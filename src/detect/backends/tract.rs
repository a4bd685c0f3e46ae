#![cfg(feature = "backend-tract")]

//! Tract-based ONNX backend.
//!
//! Loads a local YOLO-family model and decodes its `[1, 4+nc, n]` output
//! into normalized bounding boxes with greedy non-maximum suppression. No
//! network I/O; the model is read from disk once at construction.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectionCapability, DetectorBackend};
use crate::detect::result::{Detection, DetectionResult};

const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const NMS_IOU_THRESHOLD: f32 = 0.45;

pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    width: u32,
    height: u32,
    confidence_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference at a
    /// fixed input size.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("load ONNX model {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("set model input fact")?
            .into_optimized()
            .context("optimize ONNX model")?
            .into_runnable()
            .context("build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        })
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        if width != self.width || height != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                width,
                height,
                self.width,
                self.height
            ));
        }
        let expected = (width as usize) * (height as usize) * 3;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected,
                pixels.len()
            ));
        }

        let width = width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, height as usize, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                pixels[idx] as f32 / 255.0
            },
        );
        Ok(input.into_tensor())
    }

    /// Decode a `[1, 4+nc, n]` YOLO head: cx/cy/w/h in input pixels
    /// followed by per-class scores.
    fn decode(&self, outputs: TVec<Tensor>) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape();
        if shape.len() != 3 || shape[1] < 5 {
            return Err(anyhow!("unexpected model output shape {:?}", shape));
        }
        let classes = shape[1] - 4;
        let anchors = shape[2];
        let (in_w, in_h) = (self.width as f32, self.height as f32);

        let mut candidates = Vec::new();
        for i in 0..anchors {
            let mut best = 0.0f32;
            let mut best_class = 0usize;
            for c in 0..classes {
                let score = view[[0, 4 + c, i]];
                if score > best {
                    best = score;
                    best_class = c;
                }
            }
            if best < self.confidence_threshold {
                continue;
            }
            let cx = view[[0, 0, i]];
            let cy = view[[0, 1, i]];
            let w = view[[0, 2, i]];
            let h = view[[0, 3, i]];
            candidates.push(Detection {
                x: ((cx - w / 2.0) / in_w).clamp(0.0, 1.0),
                y: ((cy - h / 2.0) / in_h).clamp(0.0, 1.0),
                w: (w / in_w).clamp(0.0, 1.0),
                h: (h / in_h).clamp(0.0, 1.0),
                confidence: best,
                class_id: best_class,
            });
        }

        Ok(non_max_suppression(candidates, NMS_IOU_THRESHOLD))
    }
}

/// Greedy NMS: keep the highest-confidence box, drop overlapping boxes of
/// the same class above the IoU threshold, repeat.
fn non_max_suppression(mut candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::new();
    for candidate in candidates {
        let overlaps = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && k.iou(&candidate) > iou_threshold);
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        matches!(capability, DetectionCapability::ObjectDetection)
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DetectionResult> {
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input))
            .context("ONNX inference failed")?;
        let detections = self.decode(outputs)?;
        let confidence = detections
            .iter()
            .map(|d| d.confidence)
            .fold(0.0f32, f32::max);

        Ok(DetectionResult {
            motion_detected: !detections.is_empty(),
            detections,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(x: f32, conf: f32, class_id: usize) -> Detection {
        Detection {
            x,
            y: 0.0,
            w: 0.2,
            h: 0.2,
            confidence: conf,
            class_id,
        }
    }

    #[test]
    fn nms_drops_overlapping_same_class_boxes() {
        let kept = non_max_suppression(
            vec![boxed(0.10, 0.9, 0), boxed(0.11, 0.8, 0), boxed(0.7, 0.7, 0)],
            0.45,
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn nms_keeps_overlapping_boxes_of_different_classes() {
        let kept = non_max_suppression(vec![boxed(0.10, 0.9, 0), boxed(0.11, 0.8, 1)], 0.45);
        assert_eq!(kept.len(), 2);
    }
}
