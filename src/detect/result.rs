/// Result of running detection on one frame.
#[derive(Clone, Debug, Default)]
pub struct DetectionResult {
    /// Did anything change or appear?
    pub motion_detected: bool,
    /// Bounding boxes (normalized 0..1 coordinates, x/y is the top-left
    /// corner).
    pub detections: Vec<Detection>,
    /// Confidence of the primary detection.
    pub confidence: f32,
}

#[derive(Clone, Debug)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub confidence: f32,
    pub class_id: usize,
}

impl Detection {
    /// Intersection-over-union against another box.
    pub fn iou(&self, other: &Detection) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.w).min(other.x + other.w);
        let y2 = (self.y + self.h).min(other.y + other.h);
        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.w * self.h + other.w * other.h - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(x: f32, y: f32, w: f32, h: f32) -> Detection {
        Detection {
            x,
            y,
            w,
            h,
            confidence: 1.0,
            class_id: 0,
        }
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = boxed(0.1, 0.1, 0.4, 0.4);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = boxed(0.0, 0.0, 0.2, 0.2);
        let b = boxed(0.5, 0.5, 0.2, 0.2);
        assert_eq!(a.iou(&b), 0.0);
    }
}
