use crate::backend::InferenceOutput;
use ndarray::{Array1, Array2, ArrayViewD};
use std::cmp::Ordering;

/// Letterbox parameters of the preprocessed input, used to map boxes from
/// model input space back onto the original image.
pub struct TransformParams {
    pub orig_width: u32,
    pub orig_height: u32,
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

/// One decoded box in original image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: usize,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn iou(&self, other: &Candidate) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

pub struct PostProcessor {
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl PostProcessor {
    pub fn new(iou_threshold: f32, max_detections: usize) -> Self {
        Self {
            iou_threshold,
            max_detections,
        }
    }

    /// Decode raw YOLOv8 output into final detections.
    ///
    /// `predictions` is `[1, 4 + num_classes, num_anchors]`: rows 0..4 hold
    /// the box as cx, cy, w, h in input pixels, the remaining rows hold one
    /// score per class. Returns at most `max_detections` boxes after
    /// class-aware NMS, highest confidence first.
    #[tracing::instrument(skip(self, predictions, transform))]
    pub fn parse_detections(
        &self,
        predictions: &ArrayViewD<f32>,
        confidence_threshold: f32,
        transform: &TransformParams,
    ) -> anyhow::Result<Vec<Candidate>> {
        let shape = predictions.shape();
        if shape.len() != 3 || shape[0] != 1 || shape[1] <= 4 {
            anyhow::bail!(
                "Unexpected YOLO output shape {:?}, expected [1, 4 + classes, anchors]",
                shape
            );
        }

        let num_rows = shape[1];
        let num_anchors = shape[2];

        let mut candidates = Vec::new();

        for i in 0..num_anchors {
            let mut confidence = f32::NEG_INFINITY;
            let mut class_id = 0usize;
            for c in 4..num_rows {
                let score = predictions[[0, c, i]];
                if score > confidence {
                    confidence = score;
                    class_id = c - 4;
                }
            }

            if confidence <= confidence_threshold {
                continue;
            }

            let cx = predictions[[0, 0, i]];
            let cy = predictions[[0, 1, i]];
            let w = predictions[[0, 2, i]];
            let h = predictions[[0, 3, i]];

            let (x1, y1, x2, y2) = cxcywh_to_xyxy(cx, cy, w, h);

            candidates.push(Candidate {
                x1: unletterbox(x1, transform.offset_x, transform.scale, transform.orig_width),
                y1: unletterbox(y1, transform.offset_y, transform.scale, transform.orig_height),
                x2: unletterbox(x2, transform.offset_x, transform.scale, transform.orig_width),
                y2: unletterbox(y2, transform.offset_y, transform.scale, transform.orig_height),
                confidence,
                class_id,
            });
        }

        let kept = self.nms(candidates);

        tracing::trace!(kept = kept.len(), "Decoded detections");

        Ok(kept)
    }

    /// Greedy per-class non-maximum suppression.
    fn nms(&self, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });

        let mut kept: Vec<Candidate> = Vec::new();

        for candidate in candidates {
            if kept.len() >= self.max_detections {
                break;
            }

            let suppressed = kept.iter().any(|k| {
                k.class_id == candidate.class_id && k.iou(&candidate) > self.iou_threshold
            });

            if !suppressed {
                kept.push(candidate);
            }
        }

        kept
    }
}

/// Pack decoded detections into the parallel arrays the detector consumes.
pub fn to_inference_output(candidates: &[Candidate]) -> InferenceOutput {
    let n = candidates.len();

    let mut boxes = Array2::<f64>::zeros((n, 4));
    for (i, c) in candidates.iter().enumerate() {
        boxes[[i, 0]] = c.x1 as f64;
        boxes[[i, 1]] = c.y1 as f64;
        boxes[[i, 2]] = c.x2 as f64;
        boxes[[i, 3]] = c.y2 as f64;
    }

    InferenceOutput {
        boxes,
        class_ids: candidates.iter().map(|c| c.class_id as i64).collect::<Array1<_>>(),
        scores: candidates
            .iter()
            .map(|c| c.confidence as f64)
            .collect::<Array1<_>>(),
    }
}

/// Convert bounding box from center-width-height format to corner format
#[inline]
fn cxcywh_to_xyxy(cx: f32, cy: f32, w: f32, h: f32) -> (f32, f32, f32, f32) {
    let x1 = cx - w / 2.0;
    let y1 = cy - h / 2.0;
    let x2 = cx + w / 2.0;
    let y2 = cy + h / 2.0;
    (x1, y1, x2, y2)
}

/// Undo the letterbox on one coordinate and clip it to the original image.
#[inline]
fn unletterbox(v: f32, offset: f32, scale: f32, limit: u32) -> f32 {
    ((v - offset) / scale).max(0.0).min(limit as f32)
}
