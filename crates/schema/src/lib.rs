//! JSON contract exchanged between the inference service and its clients.
//!
//! A [`DetectionResult`] is built fresh for every image and serialized as-is;
//! field names and nesting are part of the wire format.

use serde::{Deserialize, Serialize};

/// Axis-aligned box in image pixel space, given by two opposite corners
/// plus geometry derived from them.
///
/// Values are never clamped to the image bounds or rounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub width: f64,
    pub height: f64,
    pub x_center: f64,
    pub y_center: f64,
    pub image_width: u32,
    pub image_height: u32,
}

impl BoundingBox {
    pub fn from_corners(
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        image_width: u32,
        image_height: u32,
    ) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            width: x2 - x1,
            height: y2 - y1,
            x_center: (x1 + x2) / 2.0,
            y_center: (y1 + y2) / 2.0,
            image_width,
            image_height,
        }
    }
}

/// One detected object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub class_id: u32,
    pub class_name: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// Everything detected in one image, in the order the model emitted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub image_width: u32,
    pub image_height: u32,
    pub num_detections: usize,
    pub detections: Vec<DetectionRecord>,
}

impl DetectionResult {
    pub fn new(image_width: u32, image_height: u32, detections: Vec<DetectionRecord>) -> Self {
        Self {
            image_width,
            image_height,
            num_detections: detections.len(),
            detections,
        }
    }

    /// Result for an absent image: zero size, no detections.
    pub fn empty() -> Self {
        Self::new(0, 0, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

impl Default for DetectionResult {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person() -> DetectionRecord {
        DetectionRecord {
            class_id: 0,
            class_name: "person".to_string(),
            confidence: 0.9,
            bbox: BoundingBox::from_corners(10.0, 20.0, 110.0, 220.0, 640, 480),
        }
    }

    #[test]
    fn test_bbox_derived_geometry() {
        let bbox = BoundingBox::from_corners(10.0, 20.0, 110.0, 220.0, 640, 480);
        assert_eq!(bbox.width, 100.0);
        assert_eq!(bbox.height, 200.0);
        assert_eq!(bbox.x_center, 60.0);
        assert_eq!(bbox.y_center, 120.0);
        assert_eq!(bbox.image_width, 640);
        assert_eq!(bbox.image_height, 480);
    }

    #[test]
    fn test_bbox_is_not_clamped_or_rounded() {
        // Partially outside a 100x100 image, fractional corners
        let bbox = BoundingBox::from_corners(-5.25, 90.5, 120.75, 130.125, 100, 100);
        assert_eq!(bbox.x1, -5.25);
        assert_eq!(bbox.x2, 120.75);
        assert_eq!(bbox.width, 120.75 - -5.25);
        assert_eq!(bbox.height, 130.125 - 90.5);
        assert_eq!(bbox.x_center, (-5.25 + 120.75) / 2.0);
        assert_eq!(bbox.y_center, (90.5 + 130.125) / 2.0);
    }

    #[test]
    fn test_num_detections_tracks_list_length() {
        let result = DetectionResult::new(640, 480, vec![person(), person(), person()]);
        assert_eq!(result.num_detections, 3);
        assert_eq!(result.num_detections, result.detections.len());
    }

    #[test]
    fn test_empty_result_json_shape() {
        let value = serde_json::to_value(DetectionResult::empty()).unwrap();
        assert_eq!(
            value,
            json!({
                "image_width": 0,
                "image_height": 0,
                "num_detections": 0,
                "detections": []
            })
        );
    }

    #[test]
    fn test_detection_json_shape() {
        let result = DetectionResult::new(640, 480, vec![person()]);
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(
            value,
            json!({
                "image_width": 640,
                "image_height": 480,
                "num_detections": 1,
                "detections": [{
                    "class_id": 0,
                    "class_name": "person",
                    "confidence": 0.9,
                    "bbox": {
                        "x1": 10.0, "y1": 20.0, "x2": 110.0, "y2": 220.0,
                        "width": 100.0, "height": 200.0,
                        "x_center": 60.0, "y_center": 120.0,
                        "image_width": 640, "image_height": 480
                    }
                }]
            })
        );
    }

    #[test]
    fn test_deserializes_what_it_serializes() {
        let mut record = person();
        record.class_name = "pessoa çà".to_string();
        let result = DetectionResult::new(640, 480, vec![record]);

        let text = serde_json::to_string_pretty(&result).unwrap();
        assert!(text.contains("pessoa çà"), "non-ASCII must stay unescaped");

        let back: DetectionResult = serde_json::from_str(&text).unwrap();
        assert_eq!(back, result);
    }
}
