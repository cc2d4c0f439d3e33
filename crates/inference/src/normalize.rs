use crate::{backend::InferenceOutput, labels::LabelMap};
use anyhow::Context;
use schema::{BoundingBox, DetectionRecord, DetectionResult};

/// Zip the model's parallel arrays into a [`DetectionResult`].
///
/// Row order is preserved. Coordinates and scores pass through unchanged;
/// width, height and centre are derived from the corners.
pub fn build_detection_result(
    output: &InferenceOutput,
    labels: &LabelMap,
    image_width: u32,
    image_height: u32,
) -> anyhow::Result<DetectionResult> {
    let InferenceOutput {
        boxes,
        class_ids,
        scores,
    } = output;

    if boxes.ncols() != 4 {
        anyhow::bail!(
            "Expected boxes with 4 coordinates per row, got shape {:?}",
            boxes.shape()
        );
    }

    if boxes.nrows() != class_ids.len() || boxes.nrows() != scores.len() {
        anyhow::bail!(
            "Model output length mismatch: {} boxes, {} class ids, {} scores",
            boxes.nrows(),
            class_ids.len(),
            scores.len()
        );
    }

    let detections = boxes
        .rows()
        .into_iter()
        .zip(class_ids.iter())
        .zip(scores.iter())
        .map(|((bbox, &class_id), &confidence)| -> anyhow::Result<DetectionRecord> {
            let class_id = u32::try_from(class_id)
                .with_context(|| format!("Invalid class id {}", class_id))?;

            Ok(DetectionRecord {
                class_id,
                class_name: labels.name(class_id),
                confidence,
                bbox: BoundingBox::from_corners(
                    bbox[0],
                    bbox[1],
                    bbox[2],
                    bbox[3],
                    image_width,
                    image_height,
                ),
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(DetectionResult::new(image_width, image_height, detections))
}
