use crate::{config::InferenceConfig, labels::LabelMap};
use image::RgbImage;
use ndarray::{Array1, Array2};

#[cfg(feature = "ort-backend")]
pub mod ort;

/// The detection model: one image in, parallel arrays of boxes, class ids
/// and scores out.
pub trait InferenceBackend: Send {
    fn load_model(config: &InferenceConfig) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Run the model once on a single RGB image.
    ///
    /// Candidates scoring below `confidence_threshold` are dropped by the
    /// backend itself.
    fn infer(
        &mut self,
        image: &RgbImage,
        confidence_threshold: f32,
    ) -> anyhow::Result<InferenceOutput>;

    /// The model's class id to name table.
    fn labels(&self) -> &LabelMap;
}

/// Raw model output for one image.
///
/// Row `i` of each array describes the same candidate; rows are in the
/// order the model emitted them.
#[derive(Debug, Clone, Default)]
pub struct InferenceOutput {
    pub boxes: Array2<f64>,     // [N, 4] x1, y1, x2, y2 in image pixels
    pub class_ids: Array1<i64>, // [N]
    pub scores: Array1<f64>,    // [N]
}

impl InferenceOutput {
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}
