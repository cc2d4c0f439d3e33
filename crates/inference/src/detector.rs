use crate::{backend::InferenceBackend, normalize::build_detection_result};
use image::RgbImage;
use schema::DetectionResult;
use std::sync::{Mutex, PoisonError};

/// The normalization layer: runs the model once per image and turns its raw
/// arrays into a [`DetectionResult`].
///
/// The backend is loaded once by the caller and injected here. ONNX Runtime
/// sessions need `&mut` to run, so calls are serialized on a mutex; the
/// weights themselves are never modified. A poisoned lock is reclaimed, so a
/// panic in one call does not fail the calls after it.
pub struct Detector<B> {
    backend: Mutex<B>,
    confidence_threshold: f32,
}

impl<B: InferenceBackend> Detector<B> {
    pub fn new(backend: B, confidence_threshold: f32) -> Self {
        Self {
            backend: Mutex::new(backend),
            confidence_threshold,
        }
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Detect objects in `image`.
    ///
    /// An absent image yields the empty result rather than an error.
    #[tracing::instrument(skip_all, fields(width, height, detections))]
    pub fn predict(&self, image: Option<&RgbImage>) -> anyhow::Result<DetectionResult> {
        let Some(image) = image else {
            return Ok(DetectionResult::empty());
        };

        let (width, height) = image.dimensions();
        let span = tracing::Span::current();
        span.record("width", width);
        span.record("height", height);

        let mut backend = self
            .backend
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let output = backend.infer(image, self.confidence_threshold)?;
        let result = build_detection_result(&output, backend.labels(), width, height)?;
        drop(backend);

        span.record("detections", result.num_detections);

        Ok(result)
    }
}
