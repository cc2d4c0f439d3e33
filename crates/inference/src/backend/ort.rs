use super::{InferenceBackend, InferenceOutput};
use crate::{
    config::{ExecutionProvider, InferenceConfig},
    labels::LabelMap,
    processing::{
        post::{PostProcessor, TransformParams, to_inference_output},
        pre::PreProcessor,
    },
};
use common::span;
use image::RgbImage;
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};

const INPUT_NAME: &str = "images";
const OUTPUT_NAME: &str = "output0";
const NAMES_METADATA_KEY: &str = "names";

/// YOLOv8 ONNX export running on ONNX Runtime.
pub struct OrtBackend {
    session: Session,
    preprocessor: PreProcessor,
    postprocessor: PostProcessor,
    labels: LabelMap,
}

impl OrtBackend {
    /// Create a session for `path` on the given execution provider
    pub fn build_session(
        path: &str,
        provider: ExecutionProvider,
    ) -> anyhow::Result<Session> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?;

        match provider {
            ExecutionProvider::Cuda => {
                tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
                builder = builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(0)
                        .build()
                        .error_on_failure(),
                ])?;
            }
            ExecutionProvider::Cpu => {
                tracing::info!("Initializing ONNX Runtime with CPU execution provider");
            }
        }

        let session = builder.commit_from_file(path)?;

        tracing::info!("Model loaded from {}", path);
        Ok(session)
    }

    fn read_labels(session: &Session) -> LabelMap {
        let names = session
            .metadata()
            .and_then(|metadata| metadata.custom(NAMES_METADATA_KEY));

        match names {
            Ok(names) => LabelMap::for_model(names.as_deref()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read model metadata, using COCO class names");
                LabelMap::coco()
            }
        }
    }
}

impl InferenceBackend for OrtBackend {
    fn load_model(config: &InferenceConfig) -> anyhow::Result<Self> {
        let session = Self::build_session(&config.model_path, config.device)?;
        let labels = Self::read_labels(&session);

        Ok(Self {
            session,
            preprocessor: PreProcessor::new(config.input_size),
            postprocessor: PostProcessor::new(config.iou_threshold, config.max_detections),
            labels,
        })
    }

    fn infer(
        &mut self,
        image: &RgbImage,
        confidence_threshold: f32,
    ) -> anyhow::Result<InferenceOutput> {
        let pre = self.preprocessor.preprocess(image)?;

        let predictions = {
            let _s = span!("model_inference");
            let outputs = self.session.run(ort::inputs![
                INPUT_NAME => TensorRef::from_array_view(pre.input.view())?
            ])?;
            outputs[OUTPUT_NAME].try_extract_array::<f32>()?.into_owned()
        };

        let transform = TransformParams {
            orig_width: image.width(),
            orig_height: image.height(),
            scale: pre.scale,
            offset_x: pre.offset_x,
            offset_y: pre.offset_y,
        };

        let candidates = self.postprocessor.parse_detections(
            &predictions.view(),
            confidence_threshold,
            &transform,
        )?;

        Ok(to_inference_output(&candidates))
    }

    fn labels(&self) -> &LabelMap {
        &self.labels
    }
}
