//! One user action: upload, annotate, export.

use crate::{
    client::{ClientError, InferenceClient},
    config::UiConfig,
    export,
    overlay::Overlay,
};
use image::{DynamicImage, ImageFormat, RgbImage};
use schema::DetectionResult;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InteractionError {
    #[error(transparent)]
    Inference(#[from] ClientError),

    #[error("Could not encode annotated image: {0}")]
    Encode(image::ImageError),

    #[error("Could not save detections: {0}")]
    Export(#[from] io::Error),

    #[error("Annotation worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Everything a UI process shares between interactions.
pub struct Session {
    client: InferenceClient,
    overlay: Arc<Overlay>,
    output_dir: PathBuf,
}

impl Session {
    pub fn new(client: InferenceClient, overlay: Overlay, output_dir: PathBuf) -> Self {
        Self {
            client,
            overlay: Arc::new(overlay),
            output_dir,
        }
    }

    /// Build a session from config, creating the output directory.
    pub fn from_config(config: &UiConfig) -> anyhow::Result<Self> {
        export::ensure_output_dir(&config.output_dir)?;

        let client = InferenceClient::new(&config.api_url, config.request_timeout)?;
        let overlay = Overlay::new()?;

        Ok(Self::new(client, overlay, config.output_dir.clone()))
    }

    pub fn client(&self) -> &InferenceClient {
        &self.client
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Outcome of a successful interaction.
#[derive(Debug)]
pub struct Interaction {
    pub annotated: RgbImage,
    /// `annotated` encoded as PNG.
    pub annotated_png: Vec<u8>,
    pub result: DetectionResult,
    pub json_path: PathBuf,
}

impl Interaction {
    pub fn json_file_name(&self) -> Option<&str> {
        self.json_path.file_name().and_then(|name| name.to_str())
    }
}

/// Send `image` for detection, draw the result on it and save the JSON.
///
/// No image means nothing to do: no request is made and nothing is written.
/// Any failure aborts before the JSON file is created.
#[tracing::instrument(skip_all)]
pub async fn run(
    session: &Session,
    image: Option<DynamicImage>,
) -> Result<Option<Interaction>, InteractionError> {
    let Some(image) = image else {
        tracing::debug!("No image supplied, skipping");
        return Ok(None);
    };

    let result = session.client.predict(&image).await?;

    let overlay = Arc::clone(&session.overlay);
    let output_dir = session.output_dir.clone();

    let interaction = tokio::task::spawn_blocking(move || {
        annotate_and_export(&overlay, &image.to_rgb8(), result, &output_dir)
    })
    .await??;

    tracing::info!(
        detections = interaction.result.num_detections,
        path = %interaction.json_path.display(),
        "Interaction complete"
    );

    Ok(Some(interaction))
}

/// Draw, encode, then save. The JSON file is the last step so a failure
/// anywhere earlier leaves nothing on disk.
fn annotate_and_export(
    overlay: &Overlay,
    image: &RgbImage,
    result: DetectionResult,
    output_dir: &Path,
) -> Result<Interaction, InteractionError> {
    let annotated = overlay.draw(image, &result);

    let mut png = Cursor::new(Vec::new());
    annotated
        .write_to(&mut png, ImageFormat::Png)
        .map_err(InteractionError::Encode)?;

    let json_path = export::save_detections_json(output_dir, &result)?;

    Ok(Interaction {
        annotated,
        annotated_png: png.into_inner(),
        result,
        json_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_annotated_png_matches_image() {
        let dir = tempdir().unwrap();
        let overlay = Overlay::new().unwrap();

        let image = RgbImage::new(16, 8);
        let result = DetectionResult::new(16, 8, vec![]);
        let interaction = annotate_and_export(&overlay, &image, result, dir.path()).unwrap();

        let decoded =
            image::load_from_memory_with_format(&interaction.annotated_png, ImageFormat::Png)
                .unwrap()
                .to_rgb8();
        assert_eq!(decoded, interaction.annotated);
        assert_eq!(file_count(dir.path()), 1);
    }

    #[test]
    fn test_encode_failure_writes_no_json() {
        let dir = tempdir().unwrap();
        let overlay = Overlay::new().unwrap();

        // PNG cannot represent a zero-sized image.
        let err = annotate_and_export(
            &overlay,
            &RgbImage::new(0, 0),
            DetectionResult::empty(),
            dir.path(),
        )
        .unwrap_err();

        assert!(matches!(err, InteractionError::Encode(_)), "{err:?}");
        assert_eq!(file_count(dir.path()), 0);
    }
}
