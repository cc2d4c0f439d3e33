use image::{DynamicImage, ImageFormat};
use reqwest::{StatusCode, multipart};
use schema::DetectionResult;
use serde::Deserialize;
use std::io::Cursor;
use std::time::Duration;
use thiserror::Error;

/// Multipart field the inference service reads the image from.
const FILE_FIELD: &str = "file";
const UPLOAD_FILE_NAME: &str = "image.png";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Could not encode image: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Inference service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Inference service returned {status}: {detail}")]
    Upstream { status: StatusCode, detail: String },
}

/// Error payload returned by the inference service.
#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// HTTP client for the inference service. Cheap to clone.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    http: reqwest::Client,
    base_url: String,
}

impl InferenceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upload `image` as PNG and return the detections the service found.
    ///
    /// Any non-success status aborts with [`ClientError::Upstream`]; nothing
    /// is retried.
    #[tracing::instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub async fn predict(&self, image: &DynamicImage) -> Result<DetectionResult, ClientError> {
        let png = encode_png(image)?;

        let part = multipart::Part::bytes(png)
            .file_name(UPLOAD_FILE_NAME)
            .mime_str("image/png")?;
        let form = multipart::Form::new().part(FILE_FIELD, part);

        let response = self
            .http
            .post(format!("{}/predict", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let result = ensure_success(response)
            .await?
            .json::<DetectionResult>()
            .await?;

        tracing::debug!(detections = result.num_detections, "Received detections");

        Ok(result)
    }

    /// Probe `GET /health` once.
    pub async fn health(&self) -> Result<(), ClientError> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ClientError> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => body,
    };

    Err(ClientError::Upstream { status, detail })
}
