use crate::{
    backend::InferenceBackend, config::InferenceConfig, detector::Detector, errors::ApiError,
    metrics::Metrics,
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
};
use schema::DetectionResult;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;

/// Multipart field carrying the uploaded image.
pub const FILE_FIELD: &str = "file";

pub struct AppState<B> {
    pub detector: Arc<Detector<B>>,
    pub metrics: Arc<Metrics>,
}

impl<B> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            detector: Arc::clone(&self.detector),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<B: InferenceBackend> AppState<B> {
    pub fn new(detector: Detector<B>) -> Self {
        Self {
            detector: Arc::new(detector),
            metrics: Arc::new(Metrics::default()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

pub fn router<B: InferenceBackend + 'static>(state: AppState<B>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict::<B>))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server<B: InferenceBackend + 'static>(
    config: &InferenceConfig,
    state: AppState<B>,
) -> anyhow::Result<()> {
    let app = router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Inference API listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Inference API stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

/// Liveness only: never touches the model.
async fn health() -> Json<HealthStatus> {
    Json(HealthStatus { status: "ok" })
}

#[tracing::instrument(skip_all)]
async fn predict<B: InferenceBackend + 'static>(
    State(state): State<AppState<B>>,
    multipart: Multipart,
) -> Result<Json<DetectionResult>, ApiError> {
    let start = Instant::now();
    let outcome = detect_upload(&state, multipart).await;
    let elapsed = start.elapsed().as_secs_f64();

    match &outcome {
        Ok(result) => {
            state.metrics.record_success(elapsed, result.num_detections);
            tracing::debug!(
                detections = result.num_detections,
                width = result.image_width,
                height = result.image_height,
                elapsed_ms = elapsed * 1000.0,
                "Prediction served"
            );
        }
        Err(e) => state.metrics.record_failure(elapsed, e.kind()),
    }

    outcome.map(Json)
}

async fn detect_upload<B: InferenceBackend + 'static>(
    state: &AppState<B>,
    mut multipart: Multipart,
) -> Result<DetectionResult, ApiError> {
    let bytes = read_file_field(&mut multipart).await?;
    let detector = Arc::clone(&state.detector);

    tokio::task::spawn_blocking(move || {
        let image = image::load_from_memory(&bytes)?.to_rgb8();
        detector
            .predict(Some(&image))
            .map_err(ApiError::Inference)
    })
    .await?
}

async fn read_file_field(multipart: &mut Multipart) -> Result<Bytes, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            return Ok(field.bytes().await?);
        }
    }
    Err(ApiError::MissingFile)
}
