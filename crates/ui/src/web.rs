use crate::{
    client::ClientError,
    config::UiConfig,
    export,
    interaction::{self, InteractionError, Session},
};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use schema::DetectionResult;
use serde::Serialize;
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;

/// Multipart field the browser uploads the image in.
pub const IMAGE_FIELD: &str = "image";

const INDEX_HTML: &str = include_str!("../static/index.html");
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum WebError {
    #[error("Invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error(transparent)]
    Interaction(#[from] InteractionError),

    #[error("No such output file")]
    NotFound,

    #[error("Could not read output file: {0}")]
    Io(#[from] io::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::Multipart(e) => e.status(),
            WebError::Decode(_) => StatusCode::BAD_REQUEST,
            WebError::Interaction(InteractionError::Inference(ClientError::Encode(_))) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            WebError::Interaction(InteractionError::Inference(_)) => StatusCode::BAD_GATEWAY,
            WebError::NotFound => StatusCode::NOT_FOUND,
            WebError::Interaction(_) | WebError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, "Rejected request");
        }

        (
            status,
            Json(ErrorBody {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// What the page needs to show one interaction.
#[derive(Debug, Serialize)]
pub struct DetectResponse {
    /// Annotated image as a `data:image/png;base64,` URL.
    pub annotated_image: String,
    pub detections: DetectionResult,
    pub download_url: Option<String>,
}

pub fn router(session: Arc<Session>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/detect", post(detect))
        .route("/outputs/:name", get(download))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(session)
}

pub async fn run_server(config: &UiConfig, session: Arc<Session>) -> anyhow::Result<()> {
    let app = router(session);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("UI listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("UI stopped");
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

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[tracing::instrument(skip_all)]
async fn detect(
    State(session): State<Arc<Session>>,
    mut multipart: Multipart,
) -> Result<Response, WebError> {
    // A submit without a file behaves like a null image.
    let image = match read_image_field(&mut multipart).await? {
        Some(bytes) if !bytes.is_empty() => Some(image::load_from_memory(&bytes)?),
        _ => None,
    };

    let Some(outcome) = interaction::run(&session, image).await? else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    let response = DetectResponse {
        annotated_image: png_data_url(&outcome.annotated_png),
        download_url: outcome
            .json_file_name()
            .map(|name| format!("/outputs/{name}")),
        detections: outcome.result,
    };

    Ok(Json(response).into_response())
}

async fn download(
    State(session): State<Arc<Session>>,
    Path(name): Path<String>,
) -> Result<Response, WebError> {
    if !export::is_export_file_name(&name) {
        return Err(WebError::NotFound);
    }

    let body = match tokio::fs::read(session.output_dir().join(&name)).await {
        Ok(body) => body,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(WebError::NotFound),
        Err(e) => return Err(e.into()),
    };

    let headers = [
        (header::CONTENT_TYPE, "application/json".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{name}\""),
        ),
    ];

    Ok((headers, body).into_response())
}

async fn read_image_field(multipart: &mut Multipart) -> Result<Option<Vec<u8>>, WebError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(IMAGE_FIELD) {
            return Ok(Some(field.bytes().await?.to_vec()));
        }
    }
    Ok(None)
}

fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}
