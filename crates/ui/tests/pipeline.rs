//! End-to-end tests for the UI against a stand-in inference service bound to
//! an ephemeral local port.

use axum::{
    Json, Router,
    body::Body,
    extract::{Multipart, State},
    http::{Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use schema::{BoundingBox, DetectionRecord, DetectionResult};
use serde_json::{Value, json};
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::tempdir;
use tower::ServiceExt;
use ui::{
    ClientError, InferenceClient, InteractionError, Overlay, Session, export, interaction,
    router,
};

const BOUNDARY: &str = "ui-test-boundary";

#[derive(Clone)]
struct Upstream {
    hits: Arc<AtomicUsize>,
    fail: bool,
}

fn person_result(width: u32, height: u32) -> DetectionResult {
    DetectionResult::new(
        width,
        height,
        vec![DetectionRecord {
            class_id: 0,
            class_name: "person".to_string(),
            confidence: 0.9,
            bbox: BoundingBox::from_corners(10.0, 20.0, 110.0, 220.0, width, height),
        }],
    )
}

/// Checks the upload follows the inference API contract, then answers with
/// one canned detection or a 500.
async fn stub_predict(State(upstream): State<Upstream>, mut multipart: Multipart) -> Response {
    upstream.hits.fetch_add(1, Ordering::SeqCst);

    let mut size = (0, 0);
    while let Some(field) = multipart.next_field().await.unwrap() {
        if field.name() == Some("file") {
            assert_eq!(field.file_name(), Some("image.png"));
            let bytes = field.bytes().await.unwrap();
            let image = image::load_from_memory_with_format(&bytes, ImageFormat::Png).unwrap();
            size = (image.width(), image.height());
        }
    }

    if upstream.fail {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "Inference failed: backend unavailable"})),
        )
            .into_response();
    }

    Json(person_result(size.0, size.1)).into_response()
}

async fn spawn_upstream(fail: bool) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/health", get(|| async { Json(json!({"status": "ok"})) }))
        .route("/predict", post(stub_predict))
        .with_state(Upstream {
            hits: hits.clone(),
            fail,
        });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), hits)
}

fn session(base_url: &str, output_dir: &Path) -> Session {
    let client = InferenceClient::new(base_url, Duration::from_secs(10)).unwrap();
    Session::new(client, Overlay::new().unwrap(), output_dir.to_path_buf())
}

fn test_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([0, 128, 255])))
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    test_image(width, height)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn saved_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

fn detect_request(image: Option<&[u8]>) -> Request<Body> {
    let mut body = Vec::new();
    if let Some(data) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"image\"; filename=\"upload.png\"\r\n\
                 Content-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/detect")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn test_null_image_makes_no_request_and_writes_nothing() {
    let (base_url, hits) = spawn_upstream(false).await;
    let dir = tempdir().unwrap();

    let outcome = interaction::run(&session(&base_url, dir.path()), None)
        .await
        .unwrap();

    assert!(outcome.is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(saved_files(dir.path()).is_empty());
}

#[tokio::test]
async fn test_interaction_writes_exactly_one_round_tripping_file() {
    let (base_url, hits) = spawn_upstream(false).await;
    let dir = tempdir().unwrap();

    let outcome = interaction::run(&session(&base_url, dir.path()), Some(test_image(320, 240)))
        .await
        .unwrap()
        .expect("an image was supplied");

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.result, person_result(320, 240));
    assert_eq!(outcome.annotated.dimensions(), (320, 240));
    assert_eq!(*outcome.annotated.get_pixel(10, 100), Rgb([255, 0, 0]));

    let files = saved_files(dir.path());
    assert_eq!(files.len(), 1);
    assert!(export::is_export_file_name(&files[0]), "{}", files[0]);
    assert_eq!(outcome.json_file_name(), Some(files[0].as_str()));

    let restored: DetectionResult =
        serde_json::from_str(&fs::read_to_string(&outcome.json_path).unwrap()).unwrap();
    assert_eq!(restored, outcome.result);
}

#[tokio::test]
async fn test_every_interaction_gets_its_own_file() {
    let (base_url, _) = spawn_upstream(false).await;
    let dir = tempdir().unwrap();
    let session = session(&base_url, dir.path());

    for _ in 0..3 {
        interaction::run(&session, Some(test_image(64, 64)))
            .await
            .unwrap();
    }

    let files = saved_files(dir.path());
    assert_eq!(files.len(), 3);
    files.windows(2).for_each(|w| assert_ne!(w[0], w[1]));
}

#[tokio::test]
async fn test_upstream_failure_aborts_without_output() {
    let (base_url, hits) = spawn_upstream(true).await;
    let dir = tempdir().unwrap();

    let err = interaction::run(&session(&base_url, dir.path()), Some(test_image(32, 32)))
        .await
        .unwrap_err();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    match err {
        InteractionError::Inference(ClientError::Upstream { status, detail }) => {
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(detail, "Inference failed: backend unavailable");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(saved_files(dir.path()).is_empty());
}

#[tokio::test]
async fn test_unreachable_service_is_a_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dir = tempdir().unwrap();
    let session = session(&format!("http://{addr}"), dir.path());

    assert!(matches!(
        session.client().health().await,
        Err(ClientError::Transport(_))
    ));
    let err = interaction::run(&session, Some(test_image(8, 8)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        InteractionError::Inference(ClientError::Transport(_))
    ));
    assert!(saved_files(dir.path()).is_empty());
}

#[tokio::test]
async fn test_health_check_succeeds_against_live_service() {
    let (base_url, hits) = spawn_upstream(false).await;
    let dir = tempdir().unwrap();

    session(&base_url, dir.path()).client().health().await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 0, "health does not hit /predict");
}

#[tokio::test]
async fn test_web_detect_then_download() {
    let (base_url, _) = spawn_upstream(false).await;
    let dir = tempdir().unwrap();
    let app = router(Arc::new(session(&base_url, dir.path())));

    let response = app
        .clone()
        .oneshot(detect_request(Some(png_bytes(200, 300).as_slice())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["detections"]["num_detections"], json!(1));
    assert_eq!(body["detections"]["detections"][0]["class_name"], json!("person"));

    let data_url = body["annotated_image"].as_str().unwrap();
    let png = STANDARD
        .decode(data_url.strip_prefix("data:image/png;base64,").unwrap())
        .unwrap();
    let annotated = image::load_from_memory(&png).unwrap();
    assert_eq!((annotated.width(), annotated.height()), (200, 300));

    let download_url = body["download_url"].as_str().unwrap().to_string();
    let files = saved_files(dir.path());
    assert_eq!(download_url, format!("/outputs/{}", files[0]));

    let response = app
        .oneshot(
            Request::builder()
                .uri(&download_url)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("attachment")
    );

    let restored: DetectionResult = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(restored, person_result(200, 300));
}

#[tokio::test]
async fn test_web_detect_without_image_is_no_content() {
    let (base_url, hits) = spawn_upstream(false).await;
    let dir = tempdir().unwrap();
    let app = router(Arc::new(session(&base_url, dir.path())));

    let response = app.clone().oneshot(detect_request(None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.oneshot(detect_request(Some(b"".as_slice()))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(saved_files(dir.path()).is_empty());
}

#[tokio::test]
async fn test_web_detect_rejects_non_images() {
    let (base_url, hits) = spawn_upstream(false).await;
    let dir = tempdir().unwrap();
    let app = router(Arc::new(session(&base_url, dir.path())));

    let response = app
        .oneshot(detect_request(Some(b"definitely not an image".as_slice())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_web_detect_reports_upstream_failure_as_bad_gateway() {
    let (base_url, _) = spawn_upstream(true).await;
    let dir = tempdir().unwrap();
    let app = router(Arc::new(session(&base_url, dir.path())));

    let response = app
        .oneshot(detect_request(Some(png_bytes(16, 16).as_slice())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert!(body["detail"].as_str().unwrap().contains("backend unavailable"));
    assert!(saved_files(dir.path()).is_empty());
}

#[tokio::test]
async fn test_download_only_serves_export_files() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("notes.txt"), "secret").unwrap();
    let app = router(Arc::new(session("http://127.0.0.1:9", dir.path())));

    for uri in [
        "/outputs/notes.txt",
        "/outputs/detections_0123456789abcdef0123456789abcdef.json",
        "/outputs/..%2Fnotes.txt",
    ] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn test_index_page_is_served() {
    let dir = tempdir().unwrap();
    let app = router(Arc::new(session("http://127.0.0.1:9", dir.path())));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(html.contains("/api/detect"));
}
