use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use bgremove_api::{
    router, BackgroundRemovalProcessor, BackgroundRemover, BgRemovalError, MockBackend,
    ProcessorRemover, RemovalConfig,
};
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::Value;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

const BOUNDARY: &str = "X-BGREMOVE-TEST-BOUNDARY";
const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

/// Returns a fixed payload and remembers the size of every upload it saw
#[derive(Default)]
struct RecordingRemover {
    seen: Mutex<Vec<usize>>,
}

impl BackgroundRemover for RecordingRemover {
    fn remove(&self, image_bytes: &[u8]) -> bgremove_api::Result<Vec<u8>> {
        self.seen.lock().unwrap().push(image_bytes.len());
        Ok(FAKE_PNG.to_vec())
    }
}

struct FailingRemover;

impl BackgroundRemover for FailingRemover {
    fn remove(&self, _image_bytes: &[u8]) -> bgremove_api::Result<Vec<u8>> {
        Err(BgRemovalError::processing("model exploded"))
    }
}

struct PanickingRemover;

impl BackgroundRemover for PanickingRemover {
    fn remove(&self, _image_bytes: &[u8]) -> bgremove_api::Result<Vec<u8>> {
        panic!("decoder crashed");
    }
}

struct Part<'a> {
    name: &'a str,
    content_type: Option<&'a str>,
    data: &'a [u8],
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"upload.bin\"\r\n",
                part.name
            )
            .as_bytes(),
        );
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/remove-bg")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn image_upload(data: &[u8]) -> Request<Body> {
    upload_request(&[Part {
        name: "file",
        content_type: Some("image/jpeg"),
        data,
    }])
}

fn app(remover: Arc<dyn BackgroundRemover>) -> Router {
    router(remover)
}

async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 128])
    });
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buffer, ImageFormat::Jpeg)
        .unwrap();
    buffer.into_inner()
}

#[tokio::test]
async fn health_check_returns_fixed_message() {
    let response = app(Arc::new(RecordingRemover::default()))
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "message": "Background Removal API is running." })
    );
}

#[tokio::test]
async fn image_upload_streams_png() {
    let remover = Arc::new(RecordingRemover::default());
    let response = app(remover.clone())
        .oneshot(image_upload(b"jpeg bytes"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
    assert_eq!(body_bytes(response).await, FAKE_PNG);
    assert_eq!(*remover.seen.lock().unwrap(), vec![10]);
}

#[tokio::test]
async fn non_image_content_type_is_rejected() {
    let remover = Arc::new(RecordingRemover::default());
    let response = app(remover.clone())
        .oneshot(upload_request(&[Part {
            name: "file",
            content_type: Some("text/plain"),
            data: b"hello",
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "detail": "File provided is not an image." })
    );
    assert!(remover.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_content_type_is_not_an_image() {
    let response = app(Arc::new(RecordingRemover::default()))
        .oneshot(upload_request(&[Part {
            name: "file",
            content_type: None,
            data: b"\xff\xd8\xff",
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["detail"], "File provided is not an image.");
}

#[tokio::test]
async fn file_field_is_found_after_other_fields() {
    let remover = Arc::new(RecordingRemover::default());
    let response = app(remover.clone())
        .oneshot(upload_request(&[
            Part {
                name: "note",
                content_type: Some("text/plain"),
                data: b"ignored",
            },
            Part {
                name: "file",
                content_type: Some("image/png"),
                data: b"abc",
            },
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(*remover.seen.lock().unwrap(), vec![3]);
}

#[tokio::test]
async fn missing_file_field_is_unprocessable() {
    let response = app(Arc::new(RecordingRemover::default()))
        .oneshot(upload_request(&[Part {
            name: "image",
            content_type: Some("image/png"),
            data: b"abc",
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["detail"][0]["type"], "missing");
    assert_eq!(json["detail"][0]["loc"], serde_json::json!(["body", "file"]));
    assert_eq!(json["detail"][0]["msg"], "Field required");
}

#[tokio::test]
async fn non_multipart_body_is_a_parse_error() {
    let response = app(Arc::new(RecordingRemover::default()))
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/remove-bg")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["detail"],
        "There was an error parsing the body"
    );
}

#[tokio::test]
async fn processing_failure_reports_error_text() {
    let response = app(Arc::new(FailingRemover))
        .oneshot(image_upload(b"jpeg bytes"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body_json(response).await["detail"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(detail.starts_with("Error processing image: "));
    assert!(detail.contains("model exploded"));
}

#[tokio::test]
async fn panicking_remover_yields_server_error() {
    let app = app(Arc::new(PanickingRemover));

    let response = app.clone().oneshot(image_upload(b"jpeg bytes")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body_json(response).await["detail"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(detail.starts_with("Error processing image: "));

    // The router keeps serving after the worker panic
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn large_uploads_are_accepted() {
    let remover = Arc::new(RecordingRemover::default());
    let payload = vec![0u8; 5 * 1024 * 1024];

    let response = app(remover.clone())
        .oneshot(image_upload(&payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(*remover.seen.lock().unwrap(), vec![payload.len()]);
}

#[tokio::test]
async fn cors_preflight_from_any_origin_is_accepted() {
    let response = app(Arc::new(RecordingRemover::default()))
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/remove-bg")
                .header(header::ORIGIN, "https://frontend.example")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_success());
    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "https://frontend.example"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
}

#[tokio::test]
async fn mock_backed_removal_returns_transparent_png() {
    let processor = BackgroundRemovalProcessor::new(
        RemovalConfig::default(),
        Box::new(MockBackend::with_size(32)),
    );
    let remover: Arc<dyn BackgroundRemover> = Arc::new(ProcessorRemover::new(processor));

    let response = app(remover)
        .oneshot(image_upload(&jpeg_bytes(48, 36)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let png = body_bytes(response).await;
    let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png)
        .unwrap()
        .to_rgba8();
    assert_eq!(decoded.dimensions(), (48, 36));
    assert_eq!(decoded.get_pixel(0, 0)[3], 0);
    assert!(decoded.get_pixel(24, 18)[3] > 200);
}

#[tokio::test]
async fn undecodable_image_is_a_processing_error() {
    let processor = BackgroundRemovalProcessor::new(
        RemovalConfig::default(),
        Box::new(MockBackend::new()),
    );
    let remover: Arc<dyn BackgroundRemover> = Arc::new(ProcessorRemover::new(processor));

    let response = app(remover)
        .oneshot(image_upload(b"not really a jpeg"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert!(json["detail"]
        .as_str()
        .unwrap()
        .contains("Failed to decode image from bytes"));
}
