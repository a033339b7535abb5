#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use image::{ImageBuffer, Rgb};
use skin_check_server::core::session::MemorySessionStore;
use skin_check_server::core::upload::{DEFAULT_ALLOWED_EXTENSIONS, UploadPolicy};
use skin_check_server::core::yolo::{DetectionOutcome, DetectionRecord, Detector};
use skin_check_server::handler::AppState;
use skin_check_server::server;
use tempfile::TempDir;

const BOUNDARY: &str = "----skincheck-test-boundary";

/// Labels each call `finding-<n>` so tests can tell runs apart.
pub struct CountingDetector {
    pub calls: AtomicUsize,
    pub findings_per_call: usize,
}

impl CountingDetector {
    pub fn new(findings_per_call: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            findings_per_call,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Detector for CountingDetector {
    fn input_dimension(&self) -> u32 {
        640
    }

    fn detect(&self, img_path: &Path) -> DetectionOutcome {
        assert!(img_path.is_file(), "detector ran before the file was saved");
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        DetectionOutcome::Success(
            (0..self.findings_per_call)
                .map(|i| {
                    DetectionRecord::new(
                        format!("finding-{call}"),
                        0.5 + i as f32 * 0.1,
                        [10.0, 20.0, 300.0, 400.0],
                    )
                })
                .collect(),
        )
    }
}

/// Always fails, like a model that chokes on the input.
pub struct BrokenDetector;

impl Detector for BrokenDetector {
    fn input_dimension(&self) -> u32 {
        640
    }

    fn detect(&self, _img_path: &Path) -> DetectionOutcome {
        DetectionOutcome::Failure("model exploded".to_owned())
    }
}

/// Panics mid-detection, like a runtime that aborts on a bad tensor.
pub struct PanickingDetector;

impl Detector for PanickingDetector {
    fn input_dimension(&self) -> u32 {
        640
    }

    fn detect(&self, img_path: &Path) -> DetectionOutcome {
        panic!("inference crashed on {}", img_path.display());
    }
}

pub struct TestApp {
    pub router: Router,
    pub uploads: PathBuf,
    _dir: TempDir,
}

pub fn test_app(detector: Arc<dyn Detector>) -> TestApp {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let uploads = dir.path().join("uploads");
    let policy = UploadPolicy::new(&uploads, DEFAULT_ALLOWED_EXTENSIONS)
        .expect("Failed to create upload policy");
    let state = AppState::new(policy, detector, Arc::new(MemorySessionStore::new()))
        .expect("Failed to build app state");
    let router = server::router(state, dir.path().join("static"), 1024 * 1024);
    TestApp {
        router,
        uploads,
        _dir: dir,
    }
}

/// Encodes a small solid-colour PNG.
pub fn png_bytes(color: [u8; 3]) -> Vec<u8> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(40, 30, |_, _| Rgb(color));
    let mut bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("Failed to encode test image");
    bytes
}

pub fn multipart_upload(
    uri: &str,
    file_name: &str,
    data: &[u8],
    cookie: Option<&str>,
) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// `name=value` part of the Set-Cookie header, ready to send back.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::to_owned)
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}
