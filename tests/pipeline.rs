//! End-to-end integration tests for the cutout pipeline.
//!
//! These tests are hermetic: the remote matting service is either a mock
//! [`BackgroundRemover`] injected through the config, or a one-shot local
//! HTTP server when the wire contract itself is under test. No live API
//! calls, no credentials.

use async_trait::async_trait;
use cutout::{
    Artifact, BackgroundRemover, CutoutError, DownloadDir, OutputFormat, Presenter, RawUpload,
    RemoveBgClient, Session, SessionConfig,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Encode a solid-ish checkered RGBA image as PNG bytes.
fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        if (x + y) % 2 == 0 {
            Rgba([200, 40, 40, 255])
        } else {
            Rgba([40, 40, 200, 255])
        }
    });
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode test fixture");
    buf
}

fn png_upload(width: u32, height: u32) -> RawUpload {
    RawUpload {
        name: "photo.png".into(),
        media_type: "image/png".into(),
        bytes: png_bytes(width, height),
    }
}

/// Presenter that records every port call for assertions.
#[derive(Default)]
struct RecordingPresenter {
    results: Mutex<Vec<Artifact>>,
    errors: Mutex<Vec<String>>,
    busy: Mutex<Vec<bool>>,
}

impl RecordingPresenter {
    fn results(&self) -> Vec<Artifact> {
        self.results.lock().unwrap().clone()
    }
    fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
    fn busy_transitions(&self) -> Vec<bool> {
        self.busy.lock().unwrap().clone()
    }
}

impl Presenter for RecordingPresenter {
    fn notify_result(&self, artifact: &Artifact) {
        self.results.lock().unwrap().push(artifact.clone());
    }
    fn notify_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
    fn set_busy(&self, busy: bool) {
        self.busy.lock().unwrap().push(busy);
    }
}

/// Remover returning a canned response and counting calls.
struct MockRemover {
    response: Result<Vec<u8>, String>,
    calls: AtomicUsize,
}

impl MockRemover {
    fn ok(bytes: Vec<u8>) -> Self {
        Self {
            response: Ok(bytes),
            calls: AtomicUsize::new(0),
        }
    }
    fn err(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BackgroundRemover for MockRemover {
    async fn remove(&self, _image: &[u8]) -> Result<Vec<u8>, CutoutError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.response {
            Ok(bytes) => Ok(bytes.clone()),
            Err(message) => Err(CutoutError::RemoteService {
                message: message.clone(),
            }),
        }
    }
}

/// Remover that parks inside `remove` until the test releases it, so the
/// guard can be observed mid-flight.
struct GatedRemover {
    entered: Arc<Notify>,
    release: Arc<Notify>,
    calls: AtomicUsize,
    result: Vec<u8>,
}

#[async_trait]
impl BackgroundRemover for GatedRemover {
    async fn remove(&self, _image: &[u8]) -> Result<Vec<u8>, CutoutError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.result.clone())
    }
}

fn session_with(
    remover: Option<Arc<dyn BackgroundRemover>>,
    presenter: Arc<RecordingPresenter>,
) -> Session {
    let mut builder = SessionConfig::builder().presenter(presenter as Arc<dyn Presenter>);
    if let Some(remover) = remover {
        builder = builder.remover(remover);
    }
    Session::new(builder.build().expect("valid config"))
}

// ── Intake ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn install_preserves_input_bytes() {
    let presenter = Arc::new(RecordingPresenter::default());
    let session = session_with(None, Arc::clone(&presenter));

    let upload = png_upload(10, 10);
    let original = upload.bytes.clone();
    session.install_artifact(upload);

    let artifact = session.artifact().expect("artifact installed");
    assert_eq!(artifact.bytes, original, "install must not touch the bytes");
    assert_eq!(artifact.media_type, "image/png");
    assert_eq!(artifact.name, "photo.png");
    // Zero operations ran: nothing was presented.
    assert!(presenter.results().is_empty());
    assert!(presenter.errors().is_empty());
}

#[tokio::test]
async fn non_image_upload_is_dropped_silently() {
    let presenter = Arc::new(RecordingPresenter::default());
    let session = session_with(None, Arc::clone(&presenter));

    session.install_artifact(RawUpload {
        name: "report.pdf".into(),
        media_type: "application/pdf".into(),
        bytes: vec![0x25, 0x50, 0x44, 0x46],
    });

    assert!(session.artifact().is_none());
    assert!(
        presenter.errors().is_empty(),
        "a rejected upload must not surface an error"
    );
}

// ── Re-encode ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reencode_100x100_png_to_jpeg() {
    let presenter = Arc::new(RecordingPresenter::default());
    let session = session_with(None, Arc::clone(&presenter));
    session.install_artifact(png_upload(100, 100));

    session.set_quality(80).await;
    session.set_format(OutputFormat::Jpeg).await;

    let artifact = session.artifact().expect("artifact present");
    assert_eq!(artifact.media_type, "image/jpeg");
    assert_eq!(artifact.name, "processed.jpeg");

    let decoded = image::load_from_memory(&artifact.bytes).expect("output must decode");
    assert_eq!(
        (decoded.width(), decoded.height()),
        (100, 100),
        "re-encode must keep the source dimensions exactly"
    );

    // Both the quality change and the format change triggered a re-encode.
    let results = presenter.results();
    assert_eq!(results.len(), 2);
    assert_eq!(results[1].name, "processed.jpeg");
    assert!(presenter.errors().is_empty());
}

#[tokio::test]
async fn reencode_twice_with_unchanged_params_is_idempotent() {
    let presenter = Arc::new(RecordingPresenter::default());
    let session = session_with(None, Arc::clone(&presenter));
    session.install_artifact(png_upload(32, 32));

    session.reencode().await;
    let first = session.artifact().expect("first output").bytes;
    session.reencode().await;
    let second = session.artifact().expect("second output").bytes;

    assert_eq!(
        first, second,
        "PNG re-encode of its own output at the same parameters must be byte-stable"
    );
}

#[tokio::test]
async fn reencode_of_undecodable_artifact_surfaces_generic_failure() {
    let presenter = Arc::new(RecordingPresenter::default());
    let session = session_with(None, Arc::clone(&presenter));
    // Declared image, but the bytes are junk — intake lets it through on
    // purpose; the decode step is where it dies.
    session.install_artifact(RawUpload {
        name: "broken.png".into(),
        media_type: "image/png".into(),
        bytes: vec![1, 2, 3, 4],
    });
    let before = session.artifact().unwrap();

    session.reencode().await;

    assert_eq!(presenter.errors(), vec!["Failed to process image"]);
    assert_eq!(session.artifact().unwrap(), before, "artifact unchanged");
    assert_eq!(
        presenter.busy_transitions(),
        vec![true, false],
        "guard must be released on the failure path"
    );
}

#[tokio::test]
async fn reencode_writes_download_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig::builder()
        .quality(80)
        .format(OutputFormat::Jpeg)
        .presenter(Arc::new(DownloadDir::new(dir.path())))
        .build()
        .expect("valid config");
    let session = Session::new(config);
    session.install_artifact(png_upload(100, 100));

    session.reencode().await;

    let written = std::fs::read(dir.path().join("processed.jpeg"))
        .expect("download must be triggered under the fixed name");
    assert_eq!(written, session.artifact().unwrap().bytes);
}

// ── Background removal (mock remover) ────────────────────────────────────────

#[tokio::test]
async fn removal_success_replaces_artifact_as_png() {
    let matted = png_bytes(20, 20);
    let presenter = Arc::new(RecordingPresenter::default());
    let session = session_with(
        Some(Arc::new(MockRemover::ok(matted.clone()))),
        Arc::clone(&presenter),
    );
    session.install_artifact(png_upload(20, 20));

    session.remove_background().await;

    let artifact = session.artifact().unwrap();
    assert_eq!(artifact.name, "removed-bg.png");
    assert_eq!(artifact.media_type, "image/png");
    assert_eq!(artifact.bytes, matted);
    assert_eq!(presenter.results().len(), 1);
    assert_eq!(presenter.busy_transitions(), vec![true, false]);
}

#[tokio::test]
async fn removal_error_surfaces_title_and_keeps_artifact() {
    let presenter = Arc::new(RecordingPresenter::default());
    let session = session_with(
        Some(Arc::new(MockRemover::err("Invalid image"))),
        Arc::clone(&presenter),
    );
    session.install_artifact(png_upload(10, 10));
    let before = session.artifact().unwrap();

    session.remove_background().await;

    assert_eq!(presenter.errors(), vec!["Invalid image"]);
    assert!(presenter.results().is_empty());
    assert_eq!(session.artifact().unwrap(), before);
}

#[tokio::test]
async fn removal_with_undecodable_body_keeps_artifact() {
    let presenter = Arc::new(RecordingPresenter::default());
    let session = session_with(
        Some(Arc::new(MockRemover::ok(b"not an image at all".to_vec()))),
        Arc::clone(&presenter),
    );
    session.install_artifact(png_upload(10, 10));
    let before = session.artifact().unwrap();

    session.remove_background().await;

    assert_eq!(presenter.errors(), vec!["Failed to load processed image"]);
    assert_eq!(session.artifact().unwrap(), before);
    assert_eq!(presenter.busy_transitions(), vec![true, false]);
}

#[tokio::test]
async fn removal_without_credential_surfaces_generic_failure() {
    // Make sure the env fallback can't kick in for this one.
    std::env::remove_var(cutout::API_KEY_ENV);
    let presenter = Arc::new(RecordingPresenter::default());
    let session = session_with(None, Arc::clone(&presenter));
    session.install_artifact(png_upload(10, 10));

    session.remove_background().await;

    assert_eq!(presenter.errors(), vec!["Background removal failed"]);
}

// ── Guard semantics ──────────────────────────────────────────────────────────

#[tokio::test]
async fn overlapping_operations_are_dropped_not_queued() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let remover = Arc::new(GatedRemover {
        entered: Arc::clone(&entered),
        release: Arc::clone(&release),
        calls: AtomicUsize::new(0),
        result: png_bytes(10, 10),
    });

    let presenter = Arc::new(RecordingPresenter::default());
    let session = Arc::new(session_with(
        Some(Arc::clone(&remover) as Arc<dyn BackgroundRemover>),
        Arc::clone(&presenter),
    ));
    session.install_artifact(png_upload(10, 10));
    let before = session.artifact().unwrap();

    let in_flight = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.remove_background().await }
    });
    entered.notified().await;
    assert!(session.is_busy());

    // Both operations must be silent no-ops while the guard is held.
    session.reencode().await;
    session.remove_background().await;

    assert_eq!(
        remover.calls.load(Ordering::SeqCst),
        1,
        "second removal must not reach the remote service"
    );
    assert_eq!(session.artifact().unwrap(), before, "artifact untouched");
    assert!(presenter.results().is_empty());
    assert!(presenter.errors().is_empty());
    assert!(session.is_busy(), "guard still held by the first operation");

    release.notify_one();
    in_flight.await.expect("operation task must not panic");

    assert!(!session.is_busy(), "guard released after completion");
    assert_eq!(session.artifact().unwrap().name, "removed-bg.png");
    assert_eq!(presenter.results().len(), 1);
    // Exactly one busy cycle: the dropped invocations never touched it.
    assert_eq!(presenter.busy_transitions(), vec![true, false]);
}

#[tokio::test]
async fn operations_without_artifact_are_noops() {
    let remover = Arc::new(MockRemover::ok(png_bytes(4, 4)));
    let presenter = Arc::new(RecordingPresenter::default());
    let session = session_with(
        Some(Arc::clone(&remover) as Arc<dyn BackgroundRemover>),
        Arc::clone(&presenter),
    );

    session.remove_background().await;
    session.reencode().await;

    assert_eq!(remover.calls.load(Ordering::SeqCst), 0);
    assert!(presenter.results().is_empty());
    assert!(presenter.errors().is_empty());
    assert!(
        presenter.busy_transitions().is_empty(),
        "no-artifact drops happen before the guard is touched"
    );
}

// ── Wire contract (local one-shot HTTP server) ───────────────────────────────

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Serve exactly one HTTP exchange, returning the endpoint URL and a handle
/// resolving to the raw request bytes once the exchange completes.
async fn serve_once(
    status_line: &str,
    content_type: &str,
    body: Vec<u8>,
) -> (String, tokio::task::JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("http://{}", listener.local_addr().expect("local addr"));
    let status_line = status_line.to_string();
    let content_type = content_type.to_string();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");

        // Read headers, then the Content-Length body.
        let mut request = Vec::new();
        let mut chunk = [0u8; 4096];
        let (body_start, content_length) = loop {
            let n = socket.read(&mut chunk).await.expect("read");
            assert!(n > 0, "client closed before finishing the request");
            request.extend_from_slice(&chunk[..n]);
            if let Some(pos) = find_subsequence(&request, b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&request[..pos]).to_string();
                let length = headers
                    .lines()
                    .find_map(|line| {
                        let (key, value) = line.split_once(':')?;
                        key.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                break (pos + 4, length);
            }
        };
        while request.len() < body_start + content_length {
            let n = socket.read(&mut chunk).await.expect("read body");
            assert!(n > 0, "client closed mid-body");
            request.extend_from_slice(&chunk[..n]);
        }

        let head = format!(
            "{status_line}\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
            body.len()
        );
        socket.write_all(head.as_bytes()).await.expect("write head");
        socket.write_all(&body).await.expect("write body");
        socket.shutdown().await.ok();
        request
    });

    (url, handle)
}

#[tokio::test]
async fn http_400_with_structured_body_surfaces_title() {
    let (url, server) = serve_once(
        "HTTP/1.1 400 Bad Request",
        "application/json",
        br#"{"errors":[{"title":"Invalid image"}]}"#.to_vec(),
    )
    .await;

    let presenter = Arc::new(RecordingPresenter::default());
    let session = session_with(
        Some(Arc::new(RemoveBgClient::with_endpoint("test-key", url))),
        Arc::clone(&presenter),
    );
    session.install_artifact(png_upload(10, 10));
    let before = session.artifact().unwrap();

    session.remove_background().await;

    assert_eq!(presenter.errors(), vec!["Invalid image"]);
    assert_eq!(session.artifact().unwrap(), before);

    // The request carried the credential and the fixed multipart field.
    let request = server.await.expect("server task");
    let request_text = String::from_utf8_lossy(&request);
    assert!(
        request_text.to_lowercase().contains("x-api-key: test-key"),
        "credential header missing"
    );
    assert!(
        request_text.contains(r#"name="image_file""#),
        "multipart field name missing"
    );
}

#[tokio::test]
async fn http_error_with_unparseable_body_falls_back_to_generic() {
    let (url, server) = serve_once(
        "HTTP/1.1 502 Bad Gateway",
        "text/html",
        b"<html>upstream sad</html>".to_vec(),
    )
    .await;

    let presenter = Arc::new(RecordingPresenter::default());
    let session = session_with(
        Some(Arc::new(RemoveBgClient::with_endpoint("test-key", url))),
        Arc::clone(&presenter),
    );
    session.install_artifact(png_upload(10, 10));
    let before = session.artifact().unwrap();

    session.remove_background().await;

    assert_eq!(presenter.errors(), vec!["Background removal failed"]);
    assert_eq!(session.artifact().unwrap(), before);
    server.await.expect("server task");
}

#[tokio::test]
async fn http_success_installs_matted_png() {
    let matted = png_bytes(40, 40);
    let (url, server) = serve_once("HTTP/1.1 200 OK", "image/png", matted.clone()).await;

    let presenter = Arc::new(RecordingPresenter::default());
    let session = session_with(
        Some(Arc::new(RemoveBgClient::with_endpoint("test-key", url))),
        Arc::clone(&presenter),
    );
    session.install_artifact(png_upload(40, 40));

    session.remove_background().await;

    let artifact = session.artifact().unwrap();
    assert_eq!(artifact.name, "removed-bg.png");
    assert_eq!(artifact.media_type, "image/png");
    assert_eq!(artifact.bytes, matted);
    assert!(presenter.errors().is_empty());
    server.await.expect("server task");
}
