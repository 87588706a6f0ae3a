use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use time::{macros::datetime, Duration, OffsetDateTime};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::api;
use crate::core::{config::Settings, state::AppState, time::Clock};
use crate::services::link_store::{
    BlobArea, BlobStore, InlineBlobs, LinkStore, LocalRecords, MemoryKeyValue,
};
use crate::services::uploads::{FileUpload, UploadPolicy};

pub(crate) const TEST_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
const MULTIPART_BOUNDARY: &str = "examlink-test-boundary";

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) clock: Arc<ManualClock>,
    pub(crate) app: Router,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("EXAMLINK_ENV", "test");
    std::env::set_var("EXAMLINK_STRICT_CONFIG", "0");
    std::env::set_var("PUBLIC_ORIGIN", "https://exams.example.org");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::remove_var("LINK_STORE_BACKEND");
    std::env::remove_var("MAX_UPLOAD_SIZE_MB");
    std::env::remove_var("API_V1_STR");
    std::env::remove_var("S3_ENDPOINT");
    std::env::remove_var("S3_ACCESS_KEY");
    std::env::remove_var("S3_SECRET_KEY");
    std::env::remove_var("S3_BUCKET");
    std::env::remove_var("S3_REGION");
    std::env::set_var("AWS_EC2_METADATA_DISABLED", "true");
}

pub(crate) fn set_test_storage_env() {
    std::env::set_var("S3_ENDPOINT", "http://localhost:9000");
    std::env::set_var("S3_ACCESS_KEY", "test-access-key");
    std::env::set_var("S3_SECRET_KEY", "test-secret-key");
    std::env::set_var("S3_BUCKET", "examlink-test-bucket");
    std::env::set_var("S3_REGION", "us-east-1");
}

/// Clock that only moves when a test says so.
#[derive(Debug)]
pub(crate) struct ManualClock {
    now: StdMutex<OffsetDateTime>,
}

impl ManualClock {
    pub(crate) fn new(start: OffsetDateTime) -> Self {
        Self { now: StdMutex::new(start) }
    }

    pub(crate) fn starting_at_epoch() -> Arc<Self> {
        Arc::new(Self::new(datetime!(2025-03-01 09:00 UTC)))
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().expect("clock lock")
    }
}

/// Inline blobs that refuse one named file and count what they accepted.
#[derive(Debug, Default)]
pub(crate) struct FailingBlobs {
    fail_on: Option<String>,
    stored: AtomicUsize,
}

impl FailingBlobs {
    pub(crate) fn failing_on(file_name: &str) -> Self {
        Self { fail_on: Some(file_name.to_string()), stored: AtomicUsize::new(0) }
    }

    pub(crate) fn stored(&self) -> usize {
        self.stored.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for FailingBlobs {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn put(
        &self,
        area: BlobArea,
        stored_name: &str,
        file: &FileUpload,
    ) -> anyhow::Result<String> {
        if self.fail_on.as_deref() == Some(file.file_name.as_str()) {
            anyhow::bail!("simulated upload failure for {}", file.file_name);
        }
        self.stored.fetch_add(1, Ordering::SeqCst);
        InlineBlobs.put(area, stored_name, file).await
    }

    async fn resolve(&self, reference: &str) -> anyhow::Result<String> {
        Ok(reference.to_string())
    }
}

pub(crate) fn memory_store(clock: Arc<ManualClock>) -> LinkStore {
    memory_store_with_blobs(clock, Arc::new(InlineBlobs))
}

pub(crate) fn memory_store_with_blobs(
    clock: Arc<ManualClock>,
    blobs: Arc<dyn BlobStore>,
) -> LinkStore {
    LinkStore::new(
        Arc::new(LocalRecords::new(MemoryKeyValue::new())),
        blobs,
        clock,
        UploadPolicy::new(TEST_MAX_UPLOAD_BYTES),
    )
}

pub(crate) fn pdf(name: &str) -> FileUpload {
    FileUpload::new(name, "application/pdf", b"%PDF-1.4 exam".to_vec())
}

pub(crate) fn png(name: &str) -> FileUpload {
    FileUpload::new(name, "image/png", vec![0x89, b'P', b'N', b'G', 1, 2, 3])
}

pub(crate) async fn setup_test_context() -> TestContext {
    let guard = env_lock().await;
    set_test_env();

    let settings = Settings::load().expect("settings");
    let clock = ManualClock::starting_at_epoch();
    let state = AppState::new(settings, memory_store(clock.clone()));
    let app = api::router::router(state.clone());

    TestContext { state, clock, app, _guard: guard }
}

/// One multipart part: `(field name, optional file name + content type, bytes)`.
pub(crate) struct Part<'a> {
    pub(crate) name: &'a str,
    pub(crate) file: Option<(&'a str, &'a str)>,
    pub(crate) bytes: &'a [u8],
}

impl<'a> Part<'a> {
    pub(crate) fn text(name: &'a str, value: &'a str) -> Self {
        Self { name, file: None, bytes: value.as_bytes() }
    }

    pub(crate) fn file(name: &'a str, file: &'a FileUpload) -> Self {
        Self {
            name,
            file: Some((file.file_name.as_str(), file.content_type.as_str())),
            bytes: &file.bytes,
        }
    }
}

pub(crate) fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
        match part.file {
            Some((file_name, content_type)) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n",
                        part.name
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(part.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"))
        .body(Body::from(body))
        .expect("request body")
}

pub(crate) fn get_request(uri: &str) -> Request<Body> {
    Request::builder().method(Method::GET).uri(uri).body(Body::empty()).expect("request body")
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
