//! In-process transports for tests: a canned reply, a failing transport, and a
//! fake Graph API that speaks the resumable video upload protocol.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use http::header::CONTENT_TYPE;
use serde_json::json;

use crate::errors::TransportError;
use crate::http_clients::{GraphHttpClient, HttpRequest, HttpResponse};

/// Answers every request with the same status and body.
#[derive(Clone, Debug)]
pub struct StaticResponseHttpClient {
    status: u16,
    body: Bytes,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl StaticResponseHttpClient {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A list page with one node named "Foo".
    pub fn single_node_page(status: u16) -> Self {
        Self::new(
            status,
            json!({"data": [{"id": "123", "name": "Foo"}]}).to_string(),
        )
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl GraphHttpClient for StaticResponseHttpClient {
    fn name(&self) -> &str {
        "static"
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        Ok(HttpResponse {
            status: self.status,
            headers: HeaderMap::new(),
            body: self.body.clone(),
        })
    }
}

/// Fails every request with the same transport error.
#[derive(Clone, Debug)]
pub struct FailingHttpClient {
    error: TransportError,
    attempts: Arc<Mutex<usize>>,
}

impl FailingHttpClient {
    pub fn new(error: TransportError) -> Self {
        Self {
            error,
            attempts: Arc::new(Mutex::new(0)),
        }
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl GraphHttpClient for FailingHttpClient {
    fn name(&self) -> &str {
        "failing"
    }

    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Err(self.error.clone())
    }
}

pub const FAKE_VIDEO_ID: &str = "1337";
pub const FAKE_UPLOAD_SESSION_ID: &str = "42";
pub const FAKE_TRANSFER_ERROR_BODY: &str = r#"{"error":{"message":"There was a problem uploading your video. Please try uploading it again.","type":"FacebookApiException","code":6000,"error_subcode":1363019}}"#;
pub const FAKE_FINISH_ERROR_BODY: &str = r#"{"error":{"message":"An unknown error has occurred.","type":"OAuthException","code":1}}"#;

#[derive(Clone, Debug)]
enum TransferFailure {
    Never,
    Always,
    FirstN(u32),
}

#[derive(Clone, Debug)]
enum TransferFault {
    Api { status: u16, body: String },
    Transport(TransportError),
}

#[derive(Debug)]
struct FakeUploadState {
    chunk_size: u64,
    file_size: u64,
    failure: TransferFailure,
    fault: TransferFault,
    fail_finish: bool,
    transfer_attempts: u32,
    failed_transfers: u32,
    received: Vec<u8>,
    phases: Vec<String>,
    finish_fields: BTreeMap<String, String>,
}

/// Fake Graph API for `/{target}/videos` that stores what it receives.
///
/// Start answers `0..chunk_size`; each accepted transfer acknowledges the
/// bytes it carried and asks for the next chunk, until the file is complete.
#[derive(Clone, Debug)]
pub struct FakeResumableUploadApi {
    inner: Arc<Mutex<FakeUploadState>>,
}

impl Default for FakeResumableUploadApi {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeResumableUploadApi {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeUploadState {
                chunk_size: 20,
                file_size: 0,
                failure: TransferFailure::Never,
                fault: TransferFault::Api {
                    status: 500,
                    body: FAKE_TRANSFER_ERROR_BODY.to_string(),
                },
                fail_finish: false,
                transfer_attempts: 0,
                failed_transfers: 0,
                received: Vec::new(),
                phases: Vec::new(),
                finish_fields: BTreeMap::new(),
            })),
        }
    }

    pub fn with_chunk_size(self, chunk_size: u64) -> Self {
        self.state().chunk_size = chunk_size.max(1);
        self
    }

    /// Every transfer attempt fails.
    pub fn fail_on_transfer(self) -> Self {
        self.state().failure = TransferFailure::Always;
        self
    }

    /// The first `count` transfer attempts fail, later ones succeed.
    pub fn fail_first_transfers(self, count: u32) -> Self {
        self.state().failure = TransferFailure::FirstN(count);
        self
    }

    /// Failing transfers answer with this status and body.
    pub fn with_transfer_error(self, status: u16, body: impl Into<String>) -> Self {
        self.state().fault = TransferFault::Api {
            status,
            body: body.into(),
        };
        self
    }

    /// Failing transfers raise this transport error instead of answering.
    pub fn with_transport_failure(self, error: TransportError) -> Self {
        self.state().fault = TransferFault::Transport(error);
        self
    }

    /// The finish phase answers 500 with [`FAKE_FINISH_ERROR_BODY`].
    pub fn fail_on_finish(self) -> Self {
        self.state().fail_finish = true;
        self
    }

    pub fn transfer_attempts(&self) -> u32 {
        self.state().transfer_attempts
    }

    pub fn received_bytes(&self) -> Vec<u8> {
        self.state().received.clone()
    }

    /// Upload phases in the order they were requested.
    pub fn phases(&self) -> Vec<String> {
        self.state().phases.clone()
    }

    pub fn finish_fields(&self) -> BTreeMap<String, String> {
        self.state().finish_fields.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeUploadState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl GraphHttpClient for FakeResumableUploadApi {
    fn name(&self) -> &str {
        "fake-resumable-upload"
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let fields = form_fields(&request).await;
        let phase = fields
            .get("upload_phase")
            .map(|value| String::from_utf8_lossy(value).into_owned())
            .unwrap_or_default();
        let mut state = self.state();
        state.phases.push(phase.clone());

        match phase.as_str() {
            "start" => {
                state.file_size = text_field(&fields, "file_size")
                    .and_then(|size| size.parse().ok())
                    .unwrap_or_default();
                state.received.clear();
                let end = state.chunk_size.min(state.file_size);
                Ok(reply(
                    200,
                    json!({
                        "video_id": FAKE_VIDEO_ID,
                        "start_offset": "0",
                        "end_offset": end.to_string(),
                        "upload_session_id": FAKE_UPLOAD_SESSION_ID,
                    })
                    .to_string(),
                ))
            }
            "transfer" => {
                state.transfer_attempts += 1;
                let fail = match state.failure {
                    TransferFailure::Never => false,
                    TransferFailure::Always => true,
                    TransferFailure::FirstN(count) => state.failed_transfers < count,
                };
                if fail {
                    state.failed_transfers += 1;
                    return match &state.fault {
                        TransferFault::Api { status, body } => Ok(reply(*status, body.clone())),
                        TransferFault::Transport(error) => Err(error.clone()),
                    };
                }

                let chunk = fields.get("video_file_chunk").cloned().unwrap_or_default();
                state.received.extend_from_slice(&chunk);
                let start = state.received.len() as u64;
                let end = (start + state.chunk_size).min(state.file_size);
                Ok(reply(
                    200,
                    json!({"start_offset": start.to_string(), "end_offset": end.to_string()})
                        .to_string(),
                ))
            }
            "finish" => {
                state.finish_fields = fields
                    .iter()
                    .map(|(key, value)| (key.clone(), String::from_utf8_lossy(value).into_owned()))
                    .collect();
                if state.fail_finish {
                    return Ok(reply(500, FAKE_FINISH_ERROR_BODY.to_string()));
                }
                let complete = state.received.len() as u64 == state.file_size;
                Ok(reply(200, json!({"success": complete}).to_string()))
            }
            _ => Ok(reply(
                400,
                json!({"error": {"message": "unknown upload phase", "code": 100}}).to_string(),
            )),
        }
    }
}

fn reply(status: u16, body: String) -> HttpResponse {
    HttpResponse {
        status,
        headers: HeaderMap::new(),
        body: Bytes::from(body),
    }
}

fn text_field(fields: &BTreeMap<String, Vec<u8>>, name: &str) -> Option<String> {
    fields
        .get(name)
        .map(|value| String::from_utf8_lossy(value).into_owned())
}

/// Decode a form body, multipart or url-encoded. Unreadable parts are
/// skipped.
pub async fn form_fields(request: &HttpRequest) -> BTreeMap<String, Vec<u8>> {
    let Some(body) = request.body.clone() else {
        return BTreeMap::new();
    };
    let content_type = request
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    match multer::parse_boundary(content_type) {
        Ok(boundary) => multipart_fields(body, boundary).await,
        Err(_) => url::form_urlencoded::parse(&body)
            .into_owned()
            .map(|(key, value)| (key, value.into_bytes()))
            .collect(),
    }
}

async fn multipart_fields(body: Bytes, boundary: String) -> BTreeMap<String, Vec<u8>> {
    let stream = futures::stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);
    let mut fields = BTreeMap::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let Some(name) = field.name().map(ToOwned::to_owned) else {
            continue;
        };
        if let Ok(content) = field.bytes().await {
            fields.insert(name, content.to_vec());
        }
    }
    fields
}
