use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use http::header::{CONTENT_TYPE, HeaderValue, IF_NONE_MATCH, USER_AGENT};
use http::{HeaderMap, Method};
use tracing::debug;

use crate::body;
use crate::errors::{SDKError, SDKResult};
use crate::http_clients::{GraphHttpClient, HttpRequest};
use crate::request::GraphRequest;
use crate::response::GraphResponse;

pub const BASE_GRAPH_URL: &str = "https://graph.facebook.com";
pub const BASE_GRAPH_URL_BETA: &str = "https://graph.beta.facebook.com";
pub const BASE_GRAPH_VIDEO_URL: &str = "https://graph-video.facebook.com";
pub const BASE_GRAPH_VIDEO_URL_BETA: &str = "https://graph-video.beta.facebook.com";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_FILE_UPLOAD_REQUEST_TIMEOUT: Duration = Duration::from_secs(3600);
pub const DEFAULT_VIDEO_UPLOAD_REQUEST_TIMEOUT: Duration = Duration::from_secs(7200);

const SDK_USER_AGENT: &str = concat!("graph-sdk-rs/", env!("CARGO_PKG_VERSION"));
const SUPPORTED_METHODS: [&str; 3] = ["GET", "POST", "DELETE"];

/// Sends [`GraphRequest`]s through the resolved transport.
///
/// The endpoint (standard or beta) is fixed at construction. The last
/// request and response are kept for diagnostics only.
pub struct GraphClient {
    http: Arc<dyn GraphHttpClient>,
    beta: bool,
    last_request: Mutex<Option<GraphRequest>>,
    last_response: Mutex<Option<GraphResponse>>,
}

impl GraphClient {
    pub fn new(http: Arc<dyn GraphHttpClient>, beta: bool) -> Self {
        Self {
            http,
            beta,
            last_request: Mutex::new(None),
            last_response: Mutex::new(None),
        }
    }

    pub fn http_client(&self) -> &Arc<dyn GraphHttpClient> {
        &self.http
    }

    pub fn is_beta_mode(&self) -> bool {
        self.beta
    }

    pub fn base_graph_url(&self, video: bool) -> &'static str {
        match (video, self.beta) {
            (false, false) => BASE_GRAPH_URL,
            (false, true) => BASE_GRAPH_URL_BETA,
            (true, false) => BASE_GRAPH_VIDEO_URL,
            (true, true) => BASE_GRAPH_VIDEO_URL_BETA,
        }
    }

    /// Absolute URL a request will be sent to.
    pub fn request_url(&self, request: &GraphRequest) -> String {
        format!(
            "{}{}",
            self.base_graph_url(request.contains_video_uploads()),
            request.url()
        )
    }

    pub fn last_request(&self) -> Option<GraphRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_response(&self) -> Option<GraphResponse> {
        self.last_response
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Build the transport request without sending it.
    pub fn prepare(&self, request: &GraphRequest) -> SDKResult<HttpRequest> {
        let method = validate_method(request.method())?;

        let mut headers = HeaderMap::new();
        // Accept-Encoding is left to the transport, which must decode what it
        // negotiates.
        headers.insert(USER_AGENT, HeaderValue::from_static(SDK_USER_AGENT));
        if let Some(etag) = request.etag() {
            let value = HeaderValue::from_str(etag)
                .map_err(|err| SDKError::validation(format!("invalid etag: {err}")))?;
            headers.insert(IF_NONE_MATCH, value);
        }

        let body = body::encode(&request.post_params());
        if let Some(body) = &body {
            let value = HeaderValue::from_str(&body.content_type)
                .map_err(|err| SDKError::validation(format!("invalid content type: {err}")))?;
            headers.insert(CONTENT_TYPE, value);
        }

        let timeout = if request.contains_video_uploads() {
            DEFAULT_VIDEO_UPLOAD_REQUEST_TIMEOUT
        } else if request.contains_file_uploads() {
            DEFAULT_FILE_UPLOAD_REQUEST_TIMEOUT
        } else {
            DEFAULT_REQUEST_TIMEOUT
        };

        Ok(HttpRequest {
            method,
            url: self.request_url(request),
            headers,
            body: body.map(|body| body.bytes),
            timeout,
        })
    }

    /// Send one request. No retry happens here.
    pub async fn send_request(&self, request: &GraphRequest) -> SDKResult<GraphResponse> {
        let http_request = self.prepare(request)?;
        self.record_request(request);

        debug!(
            transport = self.http.name(),
            method = request.method(),
            endpoint = request.endpoint(),
            graph_version = request.graph_version(),
            beta = self.beta,
            "sending graph request"
        );

        let http_response = self.http.send(http_request).await.map_err(|err| {
            debug!(error = %err, endpoint = request.endpoint(), "graph transport failed");
            SDKError::Transport(err)
        })?;

        let response = GraphResponse::new(
            request.clone(),
            http_response.status,
            http_response.headers,
            http_response.body,
        )?;
        debug!(
            status = response.http_status(),
            endpoint = request.endpoint(),
            "graph response received"
        );
        self.record_response(&response);

        match response.error() {
            Some(error) => Err(SDKError::Api(error)),
            None => Ok(response),
        }
    }

    fn record_request(&self, request: &GraphRequest) {
        *self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(request.clone());
    }

    fn record_response(&self, response: &GraphResponse) {
        *self
            .last_response
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(response.clone());
    }
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("http", &self.http.name())
            .field("beta", &self.beta)
            .finish_non_exhaustive()
    }
}

fn validate_method(method: &str) -> SDKResult<Method> {
    if !SUPPORTED_METHODS.contains(&method) {
        return Err(SDKError::validation(format!(
            "invalid HTTP method \"{method}\"; expected one of GET, POST, DELETE"
        )));
    }
    Method::from_bytes(method.as_bytes())
        .map_err(|err| SDKError::validation(format!("invalid HTTP method: {err}")))
}
