//! The top-level entry point.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::app::GraphApp;
use crate::client::GraphClient;
use crate::config::{AccessTokenInput, GraphConfig};
use crate::edge::{GraphEdge, PageDirection};
use crate::errors::SDKResult;
use crate::http_clients::GraphHttpClient;
use crate::login::{OAuth2Client, RedirectLoginHelper};
use crate::persistent::PersistentDataHandler;
use crate::registry::{self, ResolvedHandlers};
use crate::request::{GraphRequest, Params};
use crate::response::GraphResponse;
use crate::token::AccessToken;
use crate::upload::{ResumableUploader, VideoUploadResult};
use crate::url_detection::UrlDetectionHandler;

/// Per-call overrides of the configured defaults.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub access_token: Option<AccessTokenInput>,
    pub etag: Option<String>,
    pub graph_version: Option<String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_access_token(mut self, token: impl Into<AccessTokenInput>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn with_graph_version(mut self, version: impl Into<String>) -> Self {
        self.graph_version = Some(version.into());
        self
    }
}

/// Owns the app, the client and the resolved handlers.
#[derive(Debug)]
pub struct Graph {
    app: GraphApp,
    client: GraphClient,
    handlers: ResolvedHandlers,
    default_access_token: Option<AccessToken>,
    default_graph_version: String,
}

impl Graph {
    /// Build from config, falling back to the process environment for
    /// credentials.
    pub fn new(config: GraphConfig) -> SDKResult<Self> {
        Self::with_env(config, |name| std::env::var(name).ok())
    }

    /// Same as [`Graph::new`] with an explicit environment lookup.
    pub fn with_env<F>(config: GraphConfig, env: F) -> SDKResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (app_id, app_secret) = config.resolve_credentials(env)?;
        let handlers = registry::resolve_handlers(&config)?;
        Ok(Self {
            app: GraphApp::new(app_id, app_secret),
            client: GraphClient::new(Arc::clone(&handlers.http_client), config.enable_beta_mode),
            default_access_token: config
                .default_access_token
                .clone()
                .map(AccessTokenInput::into_access_token),
            default_graph_version: config.graph_version().to_string(),
            handlers,
        })
    }

    /// Build from a dynamic JSON config object.
    pub fn from_value(config: &Value) -> SDKResult<Self> {
        Self::new(GraphConfig::from_value(config)?)
    }

    pub fn app(&self) -> &GraphApp {
        &self.app
    }

    pub fn client(&self) -> &GraphClient {
        &self.client
    }

    pub fn http_client(&self) -> &Arc<dyn GraphHttpClient> {
        self.client.http_client()
    }

    pub fn persistent_data_handler(&self) -> &Arc<dyn PersistentDataHandler> {
        &self.handlers.persistent_data
    }

    pub fn url_detection_handler(&self) -> &Arc<dyn UrlDetectionHandler> {
        &self.handlers.url_detection
    }

    pub fn default_access_token(&self) -> Option<&AccessToken> {
        self.default_access_token.as_ref()
    }

    pub fn set_default_access_token(&mut self, token: impl Into<AccessTokenInput>) {
        self.default_access_token = Some(token.into().into_access_token());
    }

    pub fn default_graph_version(&self) -> &str {
        &self.default_graph_version
    }

    pub fn last_response(&self) -> Option<GraphResponse> {
        self.client.last_response()
    }

    /// Build a request; explicit options win over the configured defaults.
    pub fn request(
        &self,
        method: &str,
        endpoint: &str,
        params: Params,
        options: RequestOptions,
    ) -> SDKResult<GraphRequest> {
        let access_token = options
            .access_token
            .map(AccessTokenInput::into_access_token)
            .or_else(|| self.default_access_token.clone());
        let graph_version = options
            .graph_version
            .as_deref()
            .unwrap_or(&self.default_graph_version);
        let request = GraphRequest::new(
            self.app.clone(),
            access_token,
            method,
            endpoint,
            params,
            Some(graph_version),
        )?;
        Ok(match options.etag {
            Some(etag) => request.with_etag(etag),
            None => request,
        })
    }

    pub async fn send_request(&self, request: &GraphRequest) -> SDKResult<GraphResponse> {
        self.client.send_request(request).await
    }

    pub async fn send(
        &self,
        method: &str,
        endpoint: &str,
        params: Params,
        options: RequestOptions,
    ) -> SDKResult<GraphResponse> {
        let request = self.request(method, endpoint, params, options)?;
        self.send_request(&request).await
    }

    pub async fn get(&self, endpoint: &str, options: RequestOptions) -> SDKResult<GraphResponse> {
        self.send("GET", endpoint, Params::new(), options).await
    }

    pub async fn post(
        &self,
        endpoint: &str,
        params: Params,
        options: RequestOptions,
    ) -> SDKResult<GraphResponse> {
        self.send("POST", endpoint, params, options).await
    }

    pub async fn delete(
        &self,
        endpoint: &str,
        params: Params,
        options: RequestOptions,
    ) -> SDKResult<GraphResponse> {
        self.send("DELETE", endpoint, params, options).await
    }

    /// Fetch the page after `edge`. `Ok(None)` on the last page.
    pub async fn next(&self, edge: &GraphEdge) -> SDKResult<Option<GraphEdge>> {
        self.page(edge, PageDirection::Next).await
    }

    /// Fetch the page before `edge`. `Ok(None)` on the first page.
    pub async fn previous(&self, edge: &GraphEdge) -> SDKResult<Option<GraphEdge>> {
        self.page(edge, PageDirection::Previous).await
    }

    async fn page(&self, edge: &GraphEdge, direction: PageDirection) -> SDKResult<Option<GraphEdge>> {
        let Some(request) = edge.page_request(direction)? else {
            return Ok(None);
        };
        let response = self.client.send_request(&request).await?;
        Ok(Some(GraphEdge::new(
            request,
            response.decoded_body(),
            edge.parent_edge_endpoint().map(ToOwned::to_owned),
            edge.kind(),
        )))
    }

    /// Resumable upload of the file at `path` to `/{target}/videos`.
    /// `metadata` (title, description, ...) is sent with the finish phase.
    pub async fn upload_video(
        &self,
        target: &str,
        path: impl AsRef<Path>,
        metadata: Params,
        options: RequestOptions,
        max_transfer_tries: u32,
    ) -> SDKResult<VideoUploadResult> {
        let access_token = options
            .access_token
            .map(AccessTokenInput::into_access_token)
            .or_else(|| self.default_access_token.clone());
        let graph_version = options
            .graph_version
            .unwrap_or_else(|| self.default_graph_version.clone());
        ResumableUploader::new(&self.client, self.app.clone(), access_token, graph_version)
            .upload(target, path, metadata, max_transfer_tries)
            .await
    }

    pub fn oauth2_client(&self) -> OAuth2Client<'_> {
        OAuth2Client::new(self.app.clone(), &self.client, &self.default_graph_version)
    }

    pub fn redirect_login_helper(&self) -> RedirectLoginHelper<'_> {
        RedirectLoginHelper::new(
            self.oauth2_client(),
            Arc::clone(&self.handlers.persistent_data),
            Arc::clone(&self.handlers.url_detection),
        )
    }
}
