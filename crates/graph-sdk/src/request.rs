//! Immutable request descriptors.

use std::collections::BTreeMap;
use std::path::Path;

use bytes::Bytes;

use crate::app::GraphApp;
use crate::config::DEFAULT_GRAPH_VERSION;
use crate::errors::{SDKError, SDKResult};
use crate::token::AccessToken;
use crate::url_manipulator;

const ACCESS_TOKEN_PARAM: &str = "access_token";
const APPSECRET_PROOF_PARAM: &str = "appsecret_proof";

/// A file part of a multipart body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphFile {
    file_name: String,
    content_type: String,
    contents: Bytes,
    is_video: bool,
}

impl GraphFile {
    pub fn new(file_name: impl Into<String>, contents: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let content_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            file_name,
            content_type,
            contents: contents.into(),
            is_video: false,
        }
    }

    /// Same as [`GraphFile::new`], flagged so the client targets the video host.
    pub fn video(file_name: impl Into<String>, contents: impl Into<Bytes>) -> Self {
        Self {
            is_video: true,
            ..Self::new(file_name, contents)
        }
    }

    pub async fn open(path: impl AsRef<Path>) -> SDKResult<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read(path).await?;
        Ok(Self::new(display_file_name(path), contents))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn contents(&self) -> &Bytes {
        &self.contents
    }

    pub fn is_video(&self) -> bool {
        self.is_video
    }
}

pub(crate) fn display_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    File(GraphFile),
}

impl ParamValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::File(_) => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<GraphFile> for ParamValue {
    fn from(file: GraphFile) -> Self {
        Self::File(file)
    }
}

pub type Params = BTreeMap<String, ParamValue>;

/// Build a [`Params`] map from `(key, value)` pairs.
pub fn params<K, V, I>(pairs: I) -> Params
where
    K: Into<String>,
    V: Into<ParamValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

/// One Graph API call, fixed at construction.
///
/// Any `access_token` found in the endpoint query or in the params is lifted
/// into the request token; `appsecret_proof` is always recomputed.
#[derive(Clone, Debug)]
pub struct GraphRequest {
    app: GraphApp,
    access_token: Option<AccessToken>,
    method: String,
    endpoint: String,
    params: Params,
    graph_version: String,
    etag: Option<String>,
}

impl GraphRequest {
    pub fn new(
        app: GraphApp,
        access_token: Option<AccessToken>,
        method: &str,
        endpoint: &str,
        params: Params,
        graph_version: Option<&str>,
    ) -> SDKResult<Self> {
        let mut access_token = access_token;
        let mut params = params;

        let endpoint_params = url_manipulator::params_from_url(endpoint);
        if let Some(token) = endpoint_params.get(ACCESS_TOKEN_PARAM) {
            adopt_token(&mut access_token, token)?;
        }
        match params.remove(ACCESS_TOKEN_PARAM) {
            Some(ParamValue::Text(token)) => adopt_token(&mut access_token, &token)?,
            Some(ParamValue::File(_)) => {
                return Err(SDKError::validation(
                    "access_token param must be text, got a file",
                ));
            }
            None => {}
        }
        params.remove(APPSECRET_PROOF_PARAM);

        let endpoint = url_manipulator::remove_params_from_url(endpoint, &[
            ACCESS_TOKEN_PARAM,
            APPSECRET_PROOF_PARAM,
        ]);

        Ok(Self {
            app,
            access_token,
            method: method.to_ascii_uppercase(),
            endpoint: url_manipulator::force_slash_prefix(&endpoint),
            params,
            graph_version: graph_version
                .filter(|version| !version.is_empty())
                .unwrap_or(DEFAULT_GRAPH_VERSION)
                .to_string(),
            etag: None,
        })
    }

    /// Copy of this request with an `If-None-Match` ETag.
    pub fn with_etag(&self, etag: impl Into<String>) -> Self {
        Self {
            etag: Some(etag.into()),
            ..self.clone()
        }
    }

    /// A sibling request sharing app, token, verb and version.
    pub(crate) fn derive(&self, endpoint: &str, params: Params) -> SDKResult<Self> {
        Self::new(
            self.app.clone(),
            self.access_token.clone(),
            &self.method,
            endpoint,
            params,
            Some(&self.graph_version),
        )
    }

    pub fn app(&self) -> &GraphApp {
        &self.app
    }

    pub fn access_token(&self) -> Option<&AccessToken> {
        self.access_token.as_ref()
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn graph_version(&self) -> &str {
        &self.graph_version
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// Caller params without the authentication pair.
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn app_secret_proof(&self) -> Option<String> {
        self.access_token
            .as_ref()
            .map(|token| token.app_secret_proof(self.app.secret()))
    }

    /// Caller params plus `access_token` and `appsecret_proof` when
    /// authenticated.
    pub fn all_params(&self) -> Params {
        let mut all = self.params.clone();
        if let Some(token) = &self.access_token {
            all.insert(
                ACCESS_TOKEN_PARAM.to_string(),
                ParamValue::Text(token.value().to_string()),
            );
            all.insert(
                APPSECRET_PROOF_PARAM.to_string(),
                ParamValue::Text(token.app_secret_proof(self.app.secret())),
            );
        }
        all
    }

    /// Params sent in the body: everything for POST, nothing otherwise.
    pub fn post_params(&self) -> Params {
        if self.method == "POST" {
            self.all_params()
        } else {
            Params::new()
        }
    }

    /// Versioned relative URL. Non-POST requests carry their params in the
    /// query; a key already in the endpoint query keeps its value.
    pub fn url(&self) -> String {
        let url = format!("/{}{}", self.graph_version, self.endpoint);
        if self.method == "POST" {
            return url;
        }
        let all = self.all_params();
        url_manipulator::append_params_to_url(
            &url,
            all.iter()
                .filter_map(|(key, value)| value.as_text().map(|text| (key.as_str(), text))),
        )
    }

    pub fn contains_file_uploads(&self) -> bool {
        self.params
            .values()
            .any(|value| matches!(value, ParamValue::File(_)))
    }

    pub fn contains_video_uploads(&self) -> bool {
        self.params
            .values()
            .any(|value| matches!(value, ParamValue::File(file) if file.is_video()))
    }
}

fn adopt_token(current: &mut Option<AccessToken>, found: &str) -> SDKResult<()> {
    match current {
        Some(token) if token.value() != found => Err(SDKError::validation(
            "access token mismatch: the token given to the request and the one in the URL or params differ",
        )),
        Some(_) => Ok(()),
        None => {
            *current = Some(AccessToken::new(found));
            Ok(())
        }
    }
}
