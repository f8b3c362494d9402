use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::errors::{ConfigurationError, SDKError, SDKResult};
use crate::http_clients::GraphHttpClient;
use crate::persistent::PersistentDataHandler;
use crate::token::AccessToken;
use crate::url_detection::UrlDetectionHandler;

pub const APP_ID_ENV_NAME: &str = "FACEBOOK_APP_ID";
pub const APP_SECRET_ENV_NAME: &str = "FACEBOOK_APP_SECRET";
pub const DEFAULT_GRAPH_VERSION: &str = "v2.8";

pub const HTTP_CLIENT_HANDLER_KEY: &str = "http_client_handler";
pub const PERSISTENT_DATA_HANDLER_KEY: &str = "persistent_data_handler";
pub const URL_DETECTION_HANDLER_KEY: &str = "url_detection_handler";

/// One capability slot: the built-in default, a built-in picked by name, or
/// a caller-supplied implementation.
pub enum HandlerSlot<T: ?Sized> {
    Default,
    Named(String),
    Injected(Arc<T>),
}

impl<T: ?Sized> HandlerSlot<T> {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn injected(handler: Arc<T>) -> Self {
        Self::Injected(handler)
    }
}

impl<T: ?Sized> Default for HandlerSlot<T> {
    fn default() -> Self {
        Self::Default
    }
}

impl<T: ?Sized> Clone for HandlerSlot<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Default => Self::Default,
            Self::Named(name) => Self::Named(name.clone()),
            Self::Injected(handler) => Self::Injected(Arc::clone(handler)),
        }
    }
}

impl<T: ?Sized> fmt::Debug for HandlerSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Injected(_) => f.write_str("Injected(..)"),
        }
    }
}

/// A default access token is either a raw string or an [`AccessToken`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccessTokenInput {
    Raw(String),
    Token(AccessToken),
}

impl AccessTokenInput {
    pub fn into_access_token(self) -> AccessToken {
        match self {
            Self::Raw(value) => AccessToken::new(value),
            Self::Token(token) => token,
        }
    }
}

impl From<&str> for AccessTokenInput {
    fn from(value: &str) -> Self {
        Self::Raw(value.to_string())
    }
}

impl From<String> for AccessTokenInput {
    fn from(value: String) -> Self {
        Self::Raw(value)
    }
}

impl From<AccessToken> for AccessTokenInput {
    fn from(token: AccessToken) -> Self {
        Self::Token(token)
    }
}

impl From<&AccessToken> for AccessTokenInput {
    fn from(token: &AccessToken) -> Self {
        Self::Token(token.clone())
    }
}

/// Options recognized by [`crate::Graph::new`].
#[derive(Clone, Debug, Default)]
pub struct GraphConfig {
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub default_graph_version: Option<String>,
    pub enable_beta_mode: bool,
    pub default_access_token: Option<AccessTokenInput>,
    pub http_client_handler: HandlerSlot<dyn GraphHttpClient>,
    pub persistent_data_handler: HandlerSlot<dyn PersistentDataHandler>,
    pub url_detection_handler: HandlerSlot<dyn UrlDetectionHandler>,
}

impl GraphConfig {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: Some(app_id.into()),
            app_secret: Some(app_secret.into()),
            ..Self::default()
        }
    }

    /// Load from a dynamic JSON object. Unrecognized keys are ignored;
    /// recognized keys holding the wrong type fail here, before any network
    /// call can happen.
    pub fn from_value(value: &Value) -> SDKResult<Self> {
        let Some(map) = value.as_object() else {
            return Err(SDKError::validation(format!(
                "config must be an object, got {}",
                json_type_name(value)
            )));
        };

        let default_access_token = match map.get("default_access_token") {
            None | Some(Value::Null) => None,
            Some(Value::String(token)) => Some(AccessTokenInput::Raw(token.clone())),
            Some(other) => {
                return Err(SDKError::validation(format!(
                    "the default access token must be of type string or AccessToken, got {}",
                    json_type_name(other)
                )));
            }
        };

        let enable_beta_mode = match map.get("enable_beta_mode") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => *flag,
            Some(other) => {
                return Err(SDKError::validation(format!(
                    "enable_beta_mode must be a boolean, got {}",
                    json_type_name(other)
                )));
            }
        };

        Ok(Self {
            app_id: credential_value(map, "app_id")?,
            app_secret: string_value(map, "app_secret")?,
            default_graph_version: string_value(map, "default_graph_version")?,
            enable_beta_mode,
            default_access_token,
            http_client_handler: handler_slot(map, HTTP_CLIENT_HANDLER_KEY)?,
            persistent_data_handler: handler_slot(map, PERSISTENT_DATA_HANDLER_KEY)?,
            url_detection_handler: handler_slot(map, URL_DETECTION_HANDLER_KEY)?,
        })
    }

    pub fn graph_version(&self) -> &str {
        self.default_graph_version
            .as_deref()
            .filter(|version| !version.is_empty())
            .unwrap_or(DEFAULT_GRAPH_VERSION)
    }

    /// Resolve app id and secret: explicit non-empty value, else the env
    /// variable, else a configuration error.
    pub fn resolve_credentials<F>(&self, env: F) -> Result<(String, String), ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_id = resolve_credential(self.app_id.as_deref(), "app_id", APP_ID_ENV_NAME, &env)?;
        let app_secret = resolve_credential(
            self.app_secret.as_deref(),
            "app_secret",
            APP_SECRET_ENV_NAME,
            &env,
        )?;
        Ok((app_id, app_secret))
    }
}

fn resolve_credential<F>(
    explicit: Option<&str>,
    key: &'static str,
    env_name: &'static str,
    env: &F,
) -> Result<String, ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
{
    let non_blank = |value: &str| {
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    };
    explicit
        .and_then(non_blank)
        .or_else(|| env(env_name).as_deref().and_then(non_blank))
        .ok_or(ConfigurationError::MissingCredential { key, env: env_name })
}

fn string_value(map: &Map<String, Value>, key: &str) -> SDKResult<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(SDKError::validation(format!(
            "{key} must be a string, got {}",
            json_type_name(other)
        ))),
    }
}

/// App ids are numeric and often written as JSON numbers.
fn credential_value(map: &Map<String, Value>, key: &str) -> SDKResult<Option<String>> {
    match map.get(key) {
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        _ => string_value(map, key),
    }
}

fn handler_slot<T: ?Sized>(
    map: &Map<String, Value>,
    slot: &'static str,
) -> Result<HandlerSlot<T>, ConfigurationError> {
    match map.get(slot) {
        None | Some(Value::Null) => Ok(HandlerSlot::Default),
        Some(Value::String(name)) => Ok(HandlerSlot::Named(name.clone())),
        Some(other) => Err(ConfigurationError::InvalidHandler {
            slot,
            found: json_type_name(other).to_string(),
        }),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
