//! Error taxonomy for the SDK.
//!
//! Every failure crossing a module boundary keeps its original cause: API
//! errors carry the status and raw body they were classified from, and the
//! upload engine hands back the last transfer error untouched.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Construction-time failures. Never retried.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error(
        "required \"{key}\" not supplied in config and could not find fallback environment variable \"{env}\""
    )]
    MissingCredential {
        key: &'static str,
        env: &'static str,
    },

    #[error("the {slot} must be one of [{expected}], got \"{value}\"")]
    UnknownHandler {
        slot: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("the {slot} must be a handler name or an injected implementation, got {found}")]
    InvalidHandler { slot: &'static str, found: String },

    #[error("the {slot} \"{value}\" is not compiled into this build")]
    HandlerUnavailable { slot: &'static str, value: String },
}

/// Failures of the transport collaborator or of response decoding.
#[derive(Clone, Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("malformed response (status {status}): {message}")]
    Malformed {
        status: u16,
        message: String,
        body: String,
    },

    #[error("transport failure: {0}")]
    Other(String),
}

/// Machine-checkable subtype of a rejected Graph call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphErrorKind {
    Authentication,
    Authorization,
    Throttle,
    Server,
    Client,
    ResumableUpload,
    Other,
}

impl fmt::Display for GraphErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::Throttle => "throttle",
            Self::Server => "server",
            Self::Client => "client",
            Self::ResumableUpload => "resumable_upload",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

const AUTH_SUBCODES: [i64; 6] = [458, 459, 460, 463, 464, 467];
const RESUMABLE_UPLOAD_SUBCODES: [i64; 6] = [1363030, 1363019, 1363033, 1363021, 1363041, 1363037];

/// An error envelope returned by the Graph API, or an error status without one.
#[derive(Clone, Debug, Error)]
#[error("graph api {kind} error (status {status}, code {code:?}): {message}")]
pub struct GraphApiError {
    pub kind: GraphErrorKind,
    pub status: u16,
    pub code: Option<i64>,
    pub subcode: Option<i64>,
    pub error_type: Option<String>,
    pub message: String,
    /// Offsets the server wants the next transfer to use, when it says so.
    pub start_offset: Option<u64>,
    pub end_offset: Option<u64>,
    pub raw_body: String,
}

impl GraphApiError {
    /// Build from a decoded body carrying an `error` object.
    pub fn from_envelope(status: u16, decoded: &Value, raw_body: &str) -> Option<Self> {
        let error = decoded.get("error")?;
        let code = error.get("code").and_then(value_as_i64);
        let subcode = error.get("error_subcode").and_then(value_as_i64);
        let error_type = error
            .get("type")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error from Graph.")
            .to_string();
        let kind = classify(code, subcode, error_type.as_deref());

        let (start_offset, end_offset) = if kind == GraphErrorKind::ResumableUpload {
            let data = error.get("error_data");
            (
                data.and_then(|data| data.get("start_offset"))
                    .and_then(value_as_u64),
                data.and_then(|data| data.get("end_offset"))
                    .and_then(value_as_u64),
            )
        } else {
            (None, None)
        };

        Some(Self {
            kind,
            status,
            code,
            subcode,
            error_type,
            message,
            start_offset,
            end_offset,
            raw_body: raw_body.to_string(),
        })
    }

    /// Build from an error status whose body carried no envelope.
    pub fn from_status(status: u16, raw_body: &str) -> Self {
        let kind = match status {
            401 => GraphErrorKind::Authentication,
            403 => GraphErrorKind::Authorization,
            429 => GraphErrorKind::Throttle,
            500..=599 => GraphErrorKind::Server,
            _ => GraphErrorKind::Client,
        };
        Self {
            kind,
            status,
            code: None,
            subcode: None,
            error_type: None,
            message: format!("request failed with status {status}"),
            start_offset: None,
            end_offset: None,
            raw_body: raw_body.to_string(),
        }
    }
}

fn classify(code: Option<i64>, subcode: Option<i64>, error_type: Option<&str>) -> GraphErrorKind {
    if let Some(subcode) = subcode {
        if AUTH_SUBCODES.contains(&subcode) {
            return GraphErrorKind::Authentication;
        }
        if RESUMABLE_UPLOAD_SUBCODES.contains(&subcode) {
            return GraphErrorKind::ResumableUpload;
        }
    }

    match code {
        Some(100 | 102 | 190) => return GraphErrorKind::Authentication,
        Some(1 | 2) => return GraphErrorKind::Server,
        Some(4 | 17 | 32 | 341 | 613) => return GraphErrorKind::Throttle,
        Some(506) => return GraphErrorKind::Client,
        Some(10 | 200..=299) => return GraphErrorKind::Authorization,
        _ => {}
    }

    if error_type == Some("OAuthException") {
        return GraphErrorKind::Authentication;
    }
    GraphErrorKind::Other
}

/// Graph sends numbers as JSON numbers or as numeric strings depending on the endpoint.
pub(crate) fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Top-level error type for the graph-sdk crate.
#[derive(Debug, Error)]
pub enum SDKError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("invalid argument: {0}")]
    Validation(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Api(#[from] GraphApiError),

    #[error("upload protocol violation: {0}")]
    UploadProtocol(String),

    #[error("transfer retry budget of {budget} exhausted with the upload at offset {offset}")]
    RetryBudgetExhausted { budget: u32, offset: u64 },

    #[error("persistent storage failure: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SDKError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// HTTP status attached to the failure, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api(error) => Some(error.status),
            Self::Transport(TransportError::Malformed { status, .. }) => Some(*status),
            _ => None,
        }
    }

    pub fn api_kind(&self) -> Option<GraphErrorKind> {
        match self {
            Self::Api(error) => Some(error.kind),
            _ => None,
        }
    }

    /// Failures the upload transfer loop may retry.
    pub(crate) fn is_transient_transfer_failure(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api(error) => error.kind == GraphErrorKind::ResumableUpload,
            _ => false,
        }
    }

    /// Corrected offsets carried by a resumable-upload error.
    pub(crate) fn resume_offsets(&self) -> Option<(u64, u64)> {
        match self {
            Self::Api(GraphApiError {
                start_offset: Some(start),
                end_offset: Some(end),
                ..
            }) => Some((*start, *end)),
            _ => None,
        }
    }
}

pub type SDKResult<T> = Result<T, SDKError>;
