use bytes::Bytes;
use http::HeaderMap;
use serde_json::{Map, Value, json};

use crate::edge::{GraphEdge, GraphNode, NodeKind};
use crate::errors::{GraphApiError, TransportError};
use crate::request::GraphRequest;
use crate::url_manipulator;

/// A decoded reply to one [`GraphRequest`].
#[derive(Clone, Debug)]
pub struct GraphResponse {
    request: GraphRequest,
    http_status: u16,
    headers: HeaderMap,
    body: String,
    decoded_body: Value,
}

impl GraphResponse {
    /// Decode a raw reply. A body that claims to be JSON but does not parse is
    /// a malformed-response transport error.
    pub fn new(
        request: GraphRequest,
        http_status: u16,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<Self, TransportError> {
        let body = String::from_utf8_lossy(&body).into_owned();
        let decoded_body = decode_body(&body).map_err(|message| TransportError::Malformed {
            status: http_status,
            message,
            body: body.clone(),
        })?;
        Ok(Self {
            request,
            http_status,
            headers,
            body,
            decoded_body,
        })
    }

    pub fn request(&self) -> &GraphRequest {
        &self.request
    }

    pub fn http_status(&self) -> u16 {
        self.http_status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn decoded_body(&self) -> &Value {
        &self.decoded_body
    }

    pub fn etag(&self) -> Option<&str> {
        header_str(&self.headers, "etag")
    }

    /// Version the server actually answered with.
    pub fn graph_version(&self) -> Option<&str> {
        header_str(&self.headers, "facebook-api-version")
    }

    /// An `error` envelope, or an error status with none.
    pub fn is_error(&self) -> bool {
        self.decoded_body.get("error").is_some() || (400..=599).contains(&self.http_status)
    }

    pub fn error(&self) -> Option<GraphApiError> {
        if let Some(error) =
            GraphApiError::from_envelope(self.http_status, &self.decoded_body, &self.body)
        {
            return Some(error);
        }
        (400..=599)
            .contains(&self.http_status)
            .then(|| GraphApiError::from_status(self.http_status, &self.body))
    }

    pub fn graph_node(&self, kind: NodeKind) -> GraphNode {
        GraphNode::new(kind, self.decoded_body.clone())
    }

    /// Wrap a list body. The parent edge endpoint is the request endpoint
    /// without its query.
    pub fn graph_edge(&self, kind: NodeKind) -> GraphEdge {
        let parent = url_manipulator::base_graph_url_endpoint(self.request.endpoint());
        let parent = parent.split('?').next().unwrap_or_default().to_string();
        GraphEdge::new(self.request.clone(), &self.decoded_body, Some(parent), kind)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Object bodies pass through; `true`/`false` become `{"success": ..}`,
/// numbers become `{"id": ..}`, non-JSON text is read as a query string.
fn decode_body(body: &str) -> Result<Value, String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Bool(success)) => Ok(json!({ "success": success })),
        Ok(Value::Number(id)) => Ok(json!({ "id": id })),
        Ok(Value::String(text)) => Ok(match text.trim().parse::<i64>() {
            Ok(id) => json!({ "id": id }),
            Err(_) => Value::Object(Map::new()),
        }),
        Ok(Value::Null) => Ok(Value::Object(Map::new())),
        Ok(value) => Ok(value),
        Err(err) if trimmed.starts_with('{') || trimmed.starts_with('[') => {
            Err(format!("invalid JSON body: {err}"))
        }
        Err(_) => {
            let pairs = url::form_urlencoded::parse(trimmed.as_bytes())
                .into_owned()
                .map(|(key, value)| (key, Value::String(value)))
                .collect();
            Ok(Value::Object(pairs))
        }
    }
}
