//! Ureq-based transport (blocking).
//!
//! ureq is synchronous, so each request runs on tokio's blocking pool and the
//! calling task simply awaits it.

use std::io::Read as _;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;

use crate::errors::TransportError;
use crate::http_clients::{GraphHttpClient, HttpRequest, HttpResponse, UREQ_HANDLER_NAME};

/// A [`GraphHttpClient`] backed by [`ureq`].
#[derive(Clone, Debug)]
pub struct UreqHttpClient {
    agent: ureq::Agent,
}

impl UreqHttpClient {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    pub fn from_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl GraphHttpClient for UreqHttpClient {
    fn name(&self) -> &str {
        UREQ_HANDLER_NAME
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || send_blocking(&agent, request))
            .await
            .map_err(|err| TransportError::Other(format!("blocking transport task failed: {err}")))?
    }
}

fn send_blocking(agent: &ureq::Agent, request: HttpRequest) -> Result<HttpResponse, TransportError> {
    let mut builder = agent
        .request(request.method.as_str(), &request.url)
        .timeout(request.timeout);
    for (name, value) in &request.headers {
        let value = value
            .to_str()
            .map_err(|err| TransportError::Other(format!("non-ascii header {name}: {err}")))?;
        builder = builder.set(name.as_str(), value);
    }

    let result = match request.body {
        Some(body) => builder.send_bytes(&body),
        None => builder.call(),
    };

    match result {
        // Error statuses still carry a Graph error envelope worth decoding.
        Ok(response) | Err(ureq::Error::Status(_, response)) => convert_response(response),
        Err(ureq::Error::Transport(transport)) => Err(map_transport_error(&transport)),
    }
}

fn convert_response(response: ureq::Response) -> Result<HttpResponse, TransportError> {
    let status = response.status();
    let mut headers = HeaderMap::new();
    for name in response.headers_names() {
        let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        for value in response.all(&name) {
            if let Ok(header_value) = HeaderValue::from_str(value) {
                headers.append(header_name.clone(), header_value);
            }
        }
    }

    let mut body = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut body)
        .map_err(|err| TransportError::Connection(err.to_string()))?;

    Ok(HttpResponse {
        status,
        headers,
        body: Bytes::from(body),
    })
}

fn map_transport_error(transport: &ureq::Transport) -> TransportError {
    let timed_out = std::error::Error::source(transport)
        .and_then(|source| source.downcast_ref::<std::io::Error>())
        .is_some_and(|io| {
            matches!(
                io.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            )
        });
    if timed_out {
        return TransportError::Timeout;
    }

    match transport.kind() {
        ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed | ureq::ErrorKind::Io => {
            TransportError::Connection(transport.to_string())
        }
        _ => TransportError::Other(transport.to_string()),
    }
}
