//! Transport capability and its built-in backends.

use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method};

use crate::errors::TransportError;

pub const REQWEST_HANDLER_NAME: &str = "reqwest";
pub const UREQ_HANDLER_NAME: &str = "ureq";

#[cfg(feature = "reqwest-client")]
mod reqwest_client;
#[cfg(feature = "reqwest-client")]
pub use reqwest_client::ReqwestHttpClient;

#[cfg(feature = "ureq-client")]
mod ureq_client;
#[cfg(feature = "ureq-client")]
pub use ureq_client::UreqHttpClient;

/// A fully prepared HTTP request handed to a transport.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    /// The fully-qualified URL.
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Duration,
}

/// Raw transport reply. Status is kept as a plain integer: the SDK never
/// rejects a reply because of an unusual status line.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Pluggable transport contract.
#[async_trait::async_trait]
pub trait GraphHttpClient: Send + Sync {
    /// Short identifier, used in logs and for introspection.
    fn name(&self) -> &str;

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait::async_trait]
impl<T> GraphHttpClient for std::sync::Arc<T>
where
    T: GraphHttpClient + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}
