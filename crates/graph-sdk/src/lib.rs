#![doc = r#"
Client SDK for the Graph API.

Operation mapping:

| Operation | Entry point | Wire |
| --- | --- | --- |
| Build a client from config | `Graph::new` / `Graph::from_value` | none (handlers resolved eagerly) |
| Build a request | `Graph::request` | none |
| Send a request | `Graph::send_request`, `get` / `post` / `delete` | `{GET,POST,DELETE} https://graph[.beta].facebook.com/{version}{endpoint}` |
| Wrap a list response | `GraphResponse::graph_edge` | `data`, `paging.cursors.{after,before}`, `paging.{next,previous}` |
| Next / previous page | `Graph::next` / `Graph::previous` | one `GET` per page |
| Resumable video upload | `Graph::upload_video` | `POST /{target}/videos` with `upload_phase=start|transfer|finish` |
| Redirect login | `Graph::redirect_login_helper` | `GET /oauth/access_token` |

Implementation notes:
- Every call is a single sequential round trip. Only the upload transfer phase retries, bounded by a
  per-call budget in which every attempt counts.
- Capability slots (transport, persistent data, URL detection) accept a built-in name or an injected
  `Arc<dyn Trait>`; unknown names fail construction.
- The last request and response are kept on the client for diagnostics only.
"#]

pub mod app;
pub mod body;
pub mod client;
pub mod config;
pub mod edge;
pub mod errors;
pub mod graph;
pub mod http_clients;
pub mod login;
pub mod persistent;
pub mod registry;
pub mod request;
pub mod response;
pub mod testing;
pub mod token;
pub mod upload;
pub mod url_detection;
pub mod url_manipulator;

pub use app::GraphApp;
pub use client::{
    BASE_GRAPH_URL, BASE_GRAPH_URL_BETA, BASE_GRAPH_VIDEO_URL, BASE_GRAPH_VIDEO_URL_BETA,
    GraphClient,
};
pub use config::{
    APP_ID_ENV_NAME, APP_SECRET_ENV_NAME, AccessTokenInput, DEFAULT_GRAPH_VERSION, GraphConfig,
    HandlerSlot,
};
pub use edge::{GraphEdge, GraphNode, NodeKind, PageDirection};
pub use errors::{
    ConfigurationError, GraphApiError, GraphErrorKind, SDKError, SDKResult, TransportError,
};
pub use graph::{Graph, RequestOptions};
pub use http_clients::{GraphHttpClient, HttpRequest, HttpResponse};
#[cfg(feature = "reqwest-client")]
pub use http_clients::ReqwestHttpClient;
#[cfg(feature = "ureq-client")]
pub use http_clients::UreqHttpClient;
pub use login::{OAuth2Client, RedirectError, RedirectLoginHelper};
pub use persistent::{FsPersistentData, MemoryPersistentData, PersistentDataHandler};
pub use registry::ResolvedHandlers;
pub use request::{GraphFile, GraphRequest, ParamValue, Params, params};
pub use response::GraphResponse;
pub use token::AccessToken;
pub use upload::{ResumableUploader, TransferChunk, VideoFile, VideoUploadResult};
pub use url_detection::{CgiUrlDetection, UrlDetectionHandler};
