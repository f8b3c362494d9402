//! Resolves each capability slot of a [`GraphConfig`] to a concrete handler.
//!
//! Resolution is a pure function of the slot value and the compiled-in
//! features. Every failure is a [`ConfigurationError`] naming the slot.

use std::sync::Arc;

use tracing::debug;

use crate::config::{
    GraphConfig, HTTP_CLIENT_HANDLER_KEY, HandlerSlot, PERSISTENT_DATA_HANDLER_KEY,
    URL_DETECTION_HANDLER_KEY,
};
use crate::errors::ConfigurationError;
use crate::http_clients::{GraphHttpClient, REQWEST_HANDLER_NAME, UREQ_HANDLER_NAME};
use crate::persistent::{MEMORY_HANDLER_NAME, MemoryPersistentData, PersistentDataHandler};
use crate::url_detection::{CGI_HANDLER_NAME, CgiUrlDetection, UrlDetectionHandler};

const HTTP_CLIENT_NAMES: &str = "reqwest, ureq";
const PERSISTENT_DATA_NAMES: &str = "memory";
const URL_DETECTION_NAMES: &str = "cgi";

/// The three capability slots after resolution.
#[derive(Clone)]
pub struct ResolvedHandlers {
    pub http_client: Arc<dyn GraphHttpClient>,
    pub persistent_data: Arc<dyn PersistentDataHandler>,
    pub url_detection: Arc<dyn UrlDetectionHandler>,
}

impl std::fmt::Debug for ResolvedHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedHandlers")
            .field("http_client", &self.http_client.name())
            .field("persistent_data", &self.persistent_data.name())
            .field("url_detection", &self.url_detection.name())
            .finish()
    }
}

pub fn resolve_handlers(config: &GraphConfig) -> Result<ResolvedHandlers, ConfigurationError> {
    let handlers = ResolvedHandlers {
        http_client: resolve_http_client(&config.http_client_handler)?,
        persistent_data: resolve_persistent_data(&config.persistent_data_handler)?,
        url_detection: resolve_url_detection(&config.url_detection_handler)?,
    };
    debug!(
        http_client = handlers.http_client.name(),
        persistent_data = handlers.persistent_data.name(),
        url_detection = handlers.url_detection.name(),
        "resolved graph handlers"
    );
    Ok(handlers)
}

pub fn resolve_http_client(
    slot: &HandlerSlot<dyn GraphHttpClient>,
) -> Result<Arc<dyn GraphHttpClient>, ConfigurationError> {
    match slot {
        HandlerSlot::Injected(client) => Ok(Arc::clone(client)),
        HandlerSlot::Default => default_http_client(),
        HandlerSlot::Named(name) => named_http_client(name),
    }
}

pub fn resolve_persistent_data(
    slot: &HandlerSlot<dyn PersistentDataHandler>,
) -> Result<Arc<dyn PersistentDataHandler>, ConfigurationError> {
    match slot {
        HandlerSlot::Injected(store) => Ok(Arc::clone(store)),
        HandlerSlot::Default => Ok(Arc::new(MemoryPersistentData::new())),
        HandlerSlot::Named(name) if name == MEMORY_HANDLER_NAME => {
            Ok(Arc::new(MemoryPersistentData::new()))
        }
        HandlerSlot::Named(name) => Err(ConfigurationError::UnknownHandler {
            slot: PERSISTENT_DATA_HANDLER_KEY,
            value: name.clone(),
            expected: PERSISTENT_DATA_NAMES,
        }),
    }
}

pub fn resolve_url_detection(
    slot: &HandlerSlot<dyn UrlDetectionHandler>,
) -> Result<Arc<dyn UrlDetectionHandler>, ConfigurationError> {
    match slot {
        HandlerSlot::Injected(detector) => Ok(Arc::clone(detector)),
        HandlerSlot::Default => Ok(Arc::new(CgiUrlDetection::new())),
        HandlerSlot::Named(name) if name == CGI_HANDLER_NAME => Ok(Arc::new(CgiUrlDetection::new())),
        HandlerSlot::Named(name) => Err(ConfigurationError::UnknownHandler {
            slot: URL_DETECTION_HANDLER_KEY,
            value: name.clone(),
            expected: URL_DETECTION_NAMES,
        }),
    }
}

#[allow(unreachable_code)]
fn default_http_client() -> Result<Arc<dyn GraphHttpClient>, ConfigurationError> {
    #[cfg(feature = "reqwest-client")]
    {
        return Ok(Arc::new(crate::http_clients::ReqwestHttpClient::new()));
    }
    #[cfg(feature = "ureq-client")]
    {
        return Ok(Arc::new(crate::http_clients::UreqHttpClient::new()));
    }
    Err(ConfigurationError::HandlerUnavailable {
        slot: HTTP_CLIENT_HANDLER_KEY,
        value: "default".to_string(),
    })
}

fn named_http_client(name: &str) -> Result<Arc<dyn GraphHttpClient>, ConfigurationError> {
    match name {
        REQWEST_HANDLER_NAME => {
            #[cfg(feature = "reqwest-client")]
            {
                Ok(Arc::new(crate::http_clients::ReqwestHttpClient::new()))
            }
            #[cfg(not(feature = "reqwest-client"))]
            {
                Err(ConfigurationError::HandlerUnavailable {
                    slot: HTTP_CLIENT_HANDLER_KEY,
                    value: name.to_string(),
                })
            }
        }
        UREQ_HANDLER_NAME => {
            #[cfg(feature = "ureq-client")]
            {
                Ok(Arc::new(crate::http_clients::UreqHttpClient::new()))
            }
            #[cfg(not(feature = "ureq-client"))]
            {
                Err(ConfigurationError::HandlerUnavailable {
                    slot: HTTP_CLIENT_HANDLER_KEY,
                    value: name.to_string(),
                })
            }
        }
        other => Err(ConfigurationError::UnknownHandler {
            slot: HTTP_CLIENT_HANDLER_KEY,
            value: other.to_string(),
            expected: HTTP_CLIENT_NAMES,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticResponseHttpClient;

    #[cfg(feature = "reqwest-client")]
    #[test]
    fn reqwest_name_resolves_to_reqwest_backend() {
        let client = resolve_http_client(&HandlerSlot::named("reqwest")).expect("known name");
        assert_eq!(client.name(), REQWEST_HANDLER_NAME);
    }

    #[cfg(feature = "ureq-client")]
    #[test]
    fn ureq_name_resolves_to_ureq_backend() {
        let client = resolve_http_client(&HandlerSlot::named("ureq")).expect("known name");
        assert_eq!(client.name(), UREQ_HANDLER_NAME);
    }

    #[cfg(feature = "reqwest-client")]
    #[test]
    fn default_transport_prefers_reqwest() {
        let client = resolve_http_client(&HandlerSlot::Default).expect("default resolves");
        assert_eq!(client.name(), REQWEST_HANDLER_NAME);
    }

    #[test]
    fn injected_transport_is_returned_as_is() {
        let injected: Arc<dyn GraphHttpClient> = Arc::new(StaticResponseHttpClient::new(200, "{}"));
        let resolved =
            resolve_http_client(&HandlerSlot::injected(Arc::clone(&injected))).expect("injected");
        assert!(Arc::ptr_eq(&injected, &resolved));
    }

    #[test]
    fn unknown_transport_name_is_rejected_with_slot_and_value() {
        let error = resolve_http_client(&HandlerSlot::named("foo_handler"))
            .err().expect("unknown name must fail");
        assert!(matches!(
            error,
            ConfigurationError::UnknownHandler {
                slot: HTTP_CLIENT_HANDLER_KEY,
                ref value,
                ..
            } if value == "foo_handler"
        ));
    }

    #[test]
    fn storage_and_detection_defaults() {
        let store = resolve_persistent_data(&HandlerSlot::Default).expect("memory default");
        assert_eq!(store.name(), MEMORY_HANDLER_NAME);
        let detector = resolve_url_detection(&HandlerSlot::named("cgi")).expect("cgi name");
        assert_eq!(detector.name(), CGI_HANDLER_NAME);
    }

    #[test]
    fn unknown_storage_and_detection_names_are_rejected() {
        assert!(matches!(
            resolve_persistent_data(&HandlerSlot::named("session")),
            Err(ConfigurationError::UnknownHandler {
                slot: PERSISTENT_DATA_HANDLER_KEY,
                ..
            })
        ));
        assert!(matches!(
            resolve_url_detection(&HandlerSlot::named("foo")),
            Err(ConfigurationError::UnknownHandler {
                slot: URL_DETECTION_HANDLER_KEY,
                ..
            })
        ));
    }
}
