use std::sync::Arc;

use graph_sdk::{
    APP_ID_ENV_NAME, APP_SECRET_ENV_NAME, AccessToken, BASE_GRAPH_URL_BETA, ConfigurationError,
    DEFAULT_GRAPH_VERSION, Graph, GraphConfig, GraphHttpClient, HandlerSlot,
    MemoryPersistentData, Params, PersistentDataHandler, RequestOptions, SDKError,
    UrlDetectionHandler, testing::StaticResponseHttpClient,
};
use serde_json::json;

fn no_env(_: &str) -> Option<String> {
    None
}

fn config() -> GraphConfig {
    GraphConfig::new("1337", "foo_secret")
}

struct FixedUrl;

impl UrlDetectionHandler for FixedUrl {
    fn name(&self) -> &str {
        "fixed"
    }

    fn current_url(&self) -> String {
        "https://example.com/cb".to_string()
    }
}

#[test]
fn missing_app_id_fails_without_touching_the_transport() {
    let http = Arc::new(StaticResponseHttpClient::new(200, "{}"));
    let config = GraphConfig {
        app_secret: Some("foo_secret".to_string()),
        http_client_handler: HandlerSlot::injected(http.clone()),
        ..GraphConfig::default()
    };

    let error = Graph::with_env(config, no_env).expect_err("app id is required");
    assert!(matches!(
        error,
        SDKError::Configuration(ConfigurationError::MissingCredential {
            key: "app_id",
            env: APP_ID_ENV_NAME
        })
    ));
    assert_eq!(http.request_count(), 0);
}

#[test]
fn credentials_fall_back_to_environment() {
    let graph = Graph::with_env(GraphConfig::default(), |name| match name {
        APP_ID_ENV_NAME => Some("env_id".to_string()),
        APP_SECRET_ENV_NAME => Some("env_secret".to_string()),
        _ => None,
    })
    .expect("env credentials resolve");
    assert_eq!(graph.app().id(), "env_id");
    assert_eq!(graph.app().secret(), "env_secret");
    assert_eq!(graph.default_graph_version(), DEFAULT_GRAPH_VERSION);
}

#[test]
fn injected_handlers_are_used_as_is() {
    let http: Arc<dyn GraphHttpClient> = Arc::new(StaticResponseHttpClient::new(200, "{}"));
    let store: Arc<dyn PersistentDataHandler> = Arc::new(MemoryPersistentData::new());
    let detector: Arc<dyn UrlDetectionHandler> = Arc::new(FixedUrl);
    let graph = Graph::with_env(
        GraphConfig {
            http_client_handler: HandlerSlot::injected(Arc::clone(&http)),
            persistent_data_handler: HandlerSlot::injected(Arc::clone(&store)),
            url_detection_handler: HandlerSlot::injected(Arc::clone(&detector)),
            ..config()
        },
        no_env,
    )
    .expect("graph builds");

    assert!(Arc::ptr_eq(graph.http_client(), &http));
    assert!(Arc::ptr_eq(graph.persistent_data_handler(), &store));
    let helper = graph.redirect_login_helper();
    assert!(Arc::ptr_eq(helper.url_detection_handler(), &detector));
    assert_eq!(helper.url_detection_handler().current_url(), "https://example.com/cb");
}

#[cfg(all(feature = "reqwest-client", feature = "ureq-client"))]
#[test]
fn named_transports_resolve_to_their_backends() {
    for name in ["reqwest", "ureq"] {
        let graph = Graph::with_env(
            GraphConfig {
                http_client_handler: HandlerSlot::named(name),
                ..config()
            },
            no_env,
        )
        .expect("known transport name");
        assert_eq!(graph.http_client().name(), name);
    }
}

#[test]
fn unknown_handler_names_fail_construction() {
    let error = Graph::with_env(
        GraphConfig {
            http_client_handler: HandlerSlot::named("foo_handler"),
            ..config()
        },
        no_env,
    )
    .expect_err("unknown name");
    assert!(matches!(
        error,
        SDKError::Configuration(ConfigurationError::UnknownHandler {
            slot: "http_client_handler",
            ..
        })
    ));

    let error = Graph::from_value(&json!({
        "app_id": "1337",
        "app_secret": "foo_secret",
        "persistent_data_handler": "foo_store"
    }))
    .expect_err("unknown store name");
    assert!(matches!(
        error,
        SDKError::Configuration(ConfigurationError::UnknownHandler {
            slot: "persistent_data_handler",
            ..
        })
    ));
}

#[test]
fn default_token_round_trips_as_string_or_token() {
    let mut graph = Graph::with_env(
        GraphConfig {
            default_access_token: Some("foo_token".into()),
            ..config()
        },
        no_env,
    )
    .expect("graph builds");
    assert_eq!(
        graph.default_access_token().map(ToString::to_string).as_deref(),
        Some("foo_token")
    );

    graph.set_default_access_token(AccessToken::new("bar_token"));
    assert_eq!(
        graph.default_access_token(),
        Some(&AccessToken::new("bar_token"))
    );
}

#[test]
fn wrong_typed_default_token_fails_construction() {
    let error = Graph::from_value(&json!({
        "app_id": "1337",
        "app_secret": "foo_secret",
        "default_access_token": 123
    }))
    .expect_err("numeric token must be rejected");
    assert!(matches!(error, SDKError::Validation(_)));
}

#[test]
fn explicit_version_and_beta_mode_shape_the_request() {
    let graph = Graph::with_env(
        GraphConfig {
            enable_beta_mode: true,
            default_graph_version: Some("v2.4".to_string()),
            default_access_token: Some("foo_token".into()),
            http_client_handler: HandlerSlot::injected(Arc::new(StaticResponseHttpClient::new(
                200, "{}",
            ))),
            ..config()
        },
        no_env,
    )
    .expect("graph builds");

    let request = graph
        .request(
            "GET",
            "/foo",
            Params::new(),
            RequestOptions::new().with_graph_version("v1337"),
        )
        .expect("request builds");
    assert_eq!(request.graph_version(), "v1337");
    assert_eq!(request.access_token().map(AccessToken::value), Some("foo_token"));
    assert!(
        graph
            .client()
            .request_url(&request)
            .starts_with(&format!("{BASE_GRAPH_URL_BETA}/v1337/foo?"))
    );
}

#[test]
fn explicit_token_overrides_default_and_absence_is_unauthenticated() {
    let graph = Graph::with_env(
        GraphConfig {
            http_client_handler: HandlerSlot::injected(Arc::new(StaticResponseHttpClient::new(
                200, "{}",
            ))),
            ..config()
        },
        no_env,
    )
    .expect("graph builds");

    let public = graph
        .request("GET", "/platform", Params::new(), RequestOptions::new())
        .expect("request builds");
    assert!(public.access_token().is_none());

    let explicit = graph
        .request(
            "GET",
            "/me",
            Params::new(),
            RequestOptions::new().with_access_token("baz_token"),
        )
        .expect("request builds");
    assert_eq!(explicit.access_token().map(AccessToken::value), Some("baz_token"));
}

#[tokio::test(flavor = "current_thread")]
async fn last_response_tracks_the_latest_call() {
    let http = Arc::new(StaticResponseHttpClient::new(1337, r#"{"id":"1","name":"Foo"}"#));
    let graph = Graph::with_env(
        GraphConfig {
            http_client_handler: HandlerSlot::injected(http.clone()),
            ..config()
        },
        no_env,
    )
    .expect("graph builds");
    assert!(graph.last_response().is_none());

    let response = graph
        .get("/me", RequestOptions::new().with_access_token("foo_token"))
        .await
        .expect("call succeeds");
    assert_eq!(response.decoded_body()["name"], "Foo");
    assert_eq!(graph.last_response().map(|r| r.http_status()), Some(1337));
    assert_eq!(http.request_count(), 1);
}
