//! OAuth redirect login: authorization URLs, code exchange and CSRF state.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde_json::Value;
use tracing::debug;

use crate::app::GraphApp;
use crate::client::GraphClient;
use crate::errors::{SDKError, SDKResult, TransportError, value_as_u64};
use crate::persistent::PersistentDataHandler;
use crate::request::{GraphRequest, ParamValue, Params, params};
use crate::token::AccessToken;
use crate::url_detection::UrlDetectionHandler;
use crate::url_manipulator;

pub const BASE_AUTHORIZATION_URL: &str = "https://www.facebook.com";
pub const CSRF_STATE_KEY: &str = "FBRLH_state";
const SDK_NAME: &str = "rust-sdk";

const REDIRECT_PARAMS_TO_STRIP: [&str; 7] = [
    "state",
    "code",
    "enforce_https",
    "error",
    "error_reason",
    "error_description",
    "error_code",
];

/// App-level OAuth calls.
pub struct OAuth2Client<'a> {
    app: GraphApp,
    client: &'a GraphClient,
    graph_version: String,
}

impl<'a> OAuth2Client<'a> {
    pub fn new(app: GraphApp, client: &'a GraphClient, graph_version: impl Into<String>) -> Self {
        Self {
            app,
            client,
            graph_version: graph_version.into(),
        }
    }

    /// `https://www.facebook.com/{version}/dialog/oauth?...`. Extra params
    /// never override the standard ones.
    pub fn authorization_url(
        &self,
        redirect_url: &str,
        state: &str,
        scope: &[&str],
        extra: &[(&str, &str)],
    ) -> String {
        let scope = scope.join(",");
        let mut pairs: Vec<(&str, &str)> = vec![
            ("client_id", self.app.id()),
            ("state", state),
            ("response_type", "code"),
            ("sdk", SDK_NAME),
            ("redirect_uri", redirect_url),
            ("scope", scope.as_str()),
        ];
        for &(key, value) in extra {
            if !pairs.iter().any(|(existing, _)| *existing == key) {
                pairs.push((key, value));
            }
        }
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        format!(
            "{BASE_AUTHORIZATION_URL}/{}/dialog/oauth?{query}",
            self.graph_version
        )
    }

    pub async fn access_token_from_code(
        &self,
        code: &str,
        redirect_url: &str,
    ) -> SDKResult<AccessToken> {
        self.request_access_token(params([("code", code), ("redirect_uri", redirect_url)]))
            .await
    }

    /// Trade a short-lived user token for a long-lived one.
    pub async fn long_lived_access_token(&self, token: &AccessToken) -> SDKResult<AccessToken> {
        self.request_access_token(params([
            ("grant_type", "fb_exchange_token"),
            ("fb_exchange_token", token.value()),
        ]))
        .await
    }

    /// Raw `/debug_token` metadata for `token`, fetched with the app token.
    pub async fn debug_token(&self, token: &AccessToken) -> SDKResult<Value> {
        let request = GraphRequest::new(
            self.app.clone(),
            Some(self.app.app_access_token()),
            "GET",
            "/debug_token",
            params([("input_token", token.value())]),
            Some(&self.graph_version),
        )?;
        let response = self.client.send_request(&request).await?;
        Ok(response
            .decoded_body()
            .get("data")
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn request_access_token(&self, mut params: Params) -> SDKResult<AccessToken> {
        params.insert("client_id".into(), ParamValue::from(self.app.id()));
        params.insert("client_secret".into(), ParamValue::from(self.app.secret()));
        let request = GraphRequest::new(
            self.app.clone(),
            Some(self.app.app_access_token()),
            "GET",
            "/oauth/access_token",
            params,
            Some(&self.graph_version),
        )?;
        let response = self.client.send_request(&request).await?;
        let body = response.decoded_body();

        let Some(value) = body.get("access_token").and_then(Value::as_str) else {
            return Err(TransportError::Malformed {
                status: response.http_status(),
                message: "access token was not returned from Graph".to_string(),
                body: response.body().to_string(),
            }
            .into());
        };
        let expires_in = body
            .get("expires_in")
            .or_else(|| body.get("expires"))
            .and_then(value_as_u64)
            .filter(|seconds| *seconds > 0);
        Ok(match expires_in {
            Some(seconds) => {
                AccessToken::with_expiry(value, SystemTime::now() + Duration::from_secs(seconds))
            }
            None => AccessToken::new(value),
        })
    }
}

/// Error details Facebook appends to the redirect URL when the user declines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedirectError {
    pub error: String,
    pub error_code: Option<String>,
    pub error_reason: Option<String>,
    pub error_description: Option<String>,
}

/// Login through a browser redirect. CSRF state lives in the persistent
/// store between [`Self::login_url`] and [`Self::access_token`].
pub struct RedirectLoginHelper<'a> {
    oauth: OAuth2Client<'a>,
    persistent_data: Arc<dyn PersistentDataHandler>,
    url_detection: Arc<dyn UrlDetectionHandler>,
}

impl<'a> RedirectLoginHelper<'a> {
    pub fn new(
        oauth: OAuth2Client<'a>,
        persistent_data: Arc<dyn PersistentDataHandler>,
        url_detection: Arc<dyn UrlDetectionHandler>,
    ) -> Self {
        Self {
            oauth,
            persistent_data,
            url_detection,
        }
    }

    pub fn persistent_data_handler(&self) -> &Arc<dyn PersistentDataHandler> {
        &self.persistent_data
    }

    pub fn url_detection_handler(&self) -> &Arc<dyn UrlDetectionHandler> {
        &self.url_detection
    }

    pub async fn login_url(&self, redirect_url: &str, scope: &[&str]) -> SDKResult<String> {
        let state = uuid::Uuid::new_v4().simple().to_string();
        self.persistent_data.set(CSRF_STATE_KEY, &state).await?;
        Ok(self.oauth.authorization_url(redirect_url, &state, scope, &[]))
    }

    /// Re-request permissions the user declined earlier.
    pub async fn rerequest_url(&self, redirect_url: &str, scope: &[&str]) -> SDKResult<String> {
        let state = uuid::Uuid::new_v4().simple().to_string();
        self.persistent_data.set(CSRF_STATE_KEY, &state).await?;
        Ok(self
            .oauth
            .authorization_url(redirect_url, &state, scope, &[("auth_type", "rerequest")]))
    }

    pub fn logout_url(&self, token: &AccessToken, next: &str) -> SDKResult<String> {
        if token.is_app_access_token() {
            return Err(SDKError::validation(
                "cannot generate a logout URL with an app access token",
            ));
        }
        Ok(url_manipulator::append_params_to_url(
            &format!("{BASE_AUTHORIZATION_URL}/logout.php"),
            [("next", next), ("access_token", token.value())],
        ))
    }

    /// Exchange the `code` on the current URL for a token. `Ok(None)` when
    /// the URL carries no code.
    pub async fn access_token(&self, redirect_url: Option<&str>) -> SDKResult<Option<AccessToken>> {
        let current_url = self.url_detection.current_url();
        let url_params = url_manipulator::params_from_url(&current_url);
        let Some(code) = url_params.get("code").filter(|code| !code.is_empty()) else {
            return Ok(None);
        };

        self.validate_csrf(url_params.get("state").map(String::as_str))
            .await?;
        self.persistent_data.clear(CSRF_STATE_KEY).await?;

        let redirect_url = url_manipulator::remove_params_from_url(
            redirect_url.unwrap_or(&current_url),
            &REDIRECT_PARAMS_TO_STRIP,
        );
        debug!(redirect_url = %redirect_url, "exchanging login code for access token");
        self.oauth
            .access_token_from_code(code, &redirect_url)
            .await
            .map(Some)
    }

    pub fn redirect_error(&self) -> Option<RedirectError> {
        let mut url_params = url_manipulator::params_from_url(&self.url_detection.current_url());
        Some(RedirectError {
            error: url_params.remove("error")?,
            error_code: url_params.remove("error_code"),
            error_reason: url_params.remove("error_reason"),
            error_description: url_params.remove("error_description"),
        })
    }

    async fn validate_csrf(&self, state: Option<&str>) -> SDKResult<()> {
        let Some(state) = state.filter(|state| !state.is_empty()) else {
            return Err(SDKError::validation(
                "cross-site request forgery validation failed: required param \"state\" missing from the URL",
            ));
        };
        let Some(stored) = self.persistent_data.get(CSRF_STATE_KEY).await? else {
            return Err(SDKError::validation(
                "cross-site request forgery validation failed: no stored state to compare",
            ));
        };
        if stored != state {
            return Err(SDKError::validation(
                "cross-site request forgery validation failed: the state in the URL and the stored state do not match",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistent::MemoryPersistentData;
    use crate::testing::StaticResponseHttpClient;
    use crate::url_detection::CgiUrlDetection;

    fn client(body: &str) -> (Arc<StaticResponseHttpClient>, GraphClient) {
        let http = Arc::new(StaticResponseHttpClient::new(200, body.to_string()));
        (http.clone(), GraphClient::new(http, false))
    }

    fn landing_on(uri: &'static str) -> Arc<dyn UrlDetectionHandler> {
        Arc::new(CgiUrlDetection::with_env(move |name| match name {
            "HTTP_HOST" => Some("example.com".to_string()),
            "HTTPS" => Some("on".to_string()),
            "REQUEST_URI" => Some(uri.to_string()),
            _ => None,
        }))
    }

    #[test]
    fn authorization_url_carries_standard_params() {
        let (_, client) = client("{}");
        let oauth = OAuth2Client::new(GraphApp::new("123", "foo_secret"), &client, "v2.8");
        let url = oauth.authorization_url(
            "https://example.com/cb",
            "st",
            &["email", "user_posts"],
            &[("state", "ignored"), ("display", "popup")],
        );
        assert_eq!(
            url,
            "https://www.facebook.com/v2.8/dialog/oauth?client_id=123&state=st&response_type=code\
             &sdk=rust-sdk&redirect_uri=https%3A%2F%2Fexample.com%2Fcb&scope=email%2Cuser_posts\
             &display=popup"
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn login_round_trip_validates_state_and_exchanges_code() {
        let (http, client) = client(r#"{"access_token":"user_token","expires_in":3600}"#);
        let store = Arc::new(MemoryPersistentData::new());
        store.set(CSRF_STATE_KEY, "abc").await.expect("seed state");
        let helper = RedirectLoginHelper::new(
            OAuth2Client::new(GraphApp::new("123", "foo_secret"), &client, "v2.8"),
            store.clone(),
            landing_on("/cb?code=foo_code&state=abc"),
        );

        let token = helper
            .access_token(None)
            .await
            .expect("exchange succeeds")
            .expect("token present");
        assert_eq!(token.value(), "user_token");
        assert_eq!(token.is_expired(), Some(false));
        assert_eq!(store.get(CSRF_STATE_KEY).await.expect("get"), None);

        let sent = http.requests();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].url.contains("/v2.8/oauth/access_token?"));
        assert!(sent[0].url.contains("code=foo_code"));
        assert!(sent[0].url.contains("redirect_uri=https%3A%2F%2Fexample.com%2Fcb"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn mismatched_state_is_rejected_before_any_request() {
        let (http, client) = client("{}");
        let store = Arc::new(MemoryPersistentData::new());
        store.set(CSRF_STATE_KEY, "expected").await.expect("seed state");
        let helper = RedirectLoginHelper::new(
            OAuth2Client::new(GraphApp::new("123", "foo_secret"), &client, "v2.8"),
            store,
            landing_on("/cb?code=foo_code&state=forged"),
        );
        let error = helper.access_token(None).await.expect_err("csrf must fail");
        assert!(matches!(error, SDKError::Validation(_)));
        assert_eq!(http.request_count(), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn url_without_code_yields_none_and_exposes_error() {
        let (_, client) = client("{}");
        let helper = RedirectLoginHelper::new(
            OAuth2Client::new(GraphApp::new("123", "foo_secret"), &client, "v2.8"),
            Arc::new(MemoryPersistentData::new()),
            landing_on("/cb?error=access_denied&error_code=200&error_reason=user_denied"),
        );
        assert!(helper.access_token(None).await.expect("no code").is_none());
        let error = helper.redirect_error().expect("error present");
        assert_eq!(error.error, "access_denied");
        assert_eq!(error.error_reason.as_deref(), Some("user_denied"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn login_url_stores_state() {
        let (_, client) = client("{}");
        let store = Arc::new(MemoryPersistentData::new());
        let helper = RedirectLoginHelper::new(
            OAuth2Client::new(GraphApp::new("123", "foo_secret"), &client, "v2.8"),
            store.clone(),
            landing_on("/"),
        );
        let url = helper
            .login_url("https://example.com/cb", &["email"])
            .await
            .expect("url builds");
        let state = store
            .get(CSRF_STATE_KEY)
            .await
            .expect("get")
            .expect("state stored");
        assert!(url.contains(&format!("state={state}")));
    }

    #[test]
    fn logout_url_refuses_app_tokens() {
        let (_, client) = client("{}");
        let app = GraphApp::new("123", "foo_secret");
        let helper = RedirectLoginHelper::new(
            OAuth2Client::new(app.clone(), &client, "v2.8"),
            Arc::new(MemoryPersistentData::new()),
            landing_on("/"),
        );
        assert!(helper.logout_url(&app.app_access_token(), "https://x").is_err());
        let url = helper
            .logout_url(&AccessToken::new("user"), "https://example.com")
            .expect("user token works");
        assert_eq!(
            url,
            "https://www.facebook.com/logout.php?next=https%3A%2F%2Fexample.com&access_token=user"
        );
    }
}
