//! URL-detection capability: tells the login flow which URL the user landed on.

use std::sync::Arc;

pub const CGI_HANDLER_NAME: &str = "cgi";

pub trait UrlDetectionHandler: Send + Sync {
    fn name(&self) -> &str;

    fn current_url(&self) -> String;
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Rebuilds the current URL from CGI-style variables (`HTTPS`, `HTTP_HOST`,
/// `SERVER_PORT`, `REQUEST_URI` and the `X-Forwarded-*` equivalents).
#[derive(Clone)]
pub struct CgiUrlDetection {
    env: EnvLookup,
}

impl CgiUrlDetection {
    /// Reads from the process environment.
    pub fn new() -> Self {
        Self::with_env(|name| std::env::var(name).ok())
    }

    pub fn with_env<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            env: Arc::new(lookup),
        }
    }

    fn var(&self, name: &str) -> Option<String> {
        (self.env)(name).filter(|value| !value.trim().is_empty())
    }

    fn is_behind_ssl(&self) -> bool {
        if let Some(proto) = self.var("HTTP_X_FORWARDED_PROTO") {
            let first = proto.split(',').next().unwrap_or_default().trim();
            return first.eq_ignore_ascii_case("https");
        }
        if let Some(https) = self.var("HTTPS") {
            return https.eq_ignore_ascii_case("on") || https == "1";
        }
        self.var("SERVER_PORT").as_deref() == Some("443")
    }

    fn scheme(&self) -> &'static str {
        if self.is_behind_ssl() { "https" } else { "http" }
    }

    fn host(&self) -> String {
        let host = self
            .var("HTTP_X_FORWARDED_HOST")
            .and_then(|hosts| hosts.rsplit(',').next().map(|host| host.trim().to_string()))
            .or_else(|| self.var("HTTP_HOST"))
            .or_else(|| self.var("SERVER_NAME"))
            .or_else(|| self.var("SERVER_ADDR"))
            .unwrap_or_else(|| "localhost".to_string());
        strip_port(&host).to_string()
    }

    fn port(&self) -> Option<String> {
        self.var("HTTP_X_FORWARDED_PORT")
            .or_else(|| self.var("SERVER_PORT"))
    }
}

impl Default for CgiUrlDetection {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CgiUrlDetection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CgiUrlDetection").finish_non_exhaustive()
    }
}

impl UrlDetectionHandler for CgiUrlDetection {
    fn name(&self) -> &str {
        CGI_HANDLER_NAME
    }

    fn current_url(&self) -> String {
        let scheme = self.scheme();
        let mut authority = self.host();
        if let Some(port) = self.port() {
            let default_port = matches!((scheme, port.as_str()), ("http", "80") | ("https", "443"));
            if !default_port {
                authority.push(':');
                authority.push_str(&port);
            }
        }
        let path = self.var("REQUEST_URI").unwrap_or_else(|| "/".to_string());
        format!("{scheme}://{authority}{path}")
    }
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn detector(vars: &[(&str, &str)]) -> CgiUrlDetection {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CgiUrlDetection::with_env(move |name| vars.get(name).cloned())
    }

    #[test]
    fn plain_http_request_on_default_port() {
        let url = detector(&[
            ("HTTP_HOST", "example.com"),
            ("SERVER_PORT", "80"),
            ("REQUEST_URI", "/callback?code=abc"),
        ])
        .current_url();
        assert_eq!(url, "http://example.com/callback?code=abc");
    }

    #[test]
    fn https_with_custom_port() {
        let url = detector(&[
            ("HTTPS", "on"),
            ("HTTP_HOST", "example.com:8443"),
            ("SERVER_PORT", "8443"),
            ("REQUEST_URI", "/cb"),
        ])
        .current_url();
        assert_eq!(url, "https://example.com:8443/cb");
    }

    #[test]
    fn forwarded_headers_win() {
        let url = detector(&[
            ("HTTP_X_FORWARDED_PROTO", "https, http"),
            ("HTTP_X_FORWARDED_HOST", "internal, proxy.example.com"),
            ("HTTP_X_FORWARDED_PORT", "443"),
            ("HTTP_HOST", "10.0.0.1:8080"),
            ("SERVER_PORT", "8080"),
            ("REQUEST_URI", "/login"),
        ])
        .current_url();
        assert_eq!(url, "https://proxy.example.com/login");
    }

    #[test]
    fn empty_environment_falls_back_to_localhost() {
        assert_eq!(detector(&[]).current_url(), "http://localhost/");
    }
}
