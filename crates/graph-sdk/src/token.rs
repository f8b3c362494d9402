use std::fmt;
use std::time::{Duration, SystemTime};

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Tokens living longer than this are considered long-lived.
const LONG_LIVED_THRESHOLD: Duration = Duration::from_secs(2 * 60 * 60);

/// Immutable bearer token with optional expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    expires_at: Option<SystemTime>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(value: impl Into<String>, expires_at: SystemTime) -> Self {
        Self {
            value: value.into(),
            expires_at: Some(expires_at),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> Option<SystemTime> {
        self.expires_at
    }

    /// `None` when the token carries no expiry information.
    pub fn is_expired(&self) -> Option<bool> {
        self.expires_at
            .map(|expires_at| expires_at <= SystemTime::now())
    }

    pub fn is_long_lived(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at > SystemTime::now() + LONG_LIVED_THRESHOLD,
            None => self.is_app_access_token(),
        }
    }

    pub fn is_app_access_token(&self) -> bool {
        self.value.contains('|')
    }

    /// Hex HMAC-SHA256 of the token keyed by the app secret.
    pub fn app_secret_proof(&self, app_secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(self.value.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible: String = self.value.chars().take(4).collect();
        f.debug_struct("AccessToken")
            .field("value", &format_args!("{visible}…"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl From<&str> for AccessToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AccessToken {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
