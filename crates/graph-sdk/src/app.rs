use crate::token::AccessToken;

/// Application credentials. Created once per [`crate::Graph`] and never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct GraphApp {
    id: String,
    secret: String,
}

impl GraphApp {
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// The `id|secret` token usable for app-level calls.
    pub fn app_access_token(&self) -> AccessToken {
        AccessToken::new(format!("{}|{}", self.id, self.secret))
    }
}

impl std::fmt::Debug for GraphApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphApp")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}
