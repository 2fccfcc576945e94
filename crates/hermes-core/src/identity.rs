//! Caller identity.
//!
//! The serving layer runs its authenticators before dispatch and stores the
//! outcome on the [`Request`](crate::Request). Permission checks read it
//! from there; nothing reads ambient state.

use serde::{Deserialize, Serialize};

/// Who is making the request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Identity {
    /// No credentials were presented.
    #[default]
    Anonymous,
    /// An authenticated user.
    User {
        /// Stable user identifier.
        user_id: String,
        /// Roles granted to the user.
        roles: Vec<String>,
    },
    /// An API key presented by an integration.
    ApiKey {
        /// Key identifier, never the secret.
        key_id: String,
        /// Scopes granted to the key.
        scopes: Vec<String>,
    },
}

impl Identity {
    /// Creates a user identity.
    #[must_use]
    pub fn user<I, R>(user_id: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self::User {
            user_id: user_id.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates an API key identity.
    #[must_use]
    pub fn api_key<I, S>(key_id: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ApiKey {
            key_id: key_id.into(),
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true unless the caller is anonymous.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Anonymous)
    }

    /// Returns an identifier suitable for logs. Never contains secrets.
    #[must_use]
    pub fn log_id(&self) -> String {
        match self {
            Self::Anonymous => "anonymous".to_string(),
            Self::User { user_id, .. } => format!("user:{user_id}"),
            Self::ApiKey { key_id, .. } => format!("apikey:{key_id}"),
        }
    }

    /// Returns the roles used for authorization. API key scopes count as roles.
    #[must_use]
    pub fn roles(&self) -> Vec<&str> {
        match self {
            Self::Anonymous => Vec::new(),
            Self::User { roles, .. } => roles.iter().map(String::as_str).collect(),
            Self::ApiKey { scopes, .. } => scopes.iter().map(String::as_str).collect(),
        }
    }

    /// Returns true if the caller holds `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles().contains(&role)
    }
}
