//! Request authentication run by the serving layer before dispatch.
//!
//! Authenticators are consulted in order. The first one that does not
//! abstain decides: a rejection is sent without dispatching, a success
//! becomes the request [`Identity`].

use std::collections::HashMap;
use std::sync::Arc;

use hermes_core::{BoxFuture, Failure, Identity, Request};
use http::header::AUTHORIZATION;
use http::StatusCode;

/// Code of the failure sent for an unknown bearer token.
pub const INVALID_TOKEN: &str = "rest_invalid_token";

/// The verdict of one authenticator.
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    /// No credentials this authenticator understands.
    Abstain,
    /// Credentials accepted.
    Authenticated(Identity),
    /// Credentials presented but refused.
    Rejected(Failure),
}

/// Resolves the caller of a request.
pub trait Authenticator: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Inspects `request` and returns a verdict.
    fn authenticate<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, AuthOutcome>;
}

/// Accepts `Authorization: Bearer <token>` from a static token table.
///
/// # Example
///
/// ```rust
/// use hermes_core::Identity;
/// use hermes_server::BearerTokenAuthenticator;
///
/// let auth = BearerTokenAuthenticator::new()
///     .token("s3cret", Identity::user("1", ["administrator"]));
/// assert_eq!(auth.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BearerTokenAuthenticator {
    tokens: HashMap<String, Identity>,
}

impl BearerTokenAuthenticator {
    /// Creates an authenticator with no tokens.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a token.
    #[must_use]
    pub fn token(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }

    /// Number of known tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if no tokens are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn check(&self, request: &Request) -> AuthOutcome {
        let Some(header) = request.header(AUTHORIZATION.as_str()) else {
            return AuthOutcome::Abstain;
        };
        let Some(token) = header
            .split_once(' ')
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token.trim())
        else {
            return AuthOutcome::Abstain;
        };

        match self.tokens.get(token) {
            Some(identity) => AuthOutcome::Authenticated(identity.clone()),
            None => AuthOutcome::Rejected(Failure::with_status(
                INVALID_TOKEN,
                "The bearer token is invalid.",
                StatusCode::UNAUTHORIZED,
            )),
        }
    }
}

impl Authenticator for BearerTokenAuthenticator {
    fn name(&self) -> &'static str {
        "bearer"
    }

    fn authenticate<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, AuthOutcome> {
        Box::pin(std::future::ready(self.check(request)))
    }
}

/// Authenticators in consultation order.
#[derive(Clone, Default)]
pub(crate) struct AuthChain {
    authenticators: Vec<Arc<dyn Authenticator>>,
}

impl AuthChain {
    pub(crate) fn push(&mut self, authenticator: Arc<dyn Authenticator>) {
        self.authenticators.push(authenticator);
    }

    pub(crate) fn len(&self) -> usize {
        self.authenticators.len()
    }

    pub(crate) async fn authenticate(&self, request: &Request) -> AuthOutcome {
        for authenticator in &self.authenticators {
            match authenticator.authenticate(request).await {
                AuthOutcome::Abstain => continue,
                outcome => {
                    tracing::trace!(authenticator = authenticator.name(), "authentication decided");
                    return outcome;
                }
            }
        }
        AuthOutcome::Abstain
    }
}
