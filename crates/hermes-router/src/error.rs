//! Registration errors.

use thiserror::Error;

/// Result type for route registration.
pub type RouteResult<T> = Result<T, RouteError>;

/// Errors raised while registering routes.
///
/// A pattern that is not a valid regular expression is not one of these:
/// it registers normally and never matches.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouteError {
    /// The namespace was empty after trimming slashes.
    #[error("routes must be namespaced (pattern: {pattern})")]
    EmptyNamespace {
        /// Pattern that was being registered.
        pattern: String,
    },

    /// The pattern was empty after trimming slashes.
    #[error("route pattern for namespace {namespace} is empty")]
    EmptyPattern {
        /// Namespace that was being registered into.
        namespace: String,
    },

    /// The registration carried no endpoints.
    #[error("route {route} was registered without endpoints")]
    NoEndpoints {
        /// Full route key.
        route: String,
    },
}
