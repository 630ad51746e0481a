//! Error types for route registration and resolution.

use thiserror::Error;

use crate::parser::Method;

/// Errors raised by the [`RouteTable`](crate::router::RouteTable).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A route with the same method and pattern is already registered.
    #[error("Duplicate route: {method} {pattern}")]
    DuplicateRoute {
        method: Method,
        pattern: String,
    },

    /// The pattern could not be parsed.
    #[error("Invalid route pattern {pattern:?}: {reason}")]
    InvalidPattern {
        pattern: String,
        reason: String,
    },

    /// No registered pattern matches the path.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Some pattern matches the path, but not for this method.
    #[error("Method {method} not allowed for path: {path}")]
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },
}

impl Error {
    pub(crate) fn invalid(pattern: &str, reason: impl Into<String>) -> Self {
        Error::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}
