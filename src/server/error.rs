//! Error types for the HTTP server.

use std::time::Duration;

use thiserror::Error;

use crate::parser::Error as ParserError;
use crate::router::Error as RouterError;
use crate::server::application::Phase;
use crate::server::response::{HttpResponse, StatusCode};

/// Errors that can occur while setting up or serving an application.
///
/// Handlers and middlewares return this type as well; whatever reaches the
/// connection is turned into a response by [`Error::to_response`].
#[derive(Debug, Error)]
pub enum Error {
    /// Error parsing an HTTP request.
    #[error("Parse error: {0}")]
    ParseError(#[from] ParserError),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Route registration or resolution failed.
    #[error(transparent)]
    Routing(#[from] RouterError),

    /// A handler asked for a specific error status.
    #[error("{status}: {reason}")]
    Http {
        status: StatusCode,
        reason: String,
    },

    /// A handler asked for a redirect.
    #[error("Redirect to {0}")]
    Redirect(String),

    /// A middleware broke the chain contract, e.g. by running `next` twice.
    #[error("Middleware contract violated: {0}")]
    MiddlewareContract(String),

    /// Handler execution exceeded the configured request timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// A handler panicked.
    #[error("Handler panicked: {0}")]
    HandlerPanicked(String),

    /// Registration attempted outside the setup phase.
    #[error("Application is {0}; routes, middlewares and hooks can only be added during setup")]
    NotInSetup(Phase),

    /// A startup or shutdown hook failed.
    #[error("{phase} hook #{index} failed: {source}")]
    Hook {
        phase: &'static str,
        index: usize,
        #[source]
        source: Box<Error>,
    },

    /// One or more shutdown hooks failed. All of them were still run.
    #[error("{} shutdown hook(s) failed", .0.len())]
    Shutdown(Vec<Error>),

    /// Internal server error.
    #[error("Internal server error: {0}")]
    InternalError(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl Error {
    /// Fail a request with the given status and reason.
    pub fn http(status: StatusCode, reason: impl Into<String>) -> Self {
        Error::Http {
            status,
            reason: reason.into(),
        }
    }

    /// Fail a request with a `302 Found` pointing at `location`.
    pub fn redirect(location: impl Into<String>) -> Self {
        Error::Redirect(location.into())
    }

    /// The status this error maps to on the wire.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::ParseError(ParserError::HeadTooLarge(_) | ParserError::BodyTooLarge(_)) => StatusCode::PayloadTooLarge,
            Error::ParseError(_) => StatusCode::BadRequest,
            Error::Routing(RouterError::NotFound(_)) => StatusCode::NotFound,
            Error::Routing(RouterError::MethodNotAllowed { .. }) => StatusCode::MethodNotAllowed,
            Error::Http { status, .. } => *status,
            Error::Redirect(_) => StatusCode::Found,
            Error::Timeout(_) => StatusCode::GatewayTimeout,
            _ => StatusCode::InternalServerError,
        }
    }

    /// Whether this error points at a bug in the application rather than a
    /// client fault, and so must be reported to the operator.
    pub fn is_server_fault(&self) -> bool {
        self.status() == StatusCode::InternalServerError
    }

    /// The default translation of an error into a response.
    pub fn to_response(&self) -> HttpResponse {
        let status = self.status();
        let response = HttpResponse::new(status).with_content_type("text/plain");

        match self {
            Error::Routing(RouterError::MethodNotAllowed { allowed, .. }) => {
                let allowed = allowed
                    .iter()
                    .map(|m| m.to_string())
                    .collect::<Vec<String>>()
                    .join(", ");
                response
                    .with_header("Allow", allowed)
                    .with_body_string(self.to_string())
            }
            Error::Redirect(location) => response
                .with_header("Location", location.as_str())
                .with_body_string(format!("Found: {location}")),
            Error::Http { reason, .. } => response.with_body_string(reason.as_str()),
            Error::ParseError(e) => response.with_body_string(format!("Error parsing request: {e}")),
            // Internals stay in the log.
            _ if self.is_server_fault() => response.with_body_string(status.reason_phrase()),
            _ => response.with_body_string(self.to_string()),
        }
    }
}
