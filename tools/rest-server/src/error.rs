//! Gateway errors and their HTTP rendering.
//!
//! Every error renders as a `text/plain` body. The body text is what
//! clients of the gateway match on, so the `Display` strings are part of
//! the interface.
//!
//! | Error                        | Status |
//! |------------------------------|--------|
//! | BadRequest                   | 400    |
//! | UnsupportedAction / KeyType  | 405    |
//! | everything else              | 500    |

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use frest_keys::KeyError;
use frest_network::NetworkError;
use frest_services::{InsertError, ResolveError};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{debug, warn};

/// Body text of generic 400 responses.
pub const BAD_REQUEST_TEXT: &str = "Bad request";

/// Errors surfaced by request handlers.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Path, query or body could not be parsed
    #[error("{0}")]
    BadRequest(String),

    /// First path segment names no known action for the method
    #[error("Requested action is not supported")]
    UnsupportedAction,

    /// Key generation for an unknown key type
    #[error("Requested keytype is not supported")]
    UnsupportedKeyType,

    /// Network rejected or failed the insert
    #[error("{0}")]
    InsertFailure(InsertError),

    /// Insert was cancelled
    #[error("Insert was cancelled")]
    Cancelled,

    /// A configured bound passed without an outcome
    #[error("{0}")]
    TimedOut(String),

    /// Resolver plugin answered with an error
    #[error("Error: {code} {message}")]
    RemoteResolutionFailure { code: String, message: String },

    /// Anything else
    #[error("Server error: {0}")]
    InternalFault(String),
}

impl GatewayError {
    /// Generic malformed request.
    pub fn bad_request() -> Self {
        GatewayError::BadRequest(BAD_REQUEST_TEXT.to_string())
    }

    /// Undecodable JSON body.
    pub fn json_decode(error: impl core::fmt::Display) -> Self {
        GatewayError::BadRequest(format!("JSON content decoding error {}", error))
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::UnsupportedAction | GatewayError::UnsupportedKeyType => {
                StatusCode::METHOD_NOT_ALLOWED
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<InsertError> for GatewayError {
    fn from(error: InsertError) -> Self {
        match error {
            InsertError::InvalidTarget(_) => GatewayError::bad_request(),
            InsertError::Cancelled => GatewayError::Cancelled,
            InsertError::TimedOut(_) => GatewayError::TimedOut(error.to_string()),
            InsertError::Submit(_) | InsertError::Failed(_) => GatewayError::InsertFailure(error),
        }
    }
}

impl From<ResolveError> for GatewayError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::Remote { code, message } => {
                GatewayError::RemoteResolutionFailure { code, message }
            }
            ResolveError::TimedOut(_) => GatewayError::TimedOut(error.to_string()),
            ResolveError::Connect(_) | ResolveError::MissingField(_) => {
                GatewayError::InternalFault(error.to_string())
            }
        }
    }
}

impl From<KeyError> for GatewayError {
    fn from(error: KeyError) -> Self {
        match error {
            KeyError::UnsupportedKeyType(_) => GatewayError::UnsupportedKeyType,
            other => GatewayError::InternalFault(other.to_string()),
        }
    }
}

impl From<NetworkError> for GatewayError {
    fn from(error: NetworkError) -> Self {
        match error {
            NetworkError::InvalidPriority(_) | NetworkError::InvalidUri(_) => {
                GatewayError::bad_request()
            }
            other => GatewayError::InternalFault(other.to_string()),
        }
    }
}

impl From<JoinError> for GatewayError {
    fn from(error: JoinError) -> Self {
        GatewayError::InternalFault(error.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = self.to_string();
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %body, "request failed");
        } else {
            debug!(status = status.as_u16(), error = %body, "request rejected");
        }
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        assert_eq!(GatewayError::bad_request().status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GatewayError::UnsupportedAction.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            GatewayError::UnsupportedKeyType.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            GatewayError::Cancelled.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_insert_error_text() {
        let error = GatewayError::from(InsertError::Failed(NetworkError::RouteNotFound));
        assert_eq!(error.to_string(), "Insert failed route not found");
        assert_eq!(
            GatewayError::from(InsertError::Cancelled).to_string(),
            "Insert was cancelled"
        );
        assert!(matches!(
            GatewayError::from(InsertError::TimedOut(Duration::from_secs(1))),
            GatewayError::TimedOut(_)
        ));
    }

    #[test]
    fn test_resolve_error_text() {
        let error = GatewayError::from(ResolveError::Remote {
            code: "404".into(),
            message: "name not registered: x".into(),
        });
        assert_eq!(error.to_string(), "Error: 404 name not registered: x");
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_key_and_priority_errors() {
        assert!(matches!(
            GatewayError::from(KeyError::UnsupportedKeyType("CHK".into())),
            GatewayError::UnsupportedKeyType
        ));
        assert_eq!(
            GatewayError::from(NetworkError::InvalidPriority("9".into())).to_string(),
            "Bad request"
        );
        assert_eq!(
            GatewayError::json_decode("expected value").to_string(),
            "JSON content decoding error expected value"
        );
    }
}
