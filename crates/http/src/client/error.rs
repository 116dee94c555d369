//! Client error types

use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// HTTP-level failure: the backend answered with a non-2xx status.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    /// Response status code
    pub status: u16,
    /// Parsed error payload, if the body was JSON
    pub details: Option<Value>,
    /// Human-readable message
    pub message: String,
}

impl ApiError {
    /// Build an error from a status and the (possibly absent) JSON body.
    ///
    /// The message is the payload's `detail` field when it is a string,
    /// otherwise `API Error: <code> (<reason>)`.
    pub fn from_response(status: StatusCode, details: Option<Value>) -> Self {
        let message = details
            .as_ref()
            .and_then(|body| body.get("detail"))
            .and_then(Value::as_str)
            .map_or_else(
                || {
                    format!(
                        "API Error: {} ({})",
                        status.as_u16(),
                        status.canonical_reason().unwrap_or("Unknown")
                    )
                },
                str::to_string,
            );

        Self {
            status: status.as_u16(),
            details,
            message,
        }
    }
}

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or transport failure, propagated unclassified
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server returned an error status
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Response body did not match the expected shape
    #[error("Validation error: {0}")]
    Validation(String),

    /// Session refresh failed; the session has been cleared
    #[error("Unable to refresh session: {0}")]
    Refresh(#[source] Arc<ClientError>),

    /// Request body could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The session was cleared while the call was in flight; its token was discarded
    #[error("Session ended before the request completed")]
    SessionEnded,
}

impl ClientError {
    /// HTTP status carried by this error, looking through refresh failures
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api(err) => Some(err.status),
            Self::Refresh(inner) => inner.status(),
            _ => None,
        }
    }

    /// Whether the backend rejected the request's credentials
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api(err) if err.status == StatusCode::UNAUTHORIZED.as_u16())
    }

    /// Whether this error came out of the refresh path
    pub const fn is_refresh_failure(&self) -> bool {
        matches!(self, Self::Refresh(_))
    }

    /// Whether the session ended underneath the call, looking through refresh failures
    pub fn is_session_ended(&self) -> bool {
        match self {
            Self::SessionEnded => true,
            Self::Refresh(inner) => inner.is_session_ended(),
            _ => false,
        }
    }

    /// Message suitable for showing next to a form
    pub fn display_message(&self) -> String {
        match self {
            Self::Api(err) => err.message.clone(),
            Self::Validation(message) => message.clone(),
            Self::Refresh(inner) => inner.display_message(),
            Self::SessionEnded => self.to_string(),
            Self::Transport(_) | Self::Serialization(_) | Self::Configuration(_) => {
                "Unexpected error".to_string()
            }
        }
    }
}
