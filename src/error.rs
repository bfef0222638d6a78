use std::result;

use crate::retry::RetryableError;
use thiserror::Error;

/// Error types for E-utilities session operations
#[derive(Error, Debug)]
pub enum EutilsError {
    /// HTTP request failed before a response was received
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success HTTP status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// API rate limit exceeded
    #[error("API rate limit exceeded")]
    RateLimitExceeded,

    /// Expected XML element missing or malformed
    #[error("XML parsing failed: {0}")]
    Parse(String),

    /// Requested result operation is neither summary nor fetch
    #[error("Invalid result operation: {0}")]
    InvalidOperation(String),

    /// Caller supplied arguments the remote API cannot accept
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

pub type Result<T> = result::Result<T, EutilsError>;

impl From<quick_xml::Error> for EutilsError {
    fn from(err: quick_xml::Error) -> Self {
        EutilsError::Parse(err.to_string())
    }
}

impl RetryableError for EutilsError {
    fn is_retryable(&self) -> bool {
        match self {
            EutilsError::Transport(err) => {
                if err.is_timeout() || err.is_connect() {
                    return true;
                }

                if let Some(status) = err.status() {
                    return status.is_server_error() || status.as_u16() == 429;
                }

                // DNS and other network errors
                !err.is_builder() && !err.is_redirect() && !err.is_decode()
            }

            EutilsError::RateLimitExceeded => true,

            EutilsError::Api { status, message } => {
                (*status >= 500 && *status < 600) || *status == 429 || {
                    let lower_msg = message.to_lowercase();
                    lower_msg.contains("temporarily unavailable")
                        || lower_msg.contains("timeout")
                        || lower_msg.contains("connection")
                }
            }

            EutilsError::Parse(_)
            | EutilsError::InvalidOperation(_)
            | EutilsError::InvalidArguments(_) => false,
        }
    }

    fn retry_reason(&self) -> &str {
        if self.is_retryable() {
            match self {
                EutilsError::Transport(err) if err.is_timeout() => "Request timeout",
                EutilsError::Transport(err) if err.is_connect() => "Connection error",
                EutilsError::Transport(_) => "Network error",
                EutilsError::RateLimitExceeded => "Rate limit exceeded",
                EutilsError::Api { status, .. } => match status {
                    429 => "Rate limit exceeded",
                    500..=599 => "Server error",
                    _ => "Temporary API error",
                },
                _ => "Transient error",
            }
        } else {
            match self {
                EutilsError::Parse(_) => "Invalid XML response",
                EutilsError::InvalidOperation(_) => "Invalid operation",
                EutilsError::InvalidArguments(_) => "Invalid input",
                EutilsError::Api { .. } => "Client error",
                _ => "Non-transient error",
            }
        }
    }
}
