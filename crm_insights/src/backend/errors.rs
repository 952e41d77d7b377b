use thiserror::Error;

use crate::errors::RetrievalError;

/// Errors raised by a [`StatsBackend`](super::StatsBackend) implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Network failure before a status line was received.
    #[error("API request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The body was not the JSON shape the endpoint promises.
    #[error("Could not decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Any non-2xx status other than 401/403.
    #[error("API error (HTTP {status}): {body}")]
    Http { status: u16, body: String },

    /// 401/403. The stored session token has already been cleared.
    #[error("Not authorized (HTTP {status})")]
    Unauthorized { status: u16 },

    /// No session token in the token store.
    #[error("No session token available")]
    MissingToken,

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    /// A 2xx body that reports an error instead of data.
    #[error("API reported an error: {0}")]
    Api(String),
}

impl From<BackendError> for RetrievalError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Request(e) => match e.status() {
                Some(status) => RetrievalError::Http { status: status.as_u16() },
                None if e.is_decode() => RetrievalError::MalformedResponse(e.to_string()),
                None => RetrievalError::Transport(e.to_string()),
            },
            BackendError::Decode(e) => RetrievalError::MalformedResponse(e.to_string()),
            BackendError::Http { status, .. } => RetrievalError::Http { status },
            BackendError::Unauthorized { status } => RetrievalError::Auth { status },
            BackendError::MissingToken => RetrievalError::Auth { status: 401 },
            BackendError::InvalidUrl(url) => RetrievalError::Validation(format!("invalid backend URL {url}")),
            BackendError::Api(reason) => RetrievalError::MalformedResponse(reason),
        }
    }
}
