//! Client error type.

use thiserror::Error;

/// Why a client call did not succeed.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No answer within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// Connection or protocol failure, including undecodable bodies.
    #[error("HTTP request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The server answered with an error body.
    #[error("API error {status} {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
        retryable: bool,
    },

    /// The candidate is not on the local ballot; nothing was sent.
    #[error("Unknown candidate: {0}")]
    UnknownCandidate(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Whether sending the same request again may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) => true,
            Self::Api { retryable, .. } => *retryable,
            Self::UnknownCandidate(_) | Self::InvalidUrl(_) => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err)
        }
    }
}
