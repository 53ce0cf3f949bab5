use http::StatusCode;
use thiserror::Error;

/// Failure talking to the repository host.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Permission denied: {0}")]
    Forbidden(String),
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("Network error: {0}")]
    Transport(String),
    #[error("Failed to decode response: {0}")]
    Decode(String),
    #[error("{0}")]
    Other(String),
}

impl SourceError {
    /// Whether retrying the same request later may succeed.
    pub fn is_temporary(&self) -> bool { matches!(self, Self::RateLimited(_) | Self::Transport(_)) }

    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::NOT_FOUND => Self::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited(message),
            // Secondary rate limits are reported as 403
            StatusCode::FORBIDDEN if message.to_ascii_lowercase().contains("rate limit") => {
                Self::RateLimited(message)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Forbidden(message),
            status if status.is_server_error() => {
                Self::Transport(format!("service unavailable ({status}): {message}"))
            }
            status => Self::Other(format!("{status}: {message}")),
        }
    }
}

impl From<octocrab::Error> for SourceError {
    fn from(err: octocrab::Error) -> Self {
        match err {
            octocrab::Error::GitHub { source, .. } => {
                Self::from_status(source.status_code, source.message)
            }
            octocrab::Error::Hyper { .. } | octocrab::Error::Service { .. } => {
                Self::Transport(err.to_string())
            }
            octocrab::Error::Serde { .. } | octocrab::Error::Json { .. } => {
                Self::Decode(err.to_string())
            }
            err => Self::Other(err.to_string()),
        }
    }
}
