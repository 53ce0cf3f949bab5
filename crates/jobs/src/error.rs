use clio_analysis::AnalysisError;
use clio_generator::GenerationError;
use clio_github::SourceError;
use thiserror::Error;

/// Substrings that mark an error message as transient.
pub const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "network",
    "connection",
    "econnreset",
    "econnrefused",
    "rate limit",
    "too many requests",
    "temporar",
    "unavailable",
];

pub fn has_transient_marker(message: &str) -> bool {
    let message = message.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| message.contains(marker))
}

/// Failure of one job attempt.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Repository {0} is not linked")]
    MissingRepository(u64),
    #[error("Repository {0} has no installation")]
    MissingInstallation(String),
    #[error("Malformed repository full name {0:?}")]
    InvalidRepository(String),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error("README generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("Job timed out after {0}ms")]
    Timeout(u64),
    #[error("Job store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl JobError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::MissingRepository(_)
            | Self::MissingInstallation(_)
            | Self::InvalidRepository(_)
            | Self::Analysis(AnalysisError::InvalidRepository(_))
            | Self::Analysis(AnalysisError::Tree {
                source: SourceError::NotFound(_) | SourceError::Forbidden(_),
                ..
            }) => false,
            Self::Analysis(err) => err.is_temporary() || has_transient_marker(&err.to_string()),
            Self::Generation(err) => err.temporary || has_transient_marker(&err.message),
            Self::Store(err) => has_transient_marker(&format!("{err:#}")),
        }
    }
}
