use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScienceError {
    #[error("invalid arXiv ID: {0}")]
    InvalidArxivId(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error from {0}: {1}")]
    ApiError(String, String),

    #[error("rate limit from {0}, gave up after {1} retries")]
    RateLimit(String, u32),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("classification error: {0}")]
    Classification(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a failed call should be read by the caller deciding on a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network trouble or a non-success status.
    Transient,
    /// Backoff retries exhausted.
    RateLimited,
    /// The response arrived but could not be understood.
    Malformed,
    /// Local resource missing or unreadable.
    Unavailable,
}

impl ScienceError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Http(_) | Self::ApiError(..) => FailureKind::Transient,
            Self::RateLimit(..) => FailureKind::RateLimited,
            Self::Parse(_) | Self::InvalidArxivId(_) | Self::Classification(_) => {
                FailureKind::Malformed
            }
            Self::Io(_) => FailureKind::Unavailable,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Transient => "transient",
            Self::RateLimited => "rate-limited",
            Self::Malformed => "malformed",
            Self::Unavailable => "unavailable",
        };
        write!(f, "{s}")
    }
}

pub type Result<T> = std::result::Result<T, ScienceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_failures() {
        assert_eq!(
            ScienceError::RateLimit("semantic_scholar".into(), 3).kind(),
            FailureKind::RateLimited
        );
        assert_eq!(
            ScienceError::ApiError("openalex".into(), "HTTP 500".into()).kind(),
            FailureKind::Transient
        );
        assert_eq!(ScienceError::Parse("bad".into()).kind(), FailureKind::Malformed);
    }
}
