//! Error types for the answer generator.

/// Failures of one generator call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeneratorError {
    #[error("network error: {0}")]
    Network(String),
    #[error("generator timed out after {0}s")]
    Timeout(u64),
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("quota exceeded: {0}")]
    Quota(String),
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl GeneratorError {
    /// Whether a second attempt might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, GeneratorError::Network(_) | GeneratorError::Timeout(_))
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => GeneratorError::Auth(body),
            429 => GeneratorError::Quota(body),
            _ => GeneratorError::Server { status, body },
        }
    }
}

impl From<reqwest::Error> for GeneratorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GeneratorError::Timeout(0)
        } else if err.is_decode() {
            GeneratorError::InvalidResponse(err.to_string())
        } else {
            GeneratorError::Network(err.to_string())
        }
    }
}
