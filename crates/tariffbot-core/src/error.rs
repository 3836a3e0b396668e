use thiserror::Error;

/// Top-level error type for TariffBot.
///
/// Subsystem crates either return this type directly or define their own
/// error enum and convert at the boundary, so that `?` works across crates.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TariffError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid HTS code: {0}")]
    InvalidCode(String),

    #[error("Calculation error: {0}")]
    Calculation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for TariffError {
    fn from(err: toml::de::Error) -> Self {
        TariffError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TariffError {
    fn from(err: toml::ser::Error) -> Self {
        TariffError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TariffError {
    fn from(err: serde_json::Error) -> Self {
        TariffError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for TariffBot operations.
pub type Result<T> = std::result::Result<T, TariffError>;
