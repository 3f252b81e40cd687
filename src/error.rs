use thiserror::Error;

use crate::domain::error::DomainError;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The sources of an experiment share no sample identifiers.
    #[error("sources have no samples in common")]
    NoSamplesInCommon,

    /// The owner asked for the experiment to stop and a checkpoint observed it.
    #[error("experiment stopped by request")]
    Stopped,

    /// The correlation engine or its worker process failed.
    #[error("correlation engine failed: {0}")]
    Failed(String),

    /// The persistence backend could not be reached. Transient.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("row '{row}' not found in source '{source_name}'")]
    RowNotFound { row: String, source_name: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl Error {
    /// True for the outcomes the executor maps to a terminal state on purpose,
    /// as opposed to unexpected failures.
    #[must_use]
    pub fn is_expected_outcome(&self) -> bool {
        matches!(
            self,
            Self::NoSamplesInCommon | Self::Stopped | Self::StorageUnavailable(_)
        )
    }
}

impl From<diesel::result::Error> for Error {
    fn from(err: diesel::result::Error) -> Self {
        Error::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
