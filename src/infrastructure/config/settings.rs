//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings. The
//! configuration is a TOML file; `OMICORR_DATABASE` overrides the database
//! path.
//!
//! # Example
//!
//! ```no_run
//! use omicorr::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use super::logging::LoggingConfig;
use super::sources::SourcesConfig;
use crate::adapter::outbound::sqlite::writer::is_identifier;
use crate::application::correlation::EngineConfig;
use crate::application::executor::ExecutorConfig;
use crate::error::{ConfigError, Result};

/// Environment variable overriding [`Config::database`].
pub const DATABASE_ENV: &str = "OMICORR_DATABASE";

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Worker pool, retries and result persistence.
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// External correlation engine.
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub sources: SourcesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            logging: LoggingConfig::default(),
            executor: ExecutorConfig::default(),
            engine: EngineConfig::default(),
            sources: SourcesConfig::default(),
        }
    }
}

fn default_database_path() -> String {
    "omicorr.db".to_string()
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    /// Returns an error if the content is malformed or validation fails.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        if let Ok(database) = std::env::var(DATABASE_ENV) {
            if !database.trim().is_empty() {
                config.database = database;
            }
        }
        if config.database.is_empty() {
            config.database = default_database_path();
        }
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is malformed, or fails
    /// validation.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Initialize logging from the `[logging]` section.
    pub fn init_logging(&self) {
        self.logging.init();
    }

    fn validate(&self) -> Result<()> {
        let executor = &self.executor;
        if executor.max_workers == 0 {
            return Err(invalid("max_workers", "must be greater than 0"));
        }
        let cpus = num_cpus::get();
        if executor.max_workers > cpus {
            warn!(
                max_workers = executor.max_workers,
                cpus, "More workers than CPUs; engine processes will compete"
            );
        }
        if executor.max_attempts == 0 {
            return Err(invalid("max_attempts", "must be greater than 0"));
        }
        if executor.result_chunk_size == 0 {
            return Err(invalid("result_chunk_size", "must be greater than 0"));
        }
        if executor.adjustment_batch_size == 0 {
            return Err(invalid("adjustment_batch_size", "must be greater than 0"));
        }
        if !is_identifier(&executor.results_table) {
            return Err(invalid("results_table", "must be a plain SQL identifier"));
        }

        if self.engine.program.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "program" }.into());
        }
        if self.engine.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms", "must be greater than 0"));
        }
        if self.engine.sort_buffer_size == 0 {
            return Err(invalid("sort_buffer_size", "must be greater than 0"));
        }

        if self.sources.chunk_size == 0 {
            return Err(invalid("chunk_size", "must be greater than 0"));
        }
        if self.sources.delimiter_byte().is_none() {
            return Err(invalid("delimiter", "must be a single byte or \"tab\""));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> crate::error::Error {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
    .into()
}
