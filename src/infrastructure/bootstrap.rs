//! Infrastructure bootstrap helpers for runtime wiring.

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::info;

use crate::adapter::outbound::source::catalog::FileSourceCatalog;
use crate::adapter::outbound::sqlite::database::connection::{create_pool, run_migrations};
use crate::adapter::outbound::sqlite::store::SqliteExperimentStore;
use crate::adapter::outbound::sqlite::writer::ResultWriter;
use crate::application::executor::JobExecutor;
use crate::error::{ConfigError, Result};
use crate::infrastructure::config::settings::Config;
use crate::port::outbound::source::SourceCatalog;
use crate::port::outbound::store::ExperimentStore;

/// Open the database, apply migrations and build the experiment store.
///
/// # Errors
/// Fails if the database cannot be opened or migrated.
pub fn build_store(config: &Config) -> Result<Arc<dyn ExperimentStore>> {
    let pool = create_pool(&config.database)?;
    run_migrations(&pool)?;
    let writer = ResultWriter::new(
        config.executor.results_table.clone(),
        config.executor.result_chunk_size,
    )?;
    let store = SqliteExperimentStore::new(pool, writer);
    store.ensure_results_table()?;
    info!(database = %config.database, "Experiment store ready");
    Ok(Arc::new(store))
}

/// Build the file-backed source catalog.
///
/// # Errors
/// Fails on an unusable delimiter.
pub fn build_catalog(config: &Config) -> Result<Arc<dyn SourceCatalog>> {
    let delimiter = config
        .sources
        .delimiter_byte()
        .ok_or_else(|| ConfigError::InvalidValue {
            field: "delimiter",
            reason: format!("unsupported delimiter '{}'", config.sources.delimiter),
        })?;
    let mut catalog = FileSourceCatalog::new(delimiter, config.sources.chunk_size);
    if let Some(root) = &config.sources.root {
        catalog = catalog.with_root(root);
    }
    Ok(Arc::new(catalog))
}

/// Wire the executor on `runtime`.
///
/// # Errors
/// Fails if the staging directory cannot be created.
pub fn build_executor(
    config: &Config,
    store: Arc<dyn ExperimentStore>,
    catalog: Arc<dyn SourceCatalog>,
    runtime: Handle,
) -> Result<JobExecutor> {
    let staging_dir = config.executor.staging_dir();
    std::fs::create_dir_all(&staging_dir)?;
    info!(
        max_workers = config.executor.max_workers,
        staging_dir = %staging_dir.display(),
        engine = %config.engine.program,
        "Executor ready"
    );
    Ok(JobExecutor::new(
        config.executor.clone(),
        config.engine.clone(),
        store,
        catalog,
        runtime,
    ))
}
