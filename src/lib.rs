//! Omicorr - experiment execution engine for pairwise omics correlation.
//!
//! An experiment correlates every molecule of a gene expression dataset
//! against every molecule of a second omics dataset (miRNA, CNA or
//! methylation) over the samples they share. The heavy lifting is done by an
//! external correlation engine; this crate prepares its inputs, supervises it,
//! adjusts p-values and persists the results.
//!
//! # Architecture
//!
//! - [`domain`] - Experiments, their state machine, results and chunks
//! - [`port`] - Traits the application depends on (sources, store)
//! - [`application`] - Sample alignment, staging, engine invocation,
//!   p-value adjustment and the [`JobExecutor`](application::executor::JobExecutor)
//! - [`adapter`] - File and in-memory sources, SQLite store, CLI
//! - [`infrastructure`] - Configuration, logging and wiring
//!
//! # Example
//!
//! ```no_run
//! use omicorr::infrastructure::bootstrap::{build_catalog, build_executor, build_store};
//! use omicorr::infrastructure::config::settings::Config;
//!
//! # async fn run() -> omicorr::error::Result<()> {
//! let config = Config::load("config.toml")?;
//! let store = build_store(&config)?;
//! let catalog = build_catalog(&config)?;
//! let executor = build_executor(&config, store, catalog, tokio::runtime::Handle::current())?;
//! executor.recover_pending()?;
//! executor.wait_idle().await;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;
