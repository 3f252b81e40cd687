use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use diesel::prelude::*;
use omicorr::adapter::outbound::sqlite::database::connection::{
    create_pool, run_migrations, DbPool,
};
use omicorr::adapter::outbound::sqlite::store::SqliteExperimentStore;
use omicorr::adapter::outbound::sqlite::writer::ResultWriter;

/// Temporary SQLite database for integration tests.
pub struct TempDb {
    path: PathBuf,
    pool: DbPool,
}

impl TempDb {
    pub fn create(name: &str) -> Self {
        let mut path = std::env::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        path.push(format!("omicorr-{name}-{nanos}.db"));

        let url = path.display().to_string();
        let pool = create_pool(&url).expect("create sqlite pool");
        run_migrations(&pool).expect("run migrations");

        // Workers and the test thread write concurrently.
        {
            let mut conn = pool.get().expect("get sqlite connection");
            diesel::sql_query("PRAGMA journal_mode=WAL")
                .execute(&mut conn)
                .expect("enable WAL mode");
        }

        Self { path, pool }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn store(&self) -> Arc<SqliteExperimentStore> {
        let writer = ResultWriter::new("experiment_results", 2).expect("result writer");
        Arc::new(SqliteExperimentStore::new(self.pool.clone(), writer))
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
        let _ = std::fs::remove_file(self.path.with_extension("db-wal"));
        let _ = std::fs::remove_file(self.path.with_extension("db-shm"));
    }
}
