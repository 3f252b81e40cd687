//! SQLite experiment store.
//!
//! Experiments go through the Diesel DSL; result rows use raw SQL because
//! their table name is configurable.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::SqliteConnection;
use tracing::warn;

use super::database::connection::{checkout, DbPool};
use super::database::model::{
    ExperimentProgress, ExperimentRow, LastInsertRowId, NewExperimentRow, ResultRow, RowCount,
};
use super::database::schema::experiments;
use super::writer::ResultWriter;
use crate::domain::experiment::{Experiment, ExperimentSpec, ExperimentState};
use crate::domain::id::{ExperimentId, SourceRef};
use crate::domain::result::CorrelationResult;
use crate::error::{Error, Result};
use crate::port::outbound::store::{CommitMode, ExperimentStore};

/// SQLite-backed [`ExperimentStore`].
pub struct SqliteExperimentStore {
    pool: DbPool,
    writer: ResultWriter,
}

impl SqliteExperimentStore {
    #[must_use]
    pub fn new(pool: DbPool, writer: ResultWriter) -> Self {
        Self { pool, writer }
    }

    /// Create the configured results table when it is not the migrated one.
    ///
    /// # Errors
    /// Fails if the statements cannot be executed.
    pub fn ensure_results_table(&self) -> Result<()> {
        let table = self.writer.table();
        let mut conn = checkout(&self.pool)?;
        diesel::sql_query(format!(
            "CREATE TABLE IF NOT EXISTS {table} (\
             id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, \
             experiment_id INTEGER NOT NULL REFERENCES experiments(id) ON DELETE CASCADE, \
             gene TEXT NOT NULL, \
             gem TEXT NOT NULL, \
             correlation DOUBLE NOT NULL, \
             p_value DOUBLE, \
             adjusted_p_value DOUBLE)"
        ))
        .execute(&mut conn)?;
        diesel::sql_query(format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_experiment ON {table}(experiment_id)"
        ))
        .execute(&mut conn)?;
        Ok(())
    }

    fn to_new_row(spec: &ExperimentSpec, now: &str) -> NewExperimentRow {
        NewExperimentRow {
            name: spec.name.clone(),
            kind: spec.kind.as_str().to_string(),
            source_a: spec.source_a.to_string(),
            source_b: spec.source_b.to_string(),
            clinical_source: spec.clinical_source.as_ref().map(ToString::to_string),
            cpg_platform: spec.cpg_platform.as_ref().map(ToString::to_string),
            correlation_method: spec.correlation_method.as_str().to_string(),
            adjustment_method: spec.adjustment_method.as_str().to_string(),
            min_correlation: spec.min_correlation,
            min_std_dev_a: spec.min_std_dev_a,
            min_std_dev_b: spec.min_std_dev_b,
            all_vs_all: i32::from(spec.all_vs_all),
            result_limit: spec.result_limit.map(|n| n as i64),
            state: ExperimentState::WaitingForQueue.as_str().to_string(),
            attempt: 0,
            submitted_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }

    fn progress(experiment: &Experiment) -> ExperimentProgress {
        ExperimentProgress {
            state: experiment.state.as_str().to_string(),
            attempt: experiment.attempt as i32,
            evaluated_row_count: experiment.evaluated_row_count.map(|n| n as i64),
            result_total_row_count: experiment.result_total_row_count.map(|n| n as i64),
            result_final_row_count: experiment.result_final_row_count.map(|n| n as i64),
            updated_at: experiment.updated_at.to_rfc3339(),
        }
    }

    fn from_row(row: ExperimentRow) -> Result<Experiment> {
        let spec = ExperimentSpec {
            name: row.name,
            kind: row.kind.parse()?,
            source_a: SourceRef::from(row.source_a),
            source_b: SourceRef::from(row.source_b),
            clinical_source: row.clinical_source.map(SourceRef::from),
            cpg_platform: row.cpg_platform.map(SourceRef::from),
            correlation_method: row.correlation_method.parse()?,
            adjustment_method: row.adjustment_method.parse()?,
            min_correlation: row.min_correlation,
            min_std_dev_a: row.min_std_dev_a,
            min_std_dev_b: row.min_std_dev_b,
            all_vs_all: row.all_vs_all != 0,
            result_limit: row.result_limit.and_then(|n| usize::try_from(n).ok()),
        };

        Ok(Experiment {
            id: ExperimentId::new(row.id),
            spec,
            state: row.state.parse()?,
            attempt: u32::try_from(row.attempt).unwrap_or(0),
            evaluated_row_count: row.evaluated_row_count.and_then(|n| u64::try_from(n).ok()),
            result_total_row_count: row.result_total_row_count.and_then(|n| u64::try_from(n).ok()),
            result_final_row_count: row.result_final_row_count.and_then(|n| u64::try_from(n).ok()),
            submitted_at: parse_timestamp(&row.submitted_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }

    fn write_experiment(conn: &mut SqliteConnection, experiment: &Experiment) -> Result<()> {
        let updated = diesel::update(experiments::table.find(experiment.id.get()))
            .set(Self::progress(experiment))
            .execute(conn)?;
        if updated == 0 {
            return Err(Error::Database(format!(
                "experiment {} does not exist",
                experiment.id
            )));
        }
        Ok(())
    }

    fn delete_results_with(&self, conn: &mut SqliteConnection, id: ExperimentId) -> Result<usize> {
        let sql = format!(
            "DELETE FROM {} WHERE experiment_id = {}",
            self.writer.table(),
            id.get()
        );
        Ok(diesel::sql_query(sql).execute(conn)?)
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .map_err(|e| Error::Parse(e.to_string()))?
        .with_timezone(&Utc))
}

impl ExperimentStore for SqliteExperimentStore {
    fn insert(&self, spec: &ExperimentSpec) -> Result<Experiment> {
        spec.validate()?;
        let now = Utc::now().to_rfc3339();
        let row = Self::to_new_row(spec, &now);
        let mut conn = checkout(&self.pool)?;

        let id = conn.transaction(|conn| {
            diesel::insert_into(experiments::table)
                .values(&row)
                .execute(conn)?;
            diesel::sql_query("SELECT last_insert_rowid() AS id")
                .get_result::<LastInsertRowId>(conn)
                .map(|row| row.id)
        })?;

        self.get(ExperimentId::new(id))?
            .ok_or_else(|| Error::Database(format!("experiment {id} vanished after insert")))
    }

    fn get(&self, id: ExperimentId) -> Result<Option<Experiment>> {
        let mut conn = checkout(&self.pool)?;
        let row: Option<ExperimentRow> = experiments::table
            .find(id.get())
            .select(ExperimentRow::as_select())
            .first(&mut conn)
            .optional()?;
        row.map(Self::from_row).transpose()
    }

    fn save(&self, experiment: &Experiment) -> Result<()> {
        let mut conn = checkout(&self.pool)?;
        Self::write_experiment(&mut conn, experiment)
    }

    fn transition_state(
        &self,
        id: ExperimentId,
        from: &[ExperimentState],
        next: ExperimentState,
    ) -> Result<bool> {
        let from: Vec<&str> = from.iter().map(|s| s.as_str()).collect();
        let mut conn = checkout(&self.pool)?;
        let updated = diesel::update(
            experiments::table
                .filter(experiments::id.eq(id.get()))
                .filter(experiments::state.eq_any(from)),
        )
        .set((
            experiments::state.eq(next.as_str()),
            experiments::updated_at.eq(Utc::now().to_rfc3339()),
        ))
        .execute(&mut conn)?;
        Ok(updated > 0)
    }

    fn claim(&self, id: ExperimentId) -> Result<Option<Experiment>> {
        let claimable = [
            ExperimentState::WaitingForQueue.as_str(),
            ExperimentState::InProcess.as_str(),
        ];
        let mut conn = checkout(&self.pool)?;
        let row = conn.transaction::<_, Error, _>(|conn| {
            let updated = diesel::update(
                experiments::table
                    .filter(experiments::id.eq(id.get()))
                    .filter(experiments::state.eq_any(claimable)),
            )
            .set((
                experiments::state.eq(ExperimentState::InProcess.as_str()),
                experiments::attempt.eq(experiments::attempt + 1),
                experiments::updated_at.eq(Utc::now().to_rfc3339()),
            ))
            .execute(conn)?;
            if updated == 0 {
                return Ok(None);
            }
            Ok(experiments::table
                .find(id.get())
                .select(ExperimentRow::as_select())
                .first(conn)
                .optional()?)
        })?;
        row.map(Self::from_row).transpose()
    }

    fn with_state(&self, states: &[ExperimentState]) -> Result<Vec<Experiment>> {
        let states: Vec<&str> = states.iter().map(|s| s.as_str()).collect();
        let mut conn = checkout(&self.pool)?;
        let rows: Vec<ExperimentRow> = experiments::table
            .filter(experiments::state.eq_any(states))
            .order(experiments::id.asc())
            .select(ExperimentRow::as_select())
            .load(&mut conn)?;
        rows.into_iter().map(Self::from_row).collect()
    }

    fn list(&self) -> Result<Vec<Experiment>> {
        let mut conn = checkout(&self.pool)?;
        let rows: Vec<ExperimentRow> = experiments::table
            .order(experiments::id.desc())
            .select(ExperimentRow::as_select())
            .load(&mut conn)?;
        rows.into_iter().map(Self::from_row).collect()
    }

    fn result_count(&self, id: ExperimentId) -> Result<u64> {
        let mut conn = checkout(&self.pool)?;
        let sql = format!(
            "SELECT COUNT(*) AS count FROM {} WHERE experiment_id = {}",
            self.writer.table(),
            id.get()
        );
        let count = diesel::sql_query(sql).get_result::<RowCount>(&mut conn)?.count;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn results(&self, id: ExperimentId) -> Result<Vec<CorrelationResult>> {
        let mut conn = checkout(&self.pool)?;
        let sql = format!(
            "SELECT gene, gem, correlation, p_value, adjusted_p_value FROM {} \
             WHERE experiment_id = {} ORDER BY ABS(correlation) DESC, id ASC",
            self.writer.table(),
            id.get()
        );
        let rows: Vec<ResultRow> = diesel::sql_query(sql).load(&mut conn)?;
        Ok(rows
            .into_iter()
            .map(|row| CorrelationResult {
                gene: row.gene,
                gem: row.gem,
                correlation: row.correlation,
                p_value: row.p_value.unwrap_or(f64::NAN),
                adjusted_p_value: row.adjusted_p_value.unwrap_or(f64::NAN),
            })
            .collect())
    }

    fn delete_results(&self, id: ExperimentId) -> Result<usize> {
        let mut conn = checkout(&self.pool)?;
        self.delete_results_with(&mut conn, id)
    }

    fn commit_results(
        &self,
        experiment: &Experiment,
        results: &[CorrelationResult],
        mode: CommitMode,
    ) -> Result<()> {
        let mut conn = checkout(&self.pool)?;
        match mode {
            CommitMode::Transactional => conn.transaction::<_, Error, _>(|conn| {
                self.writer.persist(conn, experiment.id, results)?;
                Self::write_experiment(conn, experiment)
            }),
            CommitMode::CompensatingDelete => {
                let written = self
                    .writer
                    .persist(&mut conn, experiment.id, results)
                    .and_then(|_| Self::write_experiment(&mut conn, experiment));
                if let Err(e) = written {
                    if let Err(cleanup) = self.delete_results_with(&mut conn, experiment.id) {
                        warn!(
                            experiment_id = %experiment.id,
                            error = %cleanup,
                            "Failed to delete partial results"
                        );
                    }
                    return Err(e);
                }
                Ok(())
            }
        }
    }
}
