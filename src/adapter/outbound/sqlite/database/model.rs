//! Database model types for Diesel ORM.

use diesel::prelude::*;

use super::schema::experiments;

/// Database row for an experiment (queryable).
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = experiments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ExperimentRow {
    pub id: i32,
    pub name: String,
    pub kind: String,
    pub source_a: String,
    pub source_b: String,
    pub clinical_source: Option<String>,
    pub cpg_platform: Option<String>,
    pub correlation_method: String,
    pub adjustment_method: String,
    pub min_correlation: f64,
    pub min_std_dev_a: f64,
    pub min_std_dev_b: f64,
    pub all_vs_all: i32,
    pub result_limit: Option<i64>,
    pub state: String,
    pub attempt: i32,
    pub evaluated_row_count: Option<i64>,
    pub result_total_row_count: Option<i64>,
    pub result_final_row_count: Option<i64>,
    pub submitted_at: String,
    pub updated_at: String,
}

/// Database row for an experiment (insertable).
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = experiments)]
pub struct NewExperimentRow {
    pub name: String,
    pub kind: String,
    pub source_a: String,
    pub source_b: String,
    pub clinical_source: Option<String>,
    pub cpg_platform: Option<String>,
    pub correlation_method: String,
    pub adjustment_method: String,
    pub min_correlation: f64,
    pub min_std_dev_a: f64,
    pub min_std_dev_b: f64,
    pub all_vs_all: i32,
    pub result_limit: Option<i64>,
    pub state: String,
    pub attempt: i32,
    pub submitted_at: String,
    pub updated_at: String,
}

/// Mutable columns written back by the executor.
#[derive(AsChangeset, Debug, Clone)]
#[diesel(table_name = experiments)]
#[diesel(treat_none_as_null = true)]
pub struct ExperimentProgress {
    pub state: String,
    pub attempt: i32,
    pub evaluated_row_count: Option<i64>,
    pub result_total_row_count: Option<i64>,
    pub result_final_row_count: Option<i64>,
    pub updated_at: String,
}

/// Result row read back with raw SQL (the table name is configurable).
#[derive(QueryableByName, Debug, Clone)]
pub struct ResultRow {
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub gene: String,
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub gem: String,
    #[diesel(sql_type = diesel::sql_types::Double)]
    pub correlation: f64,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Double>)]
    pub p_value: Option<f64>,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Double>)]
    pub adjusted_p_value: Option<f64>,
}

#[derive(QueryableByName, Debug, Clone, Copy)]
pub struct RowCount {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub count: i64,
}

#[derive(QueryableByName, Debug, Clone, Copy)]
pub struct LastInsertRowId {
    #[diesel(sql_type = diesel::sql_types::Integer)]
    pub id: i32,
}
