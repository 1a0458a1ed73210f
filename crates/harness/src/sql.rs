//! PostgreSQL implementation of the [`SqlBackend`] trait.
//!
//! [`PgBackend`] wraps an `sqlx` connection pool. The pool is created
//! lazily so construction never blocks; reachability is established by the
//! startup probe loop in the connection harness, not here.
//!
//! Table and column names are interpolated into SQL text (the row shape is
//! dynamic, so bind parameters cannot carry them). Every identifier passes
//! [`validate_identifier`] first and cell values go through
//! [`encode_literal`], which quotes strings and renders containers as
//! `jsonb`.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgColumn, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row as _, TypeInfo};
use tracing::debug;

use tsunagi_core::backend::SqlBackend;
use tsunagi_core::config::SqlConfig;
use tsunagi_core::error::ConnectionError;
use tsunagi_core::types::Row;

use crate::error::HarnessError;

/// PostgreSQL limit for identifier length in bytes.
const MAX_IDENTIFIER_LEN: usize = 63;

/// SQL backend over a PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    /// Build a backend from `[sql]` configuration.
    ///
    /// The pool connects on first use, so this succeeds even while the
    /// database is still starting up.
    pub fn new(config: &SqlConfig) -> Result<Self, HarnessError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_lazy(&config.connection_url())?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl SqlBackend for PgBackend {
    async fn probe(&self) -> Result<(), ConnectionError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(sql_error)?;
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool, ConnectionError> {
        let row = sqlx::query(
            "SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await
        .map_err(sql_error)?;
        row.try_get::<bool, _>(0).map_err(sql_error)
    }

    async fn fetch_rows(&self, table: &str) -> Result<Vec<Row>, ConnectionError> {
        validate_identifier(table)?;
        let rows = sqlx::query(&format!("SELECT * FROM \"{table}\""))
            .fetch_all(&self.pool)
            .await
            .map_err(sql_error)?;
        Ok(rows.iter().map(decode_row).collect())
    }

    async fn count_rows(&self, table: &str) -> Result<u64, ConnectionError> {
        validate_identifier(table)?;
        let row = sqlx::query(&format!("SELECT count(*) FROM \"{table}\""))
            .fetch_one(&self.pool)
            .await
            .map_err(sql_error)?;
        let count: i64 = row.try_get(0).map_err(sql_error)?;
        Ok(count as u64)
    }

    async fn sample_rows(&self, table: &str, limit: u32) -> Result<Vec<Row>, ConnectionError> {
        validate_identifier(table)?;
        let rows = sqlx::query(&format!(
            "SELECT * FROM \"{table}\" ORDER BY 1 LIMIT {limit}"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(sql_error)?;
        Ok(rows.iter().map(decode_row).collect())
    }

    async fn clear_table(&self, table: &str) -> Result<(), ConnectionError> {
        validate_identifier(table)?;
        sqlx::query(&format!("DELETE FROM \"{table}\""))
            .execute(&self.pool)
            .await
            .map_err(sql_error)?;
        Ok(())
    }

    async fn insert_rows(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Row],
    ) -> Result<u64, ConnectionError> {
        if rows.is_empty() {
            return Ok(0);
        }
        validate_identifier(table)?;
        if columns.is_empty() {
            return Err(ConnectionError::Query {
                reason: "insert requires at least one column".to_owned(),
            });
        }
        for column in columns {
            validate_identifier(column)?;
        }

        let column_list = columns
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let tuples = rows
            .iter()
            .map(|row| {
                let values = columns
                    .iter()
                    .map(|c| encode_literal(row.get(c).unwrap_or(&Value::Null)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({values})")
            })
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!("INSERT INTO \"{table}\" ({column_list}) VALUES {tuples}");
        let result = sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(sql_error)?;
        Ok(result.rows_affected())
    }

    async fn execute(&self, sql: &str) -> Result<u64, ConnectionError> {
        let result = sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map_err(sql_error)?;
        Ok(result.rows_affected())
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>, ConnectionError> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(sql_error)?;
        Ok(rows.iter().map(decode_row).collect())
    }
}

fn sql_error(err: sqlx::Error) -> ConnectionError {
    ConnectionError::Query {
        reason: err.to_string(),
    }
}

/// Check that a name is usable as a quoted SQL identifier.
///
/// Accepts ASCII letters, digits, and underscores; the first character must
/// not be a digit.
pub fn validate_identifier(name: &str) -> Result<(), ConnectionError> {
    if name.is_empty() || name.len() > MAX_IDENTIFIER_LEN {
        return Err(ConnectionError::Query {
            reason: format!(
                "invalid identifier: length {} (must be 1-{MAX_IDENTIFIER_LEN})",
                name.len()
            ),
        });
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ConnectionError::Query {
            reason: format!("invalid identifier '{name}': contains disallowed characters"),
        });
    }
    if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return Err(ConnectionError::Query {
            reason: format!("invalid identifier '{name}': must not start with a digit"),
        });
    }
    Ok(())
}

/// Render a JSON cell value as a SQL literal.
///
/// Strings are single-quoted with `''` escaping; arrays and objects become
/// `jsonb` casts so JSON columns round-trip.
pub fn encode_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_owned(),
        Value::Bool(true) => "TRUE".to_owned(),
        Value::Bool(false) => "FALSE".to_owned(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote_string(s),
        other => format!("{}::jsonb", quote_string(&other.to_string())),
    }
}

fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn decode_row(pg_row: &PgRow) -> Row {
    let mut row = Row::new();
    for column in pg_row.columns() {
        row.insert(column.name().to_owned(), decode_cell(pg_row, column));
    }
    row
}

/// Map one Postgres column to a JSON value by type name.
///
/// Timestamps, dates, and UUIDs become strings; unsupported types (NUMERIC
/// among them) become NULL with a debug log rather than failing the row.
fn decode_cell(pg_row: &PgRow, column: &PgColumn) -> Value {
    let idx = column.ordinal();
    let decoded: Result<Value, sqlx::Error> = match column.type_info().name() {
        "BOOL" => pg_row.try_get::<Option<bool>, _>(idx).map(opt_value),
        "INT2" => pg_row
            .try_get::<Option<i16>, _>(idx)
            .map(|v| opt_value(v.map(i64::from))),
        "INT4" => pg_row
            .try_get::<Option<i32>, _>(idx)
            .map(|v| opt_value(v.map(i64::from))),
        "INT8" => pg_row.try_get::<Option<i64>, _>(idx).map(opt_value),
        "FLOAT4" => pg_row
            .try_get::<Option<f32>, _>(idx)
            .map(|v| float_value(v.map(f64::from))),
        "FLOAT8" => pg_row.try_get::<Option<f64>, _>(idx).map(float_value),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
            pg_row.try_get::<Option<String>, _>(idx).map(opt_value)
        }
        "TIMESTAMPTZ" => pg_row
            .try_get::<Option<DateTime<Utc>>, _>(idx)
            .map(|v| opt_value(v.map(|t| t.to_rfc3339()))),
        "TIMESTAMP" => pg_row
            .try_get::<Option<NaiveDateTime>, _>(idx)
            .map(|v| opt_value(v.map(|t| t.to_string()))),
        "DATE" => pg_row
            .try_get::<Option<NaiveDate>, _>(idx)
            .map(|v| opt_value(v.map(|d| d.to_string()))),
        "UUID" => pg_row
            .try_get::<Option<uuid::Uuid>, _>(idx)
            .map(|v| opt_value(v.map(|u| u.to_string()))),
        "JSON" | "JSONB" => pg_row
            .try_get::<Option<Value>, _>(idx)
            .map(|v| v.unwrap_or(Value::Null)),
        other => {
            debug!(
                column = column.name(),
                pg_type = other,
                "unsupported column type, storing NULL"
            );
            Ok(Value::Null)
        }
    };
    match decoded {
        Ok(value) => value,
        Err(err) => {
            debug!(
                column = column.name(),
                error = %err,
                "failed to decode column, storing NULL"
            );
            Value::Null
        }
    }
}

fn opt_value<T: Into<Value>>(v: Option<T>) -> Value {
    v.map(Into::into).unwrap_or(Value::Null)
}

fn float_value(v: Option<f64>) -> Value {
    v.and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
