use duckdb::types::{TimeUnit, ValueRef};
use r2d2::Pool;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::db::pool::DuckDbConnectionManager;
use crate::error::AskError;

/// Column names paired with fully materialized rows. Numbers and booleans keep
/// their type; everything else (timestamps, text, decimals) travels as its
/// string representation; NULL maps to JSON null.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Runs a single statement against the FX bar store.
///
/// A connection is checked out per call and returned when the call ends; the
/// full result set is read eagerly, no streaming or pagination. Driver errors
/// are wrapped with the underlying message and nothing more.
#[derive(Clone)]
pub struct SqlExecutor {
    pool: Pool<DuckDbConnectionManager>,
}

impl SqlExecutor {
    pub fn new(pool: Pool<DuckDbConnectionManager>) -> Self {
        Self { pool }
    }

    pub async fn execute(&self, sql: &str) -> Result<QueryResult, AskError> {
        debug!("Executing SQL: {}", sql);
        let pool = self.pool.clone();
        let sql = sql.to_string();

        // DuckDB calls are blocking, so keep them off the async runtime.
        tokio::task::spawn_blocking(move || -> Result<QueryResult, AskError> {
            let conn = pool.get().map_err(|e| AskError::Database(e.to_string()))?;

            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| AskError::Database(e.to_string()))?;

            let column_count = stmt.column_count();
            let mut columns = Vec::with_capacity(column_count);
            for i in 0..column_count {
                match stmt.column_name(i) {
                    Ok(name) => columns.push(name.to_string()),
                    Err(e) => return Err(AskError::Database(e.to_string())),
                }
            }

            let mut rows_out = Vec::new();
            let mut rows = stmt
                .query([])
                .map_err(|e| AskError::Database(e.to_string()))?;
            while let Some(row) = rows.next().map_err(|e| AskError::Database(e.to_string()))? {
                let mut out = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    out.push(cell_to_json(row, i));
                }
                rows_out.push(out);
            }

            Ok(QueryResult {
                columns,
                rows: rows_out,
            })
        })
        .await
        .map_err(|e| AskError::Database(format!("executor task failed: {e}")))?
    }
}

fn cell_to_json(row: &duckdb::Row<'_>, idx: usize) -> Value {
    match row.get_ref(idx) {
        Ok(ValueRef::Null) => Value::Null,
        Ok(ValueRef::Boolean(v)) => Value::from(v),
        Ok(ValueRef::TinyInt(v)) => Value::from(v),
        Ok(ValueRef::SmallInt(v)) => Value::from(v),
        Ok(ValueRef::Int(v)) => Value::from(v),
        Ok(ValueRef::BigInt(v)) => Value::from(v),
        Ok(ValueRef::UTinyInt(v)) => Value::from(v),
        Ok(ValueRef::USmallInt(v)) => Value::from(v),
        Ok(ValueRef::UInt(v)) => Value::from(v),
        Ok(ValueRef::UBigInt(v)) => Value::from(v),
        Ok(ValueRef::HugeInt(v)) => Value::from(v.to_string()),
        Ok(ValueRef::Float(v)) => Value::from(v),
        Ok(ValueRef::Double(v)) => Value::from(v),
        Ok(ValueRef::Text(v)) => Value::from(String::from_utf8_lossy(v).into_owned()),
        Ok(ValueRef::Timestamp(unit, v)) => {
            let micros = match unit {
                TimeUnit::Second => v.saturating_mul(1_000_000),
                TimeUnit::Millisecond => v.saturating_mul(1_000),
                TimeUnit::Microsecond => v,
                TimeUnit::Nanosecond => v / 1_000,
            };
            match chrono::DateTime::from_timestamp_micros(micros) {
                Some(dt) => Value::from(dt.naive_utc().to_string()),
                None => Value::Null,
            }
        }
        Ok(ValueRef::Date32(days)) => {
            match chrono::DateTime::from_timestamp(i64::from(days) * 86_400, 0) {
                Some(dt) => Value::from(dt.date_naive().to_string()),
                None => Value::Null,
            }
        }
        // Decimals, intervals and the rest go out as their string form.
        Ok(_) | Err(_) => match row.get::<_, String>(idx) {
            Ok(v) => Value::from(v),
            Err(_) => Value::Null,
        },
    }
}
