//! DuckDB connection wrapper with query execution and transactional inserts.
//!
//! Every component receives a `&Connection` explicitly; there is no shared
//! process-wide session.

use crate::config;
use crate::error::{Result, WinsunError};
use crate::models::Table;
use chrono::{Duration, NaiveDate};
use duckdb::{types::ValueRef, Connection as DuckDbConnection};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;

/// Wraps a DuckDB connection holding the market tables.
pub struct Connection {
    conn: DuckDbConnection,
}

impl Connection {
    /// Open (or create) a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = DuckDbConnection::open(path.as_ref())?;
        log::info!("Opened market database {}", path.as_ref().display());
        Ok(Self { conn })
    }

    /// Open an in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = DuckDbConnection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Execute SQL and return results as a `Vec` of `HashMap`s.
    ///
    /// Each row is represented as a `HashMap<String, serde_json::Value>`.
    pub fn execute(
        &self,
        sql: &str,
        params: &[String],
    ) -> Result<Vec<HashMap<String, serde_json::Value>>> {
        let table = self.execute_table(sql, params)?;
        Ok(table.into_records())
    }

    /// Execute SQL and return an ordered [`Table`].
    ///
    /// Column order follows the SELECT list. The whole result is materialized
    /// before returning.
    pub fn execute_table(&self, sql: &str, params: &[String]) -> Result<Table> {
        log::debug!("SQL: {} -- params {:?}", sql.replace('\n', " "), params);
        let mut stmt = self.conn.prepare(sql)?;

        let param_values: Vec<&dyn duckdb::ToSql> = params
            .iter()
            .map(|p| p as &dyn duckdb::ToSql)
            .collect();

        let mut rows_result = stmt.query(param_values.as_slice())?;

        // Column metadata is only available once the statement has run
        let column_names: Vec<String> = rows_result
            .as_ref()
            .ok_or_else(|| WinsunError::NotFound("statement metadata".into()))?
            .column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        let column_count = column_names.len();

        let mut table = Table::new(column_names);

        while let Some(row) = rows_result.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(convert_value_ref(row.get_ref(i)?));
            }
            table.rows.push(values);
        }

        Ok(table)
    }

    /// Execute SQL and deserialize each row into type `T`.
    pub fn execute_into<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[String],
    ) -> Result<Vec<T>> {
        let rows = self.execute(sql, params)?;
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let value = serde_json::Value::Object(
                row.into_iter().collect::<serde_json::Map<String, serde_json::Value>>(),
            );
            let item: T = serde_json::from_value(value)?;
            results.push(item);
        }
        Ok(results)
    }

    /// Execute SQL and return the first column of the first row.
    ///
    /// Returns `None` if the result set is empty.
    pub fn execute_scalar(
        &self,
        sql: &str,
        params: &[String],
    ) -> Result<Option<serde_json::Value>> {
        let table = self.execute_table(sql, params)?;
        Ok(table.rows.into_iter().next().and_then(|r| r.into_iter().next()))
    }

    /// Run one or more statements without parameters (DDL, fixtures).
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Create a DuckDB table from a newline-delimited JSON file.
    ///
    /// Replaces any existing table with the same name.
    pub fn register_table_from_ndjson(&self, table_name: &str, ndjson_path: &str) -> Result<()> {
        let path_fwd = ndjson_path.replace('\\', "/");
        self.conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS \"{0}\"; \
             CREATE TABLE \"{0}\" AS SELECT * FROM read_json_auto('{1}', format='newline_delimited')",
            table_name, path_fwd
        ))?;
        log::info!("Loaded table {} from {}", table_name, path_fwd);
        Ok(())
    }

    /// Insert rows into `table` inside a single transaction.
    ///
    /// Either every row is committed or none is: the first failure rolls the
    /// whole batch back and is returned to the caller.
    pub fn insert_batch(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<duckdb::types::Value>],
    ) -> Result<usize> {
        if columns.is_empty() || rows.is_empty() {
            return Ok(0);
        }

        let cols_sql = columns
            .iter()
            .map(|c| format!("\"{}\"", c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            table, cols_sql, placeholders
        );

        self.conn.execute_batch("BEGIN TRANSACTION")?;

        let result = (|| -> Result<usize> {
            let mut stmt = self.conn.prepare(&sql)?;
            for row in rows {
                if row.len() != columns.len() {
                    return Err(WinsunError::InvalidArgument(format!(
                        "row has {} values, expected {}",
                        row.len(),
                        columns.len()
                    )));
                }
                stmt.execute(duckdb::params_from_iter(row.iter()))?;
            }
            Ok(rows.len())
        })()
        .and_then(|n| {
            self.conn.execute_batch("COMMIT")?;
            Ok(n)
        });

        if result.is_err() {
            let _ = self.conn.execute_batch("ROLLBACK");
            log::warn!("Insert into {} rolled back", table);
        }

        result
    }
}

/// Convert a DuckDB `ValueRef` to a `serde_json::Value`.
///
/// Text cells holding the legacy zone name are rewritten to its current name.
fn convert_value_ref(val: ValueRef<'_>) -> serde_json::Value {
    match val {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Boolean(b) => serde_json::Value::Bool(b),
        ValueRef::TinyInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::SmallInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::Int(n) => serde_json::Value::Number(n.into()),
        ValueRef::BigInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::UTinyInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::USmallInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::UInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::UBigInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::HugeInt(n) => {
            // SUM over integer columns yields HUGEINT
            if let Ok(i) = i64::try_from(n) {
                serde_json::Value::Number(i.into())
            } else {
                serde_json::Number::from_f64(n as f64)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            }
        }
        ValueRef::Float(f) => serde_json::Number::from_f64(f as f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Double(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Decimal(d) => d
            .to_string()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Date32(days) => epoch_date(days)
            .map(|d| serde_json::Value::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(bytes) => {
            let s = String::from_utf8_lossy(bytes);
            serde_json::Value::String(config::normalize_zone(&s).to_string())
        }
        _ => serde_json::Value::Null,
    }
}

fn epoch_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(Duration::days(days as i64))
}
