use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Table: materialized query result with ordered columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at `row` in the named column.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Numeric cell; `None` for null or non-numeric values.
    pub fn f64(&self, row: usize, column: &str) -> Option<f64> {
        self.value(row, column).and_then(value_as_f64)
    }

    /// Sum of a numeric column, skipping nulls.
    pub fn sum(&self, column: &str) -> f64 {
        (0..self.len()).filter_map(|i| self.f64(i, column)).sum()
    }

    pub fn into_records(self) -> Vec<HashMap<String, Value>> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| columns.iter().cloned().zip(row).collect())
            .collect()
    }
}

/// Numeric view of a JSON cell.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Canonical string form of a dimension value, used to match query output
/// against expected keys (`201805`, `2018-05-01`, zone names).
pub fn dimension_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
