//! Ranked aggregates over the trailing reporting window.

use std::cmp::Ordering;

use serde_json::Value;

use crate::connection::Connection;
use crate::error::{Result, WinsunError};
use crate::models::{value_as_f64, Table};
use crate::period::{Granularity, PeriodResolver};
use crate::queries::filter::FilterCriteria;
use crate::queries::gxj::average_price;
use crate::queries::query::{Columns, Query};
use crate::schema::{Field, Schema};

/// Derived measure: sold amount over area, rounded to whole yuan.
pub const AVERAGE_PRICE: &str = "均价";

/// Name of the 1-based rank column.
pub const RANK_COLUMN: &str = "rank";

/// Aggregate `table` over the last `period` periods and rank by the first
/// of `outputs`, descending.
///
/// Requesting [`AVERAGE_PRICE`] pulls in `面积` and `金额` to derive it; they
/// stay in the output only if also requested. Ties keep group order and
/// null values rank last.
pub fn rank(
    conn: &Connection,
    schema: &Schema,
    resolver: &dyn PeriodResolver,
    table: &str,
    period: u32,
    group_by: impl Into<Columns>,
    outputs: impl Into<Columns>,
    criteria: &FilterCriteria,
) -> Result<Table> {
    let dims = group_by.into().0;
    let outputs = outputs.into().0;
    if outputs.is_empty() {
        return Err(WinsunError::InvalidArgument(
            "at least one output measure is required".into(),
        ));
    }

    let window = resolver.resolve(Granularity::from_table_name(table)?, period)?;
    let (low, high) = window.range;

    let area = Field::Area.column_name();
    let amount = Field::Amount.column_name();
    let wants_average = outputs.iter().any(|o| o == AVERAGE_PRICE);

    let mut sums: Vec<String> = outputs
        .iter()
        .filter(|o| o.as_str() != AVERAGE_PRICE)
        .cloned()
        .collect();
    if wants_average {
        for extra in [area, amount] {
            if !sums.iter().any(|s| s == extra) {
                sums.push(extra.to_string());
            }
        }
    }

    let grouped = Query::new(conn, schema, table)?
        .filter(&criteria.clone().date_range(low, high))?
        .group(dims.clone(), sums)?
        .execute()?;

    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(grouped.len());
    for (i, row) in grouped.rows.iter().enumerate() {
        let mut out: Vec<Value> = row[..dims.len()].to_vec();
        for o in &outputs {
            let v = if o == AVERAGE_PRICE {
                average_price(grouped.f64(i, amount), grouped.f64(i, area))
                    .and_then(|p| serde_json::Number::from_f64(p.round()))
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            } else {
                grouped.value(i, o).cloned().unwrap_or(Value::Null)
            };
            out.push(v);
        }
        rows.push(out);
    }

    let key = dims.len();
    rows.sort_by(|a, b| descending_nulls_last(&a[key], &b[key]));

    let mut columns = Vec::with_capacity(1 + dims.len() + outputs.len());
    columns.push(RANK_COLUMN.to_string());
    columns.extend(dims);
    columns.extend(outputs);

    let mut ranked = Table::new(columns);
    for (i, row) in rows.into_iter().enumerate() {
        let mut r = Vec::with_capacity(row.len() + 1);
        r.push(Value::from(i as u64 + 1));
        r.extend(row);
        ranked.rows.push(r);
    }

    Ok(ranked)
}

fn descending_nulls_last(a: &Value, b: &Value) -> Ordering {
    match (value_as_f64(a), value_as_f64(b)) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
