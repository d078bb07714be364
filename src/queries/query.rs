//! Immutable query plans over one market table.
//!
//! Each step (`filter`, `group`) returns a new plan; nothing runs until
//! [`Query::execute`], [`Query::cut`] or [`Query::cross`] materializes it.

use std::collections::BTreeSet;

use crate::config::LEGACY_ZONE;
use crate::connection::Connection;
use crate::error::{Result, WinsunError};
use crate::models::{dimension_key, value_as_f64, CrossTab, Table};
use crate::queries::filter::FilterCriteria;
use crate::queries::range::{BucketKind, RangeClassifier};
use crate::schema::{quote_ident, Field, Schema, TableSchema};
use crate::sql_builder::SqlBuilder;

/// Column label used by [`Query::cut`] when no column dimension is given.
pub const TOTAL_COLUMN: &str = "total";

// ---------------------------------------------------------------------------
// Columns: one name or many
// ---------------------------------------------------------------------------

/// Column names for grouping and measures; a single name is a one-element list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns(pub Vec<String>);

impl Columns {
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|s| s.as_str()).collect()
    }
}

impl From<&str> for Columns {
    fn from(v: &str) -> Self {
        Columns(vec![v.to_string()])
    }
}

impl From<String> for Columns {
    fn from(v: String) -> Self {
        Columns(vec![v])
    }
}

impl From<&[&str]> for Columns {
    fn from(vs: &[&str]) -> Self {
        Columns(vs.iter().map(|v| v.to_string()).collect())
    }
}

impl From<Vec<&str>> for Columns {
    fn from(vs: Vec<&str>) -> Self {
        Columns(vs.into_iter().map(String::from).collect())
    }
}

impl From<Vec<String>> for Columns {
    fn from(vs: Vec<String>) -> Self {
        Columns(vs)
    }
}

impl<const N: usize> From<[&str; N]> for Columns {
    fn from(vs: [&str; N]) -> Self {
        Columns(vs.iter().map(|v| v.to_string()).collect())
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Grouping {
    dims: Vec<String>,
    measures: Vec<String>,
}

/// A deferred query over one table of the market database.
#[derive(Clone)]
pub struct Query<'a> {
    conn: &'a Connection,
    schema: &'a Schema,
    table: &'a TableSchema,
    builder: SqlBuilder,
    grouping: Option<Grouping>,
}

impl<'a> Query<'a> {
    /// Start a plan selecting every row of `table`.
    pub fn new(conn: &'a Connection, schema: &'a Schema, table: &str) -> Result<Self> {
        let table = schema.table(table)?;
        Ok(Self {
            conn,
            schema,
            table,
            builder: SqlBuilder::new(&table.name),
            grouping: None,
        })
    }

    pub fn table(&self) -> &TableSchema {
        self.table
    }

    /// Restrict rows by `criteria`.
    pub fn filter(&self, criteria: &FilterCriteria) -> Result<Self> {
        let mut next = self.clone();
        criteria.apply(self.table, &mut next.builder)?;
        Ok(next)
    }

    /// Group by `by` and sum each of `outputs`.
    ///
    /// The result has one row per distinct combination of dimension values
    /// present in the filtered rows, dimension columns first. Groups without
    /// rows are absent, not zero. Plate values stored under the legacy zone
    /// name fold into the current one before grouping.
    pub fn group(&self, by: impl Into<Columns>, outputs: impl Into<Columns>) -> Result<Self> {
        if self.grouping.is_some() {
            return Err(WinsunError::InvalidArgument(format!(
                "query on '{}' is already grouped",
                self.table.name
            )));
        }

        let dims = by.into().0;
        let measures = outputs.into().0;
        if dims.is_empty() {
            return Err(WinsunError::InvalidArgument(
                "at least one grouping column is required".into(),
            ));
        }

        let mut select = Vec::with_capacity(dims.len() + measures.len());
        let mut group_cols = Vec::with_capacity(dims.len());
        for d in &dims {
            let col = dimension_expr(d, self.table.column(d)?.quoted());
            select.push(format!("{} AS {}", col, quote_ident(d)));
            group_cols.push(col);
        }
        for m in &measures {
            let col = self.table.column(m)?.quoted();
            select.push(format!("SUM({}) AS {}", col, quote_ident(m)));
        }

        let select: Vec<&str> = select.iter().map(|s| s.as_str()).collect();
        let group_cols: Vec<&str> = group_cols.iter().map(|s| s.as_str()).collect();

        let mut next = self.clone();
        next.builder
            .select(&select)
            .group_by(&group_cols)
            .order_by(&group_cols);
        next.grouping = Some(Grouping { dims, measures });
        Ok(next)
    }

    /// SQL text and parameters of the plan.
    pub fn sql(&self) -> (String, Vec<String>) {
        self.builder.build()
    }

    /// Run the plan and materialize every row.
    pub fn execute(&self) -> Result<Table> {
        let (sql, params) = self.builder.build();
        self.conn.execute_table(&sql, &params)
    }

    /// Classify a grouped query's `by` bucket ids into ranges and pivot:
    /// ranges down, distinct values of `column` across (or a single
    /// [`TOTAL_COLUMN`]), each measure summed per cell.
    pub fn cut(
        &self,
        by: BucketKind,
        breakpoints: &[f64],
        labels: Option<&[&str]>,
        column: Option<&str>,
    ) -> Result<CrossTab> {
        let grouping = self.require_grouping()?;
        let bucket_col = by.field().column_name();
        self.require_dim(grouping, bucket_col)?;
        if let Some(c) = column {
            self.require_dim(grouping, c)?;
        }

        let classifier =
            RangeClassifier::load(self.conn, self.schema, by, breakpoints, labels)?;
        let table = self.execute()?;

        let columns: Vec<String> = match column {
            Some(c) => {
                let idx = table.column_index(c).unwrap_or_default();
                table
                    .rows
                    .iter()
                    .map(|r| dimension_key(&r[idx]))
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            }
            None => vec![TOTAL_COLUMN.to_string()],
        };

        let mut tab = CrossTab::new(
            classifier.labels().to_vec(),
            columns,
            grouping.measures.clone(),
        );

        let bucket_idx = table.column_index(bucket_col).unwrap_or_default();
        let column_idx = column.and_then(|c| table.column_index(c));
        for (i, row) in table.rows.iter().enumerate() {
            let r = classifier.range_of(&row[bucket_idx])?;
            let c = match column_idx {
                Some(ci) => {
                    let key = dimension_key(&row[ci]);
                    tab.columns.iter().position(|x| *x == key).unwrap_or_default()
                }
                None => 0,
            };
            for (m, measure) in grouping.measures.iter().enumerate() {
                tab.accumulate(m, r, c, table.f64(i, measure));
            }
        }

        Ok(tab)
    }

    /// Cross-tabulate two bucket kinds on a filtered, ungrouped query.
    pub fn cross(
        &self,
        values: impl Into<Columns>,
        kinds: (BucketKind, BucketKind),
        idx_breakpoints: &[f64],
        col_breakpoints: &[f64],
    ) -> Result<CrossTab> {
        let (idx_kind, col_kind) = kinds;
        if idx_kind == col_kind {
            return Err(WinsunError::InvalidArgument(format!(
                "cross needs two different bucket kinds, got {} twice",
                idx_kind
            )));
        }

        let idx_col = idx_kind.field().column_name();
        let col_col = col_kind.field().column_name();
        let grouped = self.group([idx_col, col_col], values)?;
        let measures = grouped.require_grouping()?.measures.clone();

        let idx_classifier =
            RangeClassifier::load(self.conn, self.schema, idx_kind, idx_breakpoints, None)?;
        let col_classifier =
            RangeClassifier::load(self.conn, self.schema, col_kind, col_breakpoints, None)?;
        let table = grouped.execute()?;

        let mut tab = CrossTab::new(
            idx_classifier.labels().to_vec(),
            col_classifier.labels().to_vec(),
            measures.clone(),
        );

        for (i, row) in table.rows.iter().enumerate() {
            let r = idx_classifier.range_of(&row[0])?;
            let c = col_classifier.range_of(&row[1])?;
            for (m, measure) in measures.iter().enumerate() {
                tab.accumulate(m, r, c, table.value(i, measure).and_then(value_as_f64));
            }
        }

        Ok(tab)
    }

    fn require_grouping(&self) -> Result<&Grouping> {
        self.grouping.as_ref().ok_or_else(|| {
            WinsunError::InvalidArgument(format!(
                "query on '{}' must be grouped first",
                self.table.name
            ))
        })
    }

    fn require_dim(&self, grouping: &Grouping, name: &str) -> Result<()> {
        if grouping.dims.iter().any(|d| d == name) {
            Ok(())
        } else {
            Err(WinsunError::InvalidArgument(format!(
                "'{}' is not a grouping column",
                name
            )))
        }
    }
}

/// Grouping expression for dimension `name`; the plate column maps the legacy
/// zone name onto the current one so both spellings share a group.
fn dimension_expr(name: &str, col: String) -> String {
    if name == Field::Plate.column_name() {
        format!(
            "CASE WHEN {col} = '{}' THEN '{}' ELSE {col} END",
            LEGACY_ZONE.0, LEGACY_ZONE.1
        )
    } else {
        col
    }
}
