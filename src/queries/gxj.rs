//! Supply / sales / price (供销价) reports over paired listed and sold tables.

use std::fmt;
use std::str::FromStr;

use crate::config::{normalize_zone, QUANSHI};
use crate::connection::Connection;
use crate::error::{Result, WinsunError};
use crate::models::{dimension_key, Report, ReportRow, Table};
use crate::period::{Granularity, PeriodResolver, PeriodWindow};
use crate::queries::filter::FilterCriteria;
use crate::queries::query::Query;
use crate::queries::shuoli::Shuoli;
use crate::schema::{Field, Schema};

/// Sold amount over sold area; `None` when either is missing or area is zero.
pub fn average_price(amount: Option<f64>, volume: Option<f64>) -> Option<f64> {
    match (amount, volume) {
        (Some(a), Some(v)) if v != 0.0 => Some(a / v),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// OutputBy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputBy {
    /// One row per period.
    Trend,
    /// One row per zone.
    Plate,
}

impl FromStr for OutputBy {
    type Err = WinsunError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "trend" => Ok(OutputBy::Trend),
            "plate" => Ok(OutputBy::Plate),
            other => Err(WinsunError::InvalidArgument(format!(
                "unknown report output '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputBy::Trend => "trend",
            OutputBy::Plate => "plate",
        })
    }
}

// ---------------------------------------------------------------------------
// Gxj
// ---------------------------------------------------------------------------

pub struct Gxj<'a> {
    conn: &'a Connection,
    schema: &'a Schema,
    output_by: OutputBy,
    window: PeriodWindow,
    criteria: FilterCriteria,
}

impl<'a> Gxj<'a> {
    /// Resolve `period` trailing periods and prepare the report.
    ///
    /// The criteria's date range is replaced by the resolved window.
    pub fn new(
        conn: &'a Connection,
        schema: &'a Schema,
        resolver: &dyn PeriodResolver,
        output_by: OutputBy,
        granularity: Granularity,
        period: u32,
        criteria: FilterCriteria,
    ) -> Result<Self> {
        let window = resolver.resolve(granularity, period)?;
        Ok(Self {
            conn,
            schema,
            output_by,
            window,
            criteria,
        })
    }

    pub fn window(&self) -> &PeriodWindow {
        &self.window
    }

    fn group_field(&self) -> Field {
        match self.output_by {
            OutputBy::Plate => Field::Plate,
            OutputBy::Trend => self.window.group_by,
        }
    }

    fn filtered(&self, table: &str) -> Result<Query<'a>> {
        let name = format!("{}_{}", self.window.granularity, table);
        let (low, high) = self.window.range;
        let criteria = self.criteria.clone().date_range(low, high);
        Query::new(self.conn, self.schema, &name)?.filter(&criteria)
    }

    /// Listed and sold aggregates outer-joined on the grouping key, in
    /// first-seen order. Duplicate keys (a legacy zone name next to its
    /// current one) are summed.
    pub fn group(&self) -> Result<Vec<ReportRow>> {
        let dim = self.group_field().column_name();
        let area = Field::Area.column_name();
        let amount = Field::Amount.column_name();

        let sale = self.filtered("sale")?.group(dim, area)?.execute()?;
        let sold = self.filtered("sold")?.group(dim, [area, amount])?.execute()?;

        let mut joined: Vec<(String, [Option<f64>; 3])> = Vec::new();
        merge(&mut joined, &sale, dim, &[(area, 0)]);
        merge(&mut joined, &sold, dim, &[(area, 1), (amount, 2)]);

        Ok(joined
            .into_iter()
            .map(|(label, [sale, sold, money])| ReportRow {
                label,
                sale,
                sold,
                price: average_price(money, sold),
            })
            .collect())
    }

    /// Rows for every period of the window in chronological order, labeled
    /// for display. Periods without activity are all-null rows.
    pub fn trend(&self) -> Result<Report> {
        let joined = self.group()?;
        let rows = self
            .window
            .keys
            .iter()
            .zip(&self.window.labels)
            .map(|(key, label)| {
                let key = key.sql_value();
                joined
                    .iter()
                    .find(|r| r.label == key)
                    .map(|r| ReportRow {
                        label: label.clone(),
                        ..r.clone()
                    })
                    .unwrap_or_else(|| ReportRow::empty(label.clone()))
            })
            .collect();
        Ok(Report { rows })
    }

    /// Rows for the requested zones, or every district when the criteria
    /// name none.
    pub fn plate(&self) -> Result<Report> {
        let joined = self.group()?;
        let zones: Vec<String> = match &self.criteria.plate {
            Some(c) => c.values().iter().map(|z| normalize_zone(z).to_string()).collect(),
            None => QUANSHI.iter().map(|z| z.to_string()).collect(),
        };
        let rows = zones
            .into_iter()
            .map(|zone| {
                joined
                    .iter()
                    .find(|r| r.label == zone)
                    .cloned()
                    .unwrap_or_else(|| ReportRow::empty(zone))
            })
            .collect();
        Ok(Report { rows })
    }

    /// The unadjusted report for this output kind.
    pub fn report(&self) -> Result<Report> {
        match self.output_by {
            OutputBy::Plate => self.plate(),
            OutputBy::Trend => self.trend(),
        }
    }

    /// The display view of [`report`](Self::report).
    pub fn adjusted(&self) -> Result<Report> {
        Ok(self.report()?.adjusted())
    }

    /// Narrate the latest row.
    pub fn shuoli(&self, degree: u32, lag: Option<usize>) -> Result<Shuoli> {
        let original = self.report()?;
        Shuoli::new(&original, &original.adjusted(), degree, lag)
    }
}

/// Add the measures of `table` into `joined`, keyed by the `dim` column.
/// `measures` pairs a column name with its slot in the joined row.
fn merge(
    joined: &mut Vec<(String, [Option<f64>; 3])>,
    table: &Table,
    dim: &str,
    measures: &[(&str, usize)],
) {
    let Some(dim_idx) = table.column_index(dim) else {
        return;
    };
    for (i, row) in table.rows.iter().enumerate() {
        let key = dimension_key(&row[dim_idx]);
        let slot = match joined.iter().position(|(k, _)| *k == key) {
            Some(p) => p,
            None => {
                joined.push((key, [None; 3]));
                joined.len() - 1
            }
        };
        for (name, j) in measures {
            if let Some(v) = table.f64(i, name) {
                let cell = &mut joined[slot].1[*j];
                *cell = Some(cell.unwrap_or(0.0) + v);
            }
        }
    }
}
