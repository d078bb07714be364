//! Range classification of area / unit price / total price buckets.
//!
//! Records carry a bucket id (`面积段`, `单价段`, `总价段`) pointing into a
//! lookup table of fine-grained `[low, high)` boundaries. User breakpoints
//! regroup those fine buckets into coarse labeled ranges.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::connection::Connection;
use crate::error::{Result, WinsunError};
use crate::models::dimension_key;
use crate::schema::{Field, Schema};
use crate::sql_builder::SqlBuilder;

// ---------------------------------------------------------------------------
// BucketKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketKind {
    Acreage,
    AvePrice,
    TPrice,
}

impl BucketKind {
    /// Lookup table name, also the prefix of its boundary columns.
    pub fn table_name(&self) -> &'static str {
        match self {
            BucketKind::Acreage => "acreage",
            BucketKind::AvePrice => "aveprice",
            BucketKind::TPrice => "tprice",
        }
    }

    /// Bucket-id column in the record tables.
    pub fn field(&self) -> Field {
        match self {
            BucketKind::Acreage => Field::AreaBucket,
            BucketKind::AvePrice => Field::UnitPriceBucket,
            BucketKind::TPrice => Field::TotalPriceBucket,
        }
    }

    /// Multiplier from breakpoint units to stored units. Total-price
    /// breakpoints are given in 万元, the lookup table stores yuan.
    pub fn scale(&self) -> f64 {
        match self {
            BucketKind::TPrice => 1e4,
            _ => 1.0,
        }
    }

    fn low_column(&self) -> String {
        format!("{}_low", self.table_name())
    }

    fn high_column(&self) -> String {
        format!("{}_high", self.table_name())
    }
}

impl FromStr for BucketKind {
    type Err = WinsunError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "acreage" => Ok(BucketKind::Acreage),
            "aveprice" => Ok(BucketKind::AvePrice),
            "tprice" => Ok(BucketKind::TPrice),
            other => Err(WinsunError::InvalidArgument(format!(
                "unknown bucket kind '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for BucketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

// ---------------------------------------------------------------------------
// RangeSet
// ---------------------------------------------------------------------------

/// Contiguous `[low, high)` ranges from 0 to a ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSet {
    edges: Vec<f64>,
    labels: Vec<String>,
}

impl RangeSet {
    /// Build ranges from interior breakpoints.
    ///
    /// Breakpoints are multiplied by `scale`; an edge at 0 is prepended and
    /// `ceiling` (in stored units) appended, raised above the last breakpoint
    /// if necessary.
    pub fn new(
        breakpoints: &[f64],
        scale: f64,
        ceiling: f64,
        labels: Option<&[&str]>,
    ) -> Result<Self> {
        if breakpoints.is_empty() {
            return Err(WinsunError::InvalidArgument(
                "at least one breakpoint is required".into(),
            ));
        }
        if breakpoints.iter().any(|b| !b.is_finite() || *b < 0.0) {
            return Err(WinsunError::InvalidArgument(format!(
                "breakpoints must be finite and non-negative: {:?}",
                breakpoints
            )));
        }
        if breakpoints.windows(2).any(|w| w[0] >= w[1]) || breakpoints[0] == 0.0 {
            return Err(WinsunError::InvalidArgument(format!(
                "breakpoints must be strictly increasing and above zero: {:?}",
                breakpoints
            )));
        }

        let labels: Vec<String> = match labels {
            Some(ls) => {
                if ls.len() != breakpoints.len() + 1 {
                    return Err(WinsunError::InvalidArgument(format!(
                        "{} labels given for {} ranges",
                        ls.len(),
                        breakpoints.len() + 1
                    )));
                }
                ls.iter().map(|l| l.to_string()).collect()
            }
            None => default_labels(breakpoints),
        };

        let mut edges = Vec::with_capacity(breakpoints.len() + 2);
        edges.push(0.0);
        edges.extend(breakpoints.iter().map(|b| b * scale));
        let last = edges[edges.len() - 1];
        edges.push(if ceiling > last { ceiling } else { last + 1.0 });

        Ok(Self { edges, labels })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn ceiling(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    /// Index of the range containing `value`.
    pub fn classify(&self, value: f64) -> Result<usize> {
        if value.is_nan() || value < 0.0 || value >= self.ceiling() {
            return Err(WinsunError::Classification(format!(
                "value {} outside [0, {})",
                value,
                self.ceiling()
            )));
        }
        Ok(self.edges.partition_point(|e| *e <= value) - 1)
    }
}

/// `"a-"`, `"a-b"`, ..., `"z+"` for breakpoints `a..z`.
pub fn default_labels(breakpoints: &[f64]) -> Vec<String> {
    let mut labels = Vec::with_capacity(breakpoints.len() + 1);
    for (i, b) in breakpoints.iter().enumerate() {
        if i == 0 {
            labels.push(format!("{}-", b));
        } else {
            labels.push(format!("{}-{}", breakpoints[i - 1], b));
        }
    }
    if let Some(last) = breakpoints.last() {
        labels.push(format!("{}+", last));
    }
    labels
}

// ---------------------------------------------------------------------------
// RangeClassifier
// ---------------------------------------------------------------------------

/// Maps bucket ids from one lookup table onto labeled ranges.
#[derive(Debug, Clone)]
pub struct RangeClassifier {
    pub kind: BucketKind,
    ranges: RangeSet,
    assignments: HashMap<String, usize>,
}

impl RangeClassifier {
    /// Load the lookup table for `kind` and assign every bucket to a range
    /// by its low boundary.
    pub fn load(
        conn: &Connection,
        schema: &Schema,
        kind: BucketKind,
        breakpoints: &[f64],
        labels: Option<&[&str]>,
    ) -> Result<Self> {
        let table = schema.table(kind.table_name())?;
        let id = table.column("id")?.quoted();
        let low = table.column(&kind.low_column())?.quoted();
        let high = table.column(&kind.high_column())?.quoted();

        let select = [
            format!("{} AS id", id),
            format!("{} AS low", low),
            format!("{} AS high", high),
        ];
        let select: Vec<&str> = select.iter().map(|s| s.as_str()).collect();
        let (sql, params) = SqlBuilder::new(kind.table_name())
            .select(&select)
            .order_by(&[id.as_str()])
            .build();
        let lookup = conn.execute_table(&sql, &params)?;

        let max_high = (0..lookup.len())
            .filter_map(|i| lookup.f64(i, "high"))
            .fold(0.0_f64, f64::max);

        let ranges = RangeSet::new(breakpoints, kind.scale(), max_high + 1.0, labels)?;

        let mut assignments = HashMap::with_capacity(lookup.len());
        for (i, row) in lookup.rows.iter().enumerate() {
            let bucket = dimension_key(&row[0]);
            let low = lookup.f64(i, "low").ok_or_else(|| {
                WinsunError::Classification(format!(
                    "{} bucket {} has no low boundary",
                    kind, bucket
                ))
            })?;
            assignments.insert(bucket, ranges.classify(low)?);
        }

        Ok(Self {
            kind,
            ranges,
            assignments,
        })
    }

    pub fn labels(&self) -> &[String] {
        self.ranges.labels()
    }

    /// Range index for a bucket id as found in a record table.
    pub fn range_of(&self, bucket_id: &Value) -> Result<usize> {
        let key = dimension_key(bucket_id);
        self.assignments.get(&key).copied().ok_or_else(|| {
            WinsunError::Classification(format!(
                "{} bucket '{}' is not in the lookup table",
                self.kind, key
            ))
        })
    }
}
