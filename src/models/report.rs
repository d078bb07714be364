use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ReportRow: supply / sales / price for one period or zone
// ---------------------------------------------------------------------------

/// `None` means no data for the row, which is distinct from a zero volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub label: String,
    /// Listed area (上市).
    pub sale: Option<f64>,
    /// Sold area (成交).
    pub sold: Option<f64>,
    /// Sold amount / sold area.
    pub price: Option<f64>,
}

impl ReportRow {
    pub fn empty(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            sale: None,
            sold: None,
            price: None,
        }
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Sale => self.sale,
            Metric::Sold => self.sold,
            Metric::Price => self.price,
        }
    }
}

// ---------------------------------------------------------------------------
// Metric
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Sale,
    Sold,
    Price,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Sale, Metric::Sold, Metric::Price];
}

// ---------------------------------------------------------------------------
// Report: ordered rows of a trend or zone report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub rows: Vec<ReportRow>,
}

impl Report {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.label.as_str()).collect()
    }

    pub fn row(&self, label: &str) -> Option<&ReportRow> {
        self.rows.iter().find(|r| r.label == label)
    }

    pub fn series(&self, metric: Metric) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.get(metric)).collect()
    }

    /// Display view: volumes in ten-thousand square metres rounded to two
    /// decimals, price rounded to whole yuan.
    pub fn adjusted(&self) -> Report {
        let rows = self
            .rows
            .iter()
            .map(|r| ReportRow {
                label: r.label.clone(),
                sale: r.sale.map(wan),
                sold: r.sold.map(wan),
                price: r.price.map(f64::round),
            })
            .collect();
        Report { rows }
    }
}

/// Divide by 10,000 and round to two decimals.
pub fn wan(x: f64) -> f64 {
    (x / 1e4 * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// TrendSnapshot: value, period-over-period, year-over-year for one row
// ---------------------------------------------------------------------------

/// Change cells hold rendered text; an empty string means the ratio was
/// undefined and no clause is emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendCell {
    pub value: Option<f64>,
    pub hb: String,
    pub tb: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSnapshot {
    pub label: String,
    pub sale: TrendCell,
    pub sold: TrendCell,
    pub price: TrendCell,
}

impl TrendSnapshot {
    pub fn get(&self, metric: Metric) -> &TrendCell {
        match metric {
            Metric::Sale => &self.sale,
            Metric::Sold => &self.sold,
            Metric::Price => &self.price,
        }
    }
}

// ---------------------------------------------------------------------------
// CrossTab: range × range (or range × dimension) pivot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossTab {
    pub index: Vec<String>,
    pub columns: Vec<String>,
    pub measures: Vec<String>,
    /// measure × index × column
    pub cells: Vec<Vec<Vec<Option<f64>>>>,
}

impl CrossTab {
    pub fn new(index: Vec<String>, columns: Vec<String>, measures: Vec<String>) -> Self {
        let cells = vec![vec![vec![None; columns.len()]; index.len()]; measures.len()];
        Self {
            index,
            columns,
            measures,
            cells,
        }
    }

    pub fn get(&self, measure: &str, row: &str, column: &str) -> Option<f64> {
        let m = self.measures.iter().position(|x| x == measure)?;
        let r = self.index.iter().position(|x| x == row)?;
        let c = self.columns.iter().position(|x| x == column)?;
        self.cells[m][r][c]
    }

    /// Add `value` into a cell; an empty cell starts from zero.
    pub(crate) fn accumulate(&mut self, m: usize, r: usize, c: usize, value: Option<f64>) {
        if let Some(v) = value {
            let cell = &mut self.cells[m][r][c];
            *cell = Some(cell.unwrap_or(0.0) + v);
        }
    }

    /// Total of one measure across every cell.
    pub fn total(&self, measure: &str) -> f64 {
        self.measures
            .iter()
            .position(|x| x == measure)
            .map(|m| {
                self.cells[m]
                    .iter()
                    .flat_map(|r| r.iter().flatten())
                    .sum()
            })
            .unwrap_or(0.0)
    }
}
