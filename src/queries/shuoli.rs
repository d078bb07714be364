//! Period-over-period and year-over-year change, narrated.

use crate::error::{Result, WinsunError};
use crate::models::{Metric, Report, TrendCell, TrendSnapshot};
use crate::queries::narrative::{render_change, Chinese, Comparison, Narrator};

/// Growth of `a` relative to `b`.
///
/// A zero or NaN base yields 0; a NaN `a` over a usable base yields NaN.
pub fn growth_rate(a: f64, b: f64) -> f64 {
    if b.is_nan() || b == 0.0 {
        0.0
    } else {
        (a - b) / b
    }
}

/// Growth of `a` relative to `b` as a Chinese change phrase.
pub fn change(a: f64, b: f64, degree: u32) -> String {
    gr2change(growth_rate(a, b), degree)
}

/// A signed ratio as a Chinese change phrase ("增长10.5%", "下降20%", or "").
pub fn gr2change(ratio: f64, degree: u32) -> String {
    render_change(&Chinese, ratio, degree)
}

fn nan_if_none(v: Option<f64>) -> f64 {
    v.unwrap_or(f64::NAN)
}

// ---------------------------------------------------------------------------
// Shuoli
// ---------------------------------------------------------------------------

/// Narrates one row of a report against earlier rows.
#[derive(Debug, Clone)]
pub struct Shuoli<N: Narrator = Chinese> {
    pub snapshot: TrendSnapshot,
    narrator: N,
}

impl Shuoli<Chinese> {
    /// Narrate the latest row of `original`.
    ///
    /// Changes are computed on `original`; displayed values come from
    /// `adjusted`. `lag` adds a year-over-year comparison that many rows back.
    pub fn new(original: &Report, adjusted: &Report, degree: u32, lag: Option<usize>) -> Result<Self> {
        let last = original.len().checked_sub(1).ok_or_else(|| {
            WinsunError::InvalidArgument("cannot narrate an empty report".into())
        })?;
        Self::for_row(original, adjusted, last, degree, lag)
    }

    /// Narrate row `row` of `original`.
    pub fn for_row(
        original: &Report,
        adjusted: &Report,
        row: usize,
        degree: u32,
        lag: Option<usize>,
    ) -> Result<Self> {
        Shuoli::with_narrator(Chinese, original, adjusted, row, degree, lag)
    }
}

impl<N: Narrator> Shuoli<N> {
    pub fn with_narrator(
        narrator: N,
        original: &Report,
        adjusted: &Report,
        row: usize,
        degree: u32,
        lag: Option<usize>,
    ) -> Result<Self> {
        if row >= original.len() || original.len() != adjusted.len() {
            return Err(WinsunError::InvalidArgument(format!(
                "row {} out of range for reports of {} and {} rows",
                row,
                original.len(),
                adjusted.len()
            )));
        }
        let lag = lag.filter(|l| *l > 0);

        let cell = |metric: Metric| {
            let series = original.series(metric);
            let current = nan_if_none(series[row]);
            let versus = |back: usize| {
                let ratio = match row.checked_sub(back) {
                    Some(prev) => growth_rate(current, nan_if_none(series[prev])),
                    None => f64::NAN,
                };
                render_change(&narrator, ratio, degree)
            };
            TrendCell {
                value: adjusted.rows[row].get(metric),
                hb: versus(1),
                tb: lag.map(versus),
            }
        };

        let snapshot = TrendSnapshot {
            label: original.rows[row].label.clone(),
            sale: cell(Metric::Sale),
            sold: cell(Metric::Sold),
            price: cell(Metric::Price),
        };

        Ok(Self { snapshot, narrator })
    }

    fn clauses(&self, metric: Metric) -> String {
        let cell = self.snapshot.get(metric);
        let mut out = String::new();
        if !cell.hb.is_empty() {
            out.push_str(&self.narrator.comparison(Comparison::PeriodOverPeriod, &cell.hb));
        }
        if let Some(tb) = cell.tb.as_deref().filter(|t| !t.is_empty()) {
            out.push_str(&self.narrator.comparison(Comparison::YearOverYear, tb));
        }
        out
    }

    /// Sentence for one metric. Null or zero values produce the narrator's
    /// no-data text.
    pub fn text(&self, metric: Metric) -> String {
        match self.snapshot.get(metric).value {
            Some(v) if v != 0.0 => self.narrator.sentence(metric, v, &self.clauses(metric)),
            _ => self.narrator.no_data(metric),
        }
    }

    /// Listed, sold and price sentences concatenated.
    pub fn full_text(&self) -> String {
        Metric::ALL.iter().map(|m| self.text(*m)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReportRow;

    fn row(label: &str, sale: Option<f64>, sold: Option<f64>, price: Option<f64>) -> ReportRow {
        ReportRow {
            label: label.into(),
            sale,
            sold,
            price,
        }
    }

    #[test]
    fn growth_rate_zero_or_nan_base_is_zero() {
        assert_eq!(growth_rate(5.0, 0.0), 0.0);
        assert_eq!(growth_rate(0.0, 0.0), 0.0);
        assert_eq!(growth_rate(5.0, f64::NAN), 0.0);
        assert_eq!(growth_rate(15.0, 10.0), 0.5);
        assert!(growth_rate(f64::NAN, 10.0).is_nan());
    }

    #[test]
    fn change_phrases() {
        assert_eq!(change(12.0, 10.0, 0), "增长20%");
        assert_eq!(gr2change(0.105, 2), "增长10.5%");
        assert_eq!(gr2change(-0.2, 0), "下降20%");
        assert_eq!(gr2change(f64::NAN, 2), "");
    }

    #[test]
    fn first_row_has_no_period_over_period_clause() {
        let original = Report {
            rows: vec![row("a", Some(20_000.0), Some(10_000.0), Some(15_000.0))],
        };
        let s = Shuoli::new(&original, &original.adjusted(), 2, None).unwrap();
        assert_eq!(s.full_text(), "上市2.00万㎡。成交1.00万㎡。成交均价15000元/㎡。");
    }

    #[test]
    fn zero_change_still_renders() {
        let original = Report {
            rows: vec![
                row("a", Some(10_000.0), None, None),
                row("b", Some(10_000.0), None, None),
            ],
        };
        let s = Shuoli::new(&original, &original.adjusted(), 2, None).unwrap();
        assert_eq!(s.text(Metric::Sale), "上市1.00万㎡，环比增长0%。");
        assert_eq!(s.text(Metric::Sold), "无成交。");
        assert_eq!(s.text(Metric::Price), "");
    }

    #[test]
    fn year_over_year_beyond_history_is_omitted() {
        let original = Report {
            rows: vec![
                row("a", Some(10_000.0), None, None),
                row("b", Some(15_000.0), None, None),
            ],
        };
        let s = Shuoli::new(&original, &original.adjusted(), 0, Some(12)).unwrap();
        assert_eq!(s.snapshot.sale.tb.as_deref(), Some(""));
        assert_eq!(s.text(Metric::Sale), "上市1.50万㎡，环比增长50%。");
    }

    #[test]
    fn empty_report_is_rejected() {
        let empty = Report::default();
        assert!(Shuoli::new(&empty, &empty, 2, None).is_err());
    }
}
