//! Sentence templates for trend narration.
//!
//! Change computation hands direction, magnitude and metric to a
//! [`Narrator`]; swapping the narrator changes the output language without
//! touching the arithmetic.

use crate::models::Metric;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increase,
    Decrease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// 环比
    PeriodOverPeriod,
    /// 同比
    YearOverYear,
}

pub trait Narrator {
    /// A signed change, e.g. "增长10.5%". `magnitude` is already formatted.
    fn change(&self, direction: Direction, magnitude: &str) -> String;

    /// A comparison clause appended to a sentence, e.g. "，环比增长10.5%".
    fn comparison(&self, kind: Comparison, change: &str) -> String;

    /// Sentence for a metric with no data.
    fn no_data(&self, metric: Metric) -> String;

    /// Sentence for a metric value followed by its comparison clauses.
    fn sentence(&self, metric: Metric, value: f64, clauses: &str) -> String;
}

/// Simplified Chinese report phrasing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Chinese;

impl Narrator for Chinese {
    fn change(&self, direction: Direction, magnitude: &str) -> String {
        let word = match direction {
            Direction::Increase => "增长",
            Direction::Decrease => "下降",
        };
        format!("{}{}%", word, magnitude)
    }

    fn comparison(&self, kind: Comparison, change: &str) -> String {
        match kind {
            Comparison::PeriodOverPeriod => format!("，环比{}", change),
            Comparison::YearOverYear => format!("，同比{}", change),
        }
    }

    fn no_data(&self, metric: Metric) -> String {
        match metric {
            Metric::Sale => "无上市。".to_string(),
            Metric::Sold => "无成交。".to_string(),
            // No price sentence at all when nothing sold
            Metric::Price => String::new(),
        }
    }

    fn sentence(&self, metric: Metric, value: f64, clauses: &str) -> String {
        match metric {
            Metric::Sale => format!("上市{:.2}万㎡{}。", value, clauses),
            Metric::Sold => format!("成交{:.2}万㎡{}。", value, clauses),
            Metric::Price => format!("成交均价{:.0}元/㎡{}。", value, clauses),
        }
    }
}

/// Render a signed ratio (1.0 = 100%) as a change phrase.
///
/// NaN renders as an empty string. `degree` 0 prints a whole percentage,
/// otherwise the percentage is rounded to `degree` decimals and printed
/// without trailing zeros.
pub fn render_change<N: Narrator + ?Sized>(narrator: &N, ratio: f64, degree: u32) -> String {
    if ratio.is_nan() {
        return String::new();
    }
    let direction = if ratio < 0.0 {
        Direction::Decrease
    } else {
        Direction::Increase
    };
    let pct = ratio.abs() * 100.0;
    let magnitude = if degree == 0 {
        format!("{:.0}", pct)
    } else {
        let factor = 10f64.powi(degree as i32);
        format!("{}", (pct * factor).round() / factor)
    };
    narrator.change(direction, &magnitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct English;

    impl Narrator for English {
        fn change(&self, direction: Direction, magnitude: &str) -> String {
            match direction {
                Direction::Increase => format!("up {}%", magnitude),
                Direction::Decrease => format!("down {}%", magnitude),
            }
        }
        fn comparison(&self, kind: Comparison, change: &str) -> String {
            match kind {
                Comparison::PeriodOverPeriod => format!(", {} on last period", change),
                Comparison::YearOverYear => format!(", {} on last year", change),
            }
        }
        fn no_data(&self, _metric: Metric) -> String {
            "none.".into()
        }
        fn sentence(&self, _metric: Metric, value: f64, clauses: &str) -> String {
            format!("{}{}.", value, clauses)
        }
    }

    #[test]
    fn renders_direction_and_rounded_magnitude() {
        assert_eq!(render_change(&Chinese, 0.105, 2), "增长10.5%");
        assert_eq!(render_change(&Chinese, -0.2, 0), "下降20%");
        assert_eq!(render_change(&Chinese, 0.0, 2), "增长0%");
        assert_eq!(render_change(&Chinese, 0.123456, 1), "增长12.3%");
        // whole percentages drop the decimal part at any degree
        assert_eq!(render_change(&Chinese, 0.2, 2), "增长20%");
    }

    #[test]
    fn nan_renders_empty() {
        assert_eq!(render_change(&Chinese, f64::NAN, 2), "");
    }

    #[test]
    fn alternate_narrator_reuses_the_arithmetic() {
        assert_eq!(render_change(&English, -0.25, 0), "down 25%");
    }

    #[test]
    fn chinese_sentences() {
        assert_eq!(Chinese.sentence(Metric::Sale, 3.8, "，环比增长1%"), "上市3.80万㎡，环比增长1%。");
        assert_eq!(Chinese.sentence(Metric::Price, 22000.4, ""), "成交均价22000元/㎡。");
        assert_eq!(Chinese.no_data(Metric::Sold), "无成交。");
        assert_eq!(Chinese.no_data(Metric::Price), "");
    }
}
