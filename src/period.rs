//! Reporting periods: weeks and months, their keys and labels.
//!
//! A week key is `year * 100 + week-number` (stored in `星期`); a month key is
//! the first day of the month (stored in `年月`).

use crate::config::MONTH_ROLLOVER_DAY;
use crate::error::{Result, WinsunError};
use crate::schema::Field;
use chrono::{Datelike, Duration, Local, Months, NaiveDate};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Granularity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Week,
    Month,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }

    /// Column holding the period key.
    pub fn group_field(&self) -> Field {
        match self {
            Granularity::Week => Field::Week,
            Granularity::Month => Field::YearMonth,
        }
    }

    /// Granularity from a table name prefix, e.g. `week_sold`.
    pub fn from_table_name(table: &str) -> Result<Self> {
        table
            .split('_')
            .next()
            .unwrap_or_default()
            .parse()
    }
}

impl FromStr for Granularity {
    type Err = WinsunError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "week" => Ok(Granularity::Week),
            "month" => Ok(Granularity::Month),
            other => Err(WinsunError::InvalidArgument(format!(
                "unknown period granularity '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PeriodKey
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeriodKey {
    Week(i64),
    Month(NaiveDate),
}

impl PeriodKey {
    /// Parameter text bound into SQL.
    pub fn sql_value(&self) -> String {
        match self {
            PeriodKey::Week(k) => k.to_string(),
            PeriodKey::Month(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn sql_type(&self) -> &'static str {
        match self {
            PeriodKey::Week(_) => "BIGINT",
            PeriodKey::Month(_) => "DATE",
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql_value())
    }
}

// ---------------------------------------------------------------------------
// Week
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Week {
    pub monday: NaiveDate,
    pub sunday: NaiveDate,
}

impl Week {
    /// The last completed week as of `today` (a Sunday counts as completed).
    pub fn last_completed(today: NaiveDate) -> Self {
        let back = today.weekday().num_days_from_sunday() as i64;
        let sunday = today - Duration::days(back);
        Self {
            monday: sunday - Duration::days(6),
            sunday,
        }
    }

    /// Sunday-first week of year. Weeks starting in 2018 are numbered by
    /// their Sunday, every other year by the Monday.
    pub fn number(&self) -> u32 {
        if self.monday.year() == 2018 {
            sunday_week_of_year(self.sunday)
        } else {
            sunday_week_of_year(self.monday)
        }
    }

    pub fn key(&self) -> PeriodKey {
        PeriodKey::Week(self.monday.year() as i64 * 100 + self.number() as i64)
    }

    pub fn label(&self) -> String {
        format!(
            "{}-{}",
            self.monday.format("%Y%m%d"),
            self.sunday.format("%Y%m%d")
        )
    }

    /// The week `i` weeks before this one.
    pub fn before(&self, i: u32) -> Self {
        let shift = Duration::weeks(i as i64);
        Self {
            monday: self.monday - shift,
            sunday: self.sunday - shift,
        }
    }
}

impl fmt::Display for Week {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (week {})", self.label(), self.number())
    }
}

/// Same numbering as `strftime("%U")`: days before the first Sunday are week 0.
fn sunday_week_of_year(date: NaiveDate) -> u32 {
    (date.ordinal0() + 7 - date.weekday().num_days_from_sunday()) / 7
}

// ---------------------------------------------------------------------------
// Month
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Month {
    pub first: NaiveDate,
}

impl Month {
    /// The month a report run on `today` describes.
    ///
    /// Take `today` minus one month; past the rollover day that lands in the
    /// following month, otherwise in its own month.
    pub fn reporting(today: NaiveDate) -> Result<Self> {
        let last = today
            .checked_sub_months(Months::new(1))
            .ok_or_else(|| out_of_range(today))?;
        let first = last.with_day(1).ok_or_else(|| out_of_range(last))?;
        let first = if last.day() > MONTH_ROLLOVER_DAY {
            first
                .checked_add_months(Months::new(1))
                .ok_or_else(|| out_of_range(first))?
        } else {
            first
        };
        Ok(Self { first })
    }

    pub fn key(&self) -> PeriodKey {
        PeriodKey::Month(self.first)
    }

    pub fn label(&self) -> String {
        self.first.format("%Y%m").to_string()
    }

    /// The month `i` months before this one.
    pub fn before(&self, i: u32) -> Result<Self> {
        let first = self
            .first
            .checked_sub_months(Months::new(i))
            .ok_or_else(|| out_of_range(self.first))?;
        Ok(Self { first })
    }
}

fn out_of_range(date: NaiveDate) -> WinsunError {
    WinsunError::InvalidArgument(format!("date {} out of range", date))
}

// ---------------------------------------------------------------------------
// PeriodWindow / PeriodResolver
// ---------------------------------------------------------------------------

/// Trailing periods of one granularity, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodWindow {
    pub granularity: Granularity,
    pub range: (PeriodKey, PeriodKey),
    pub group_by: Field,
    pub keys: Vec<PeriodKey>,
    pub labels: Vec<String>,
}

pub trait PeriodResolver {
    /// Resolve the `count` most recent reporting periods.
    fn resolve(&self, granularity: Granularity, count: u32) -> Result<PeriodWindow>;
}

/// Resolves periods against the calendar, anchored on a reference date.
#[derive(Debug, Clone, Copy)]
pub struct CalendarResolver {
    pub today: NaiveDate,
}

impl CalendarResolver {
    pub fn today() -> Self {
        Self {
            today: Local::now().date_naive(),
        }
    }

    pub fn anchored(today: NaiveDate) -> Self {
        Self { today }
    }
}

impl Default for CalendarResolver {
    fn default() -> Self {
        Self::today()
    }
}

impl PeriodResolver for CalendarResolver {
    fn resolve(&self, granularity: Granularity, count: u32) -> Result<PeriodWindow> {
        if count == 0 {
            return Err(WinsunError::InvalidArgument(
                "period count must be at least 1".into(),
            ));
        }

        let mut keys = Vec::with_capacity(count as usize);
        let mut labels = Vec::with_capacity(count as usize);

        match granularity {
            Granularity::Week => {
                let current = Week::last_completed(self.today);
                for i in (0..count).rev() {
                    let w = current.before(i);
                    keys.push(w.key());
                    labels.push(w.label());
                }
            }
            Granularity::Month => {
                let current = Month::reporting(self.today)?;
                for i in (0..count).rev() {
                    let m = current.before(i)?;
                    keys.push(m.key());
                    labels.push(m.label());
                }
            }
        }

        Ok(PeriodWindow {
            granularity,
            range: (keys[0], keys[keys.len() - 1]),
            group_by: granularity.group_field(),
            keys,
            labels,
        })
    }
}
