//! Named filter criteria and their translation into WHERE conditions.

use crate::config::LEGACY_ZONE;
use crate::error::Result;
use crate::period::PeriodKey;
use crate::schema::{Field, TableSchema};
use crate::sql_builder::SqlBuilder;

// ---------------------------------------------------------------------------
// Criterion
// ---------------------------------------------------------------------------

/// A single value filters by equality, a list by membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criterion {
    One(String),
    Any(Vec<String>),
}

impl Criterion {
    /// Every value the criterion admits.
    pub fn values(&self) -> Vec<&str> {
        match self {
            Criterion::One(v) => vec![v.as_str()],
            Criterion::Any(vs) => vs.iter().map(|v| v.as_str()).collect(),
        }
    }
}

impl From<&str> for Criterion {
    fn from(v: &str) -> Self {
        Criterion::One(v.to_string())
    }
}

impl From<String> for Criterion {
    fn from(v: String) -> Self {
        Criterion::One(v)
    }
}

impl From<Vec<String>> for Criterion {
    fn from(vs: Vec<String>) -> Self {
        Criterion::Any(vs)
    }
}

impl From<Vec<&str>> for Criterion {
    fn from(vs: Vec<&str>) -> Self {
        Criterion::Any(vs.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for Criterion {
    fn from(vs: &[&str]) -> Self {
        Criterion::Any(vs.iter().map(|v| v.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Criterion {
    fn from(vs: [&str; N]) -> Self {
        Criterion::Any(vs.iter().map(|v| v.to_string()).collect())
    }
}

// ---------------------------------------------------------------------------
// FilterCriteria
// ---------------------------------------------------------------------------

/// AND-combined filters over a market table.
///
/// Keys accepted by [`with`](Self::with): `usage`, `plate`, `zone`, `popname`,
/// `prjname`. Any other key is remembered in [`ignored_keys`](Self::ignored_keys)
/// and has no effect on the query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    /// Inclusive range over the table's period column.
    pub date_range: Option<(PeriodKey, PeriodKey)>,
    /// 功能
    pub usage: Option<Criterion>,
    /// 板块
    pub plate: Option<Criterion>,
    /// 片区
    pub zone: Option<Criterion>,
    pub popname: Option<Criterion>,
    pub prjname: Option<Criterion>,
    ignored: Vec<String>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn date_range(mut self, low: PeriodKey, high: PeriodKey) -> Self {
        self.date_range = Some((low, high));
        self
    }

    pub fn usage(mut self, c: impl Into<Criterion>) -> Self {
        self.usage = Some(c.into());
        self
    }

    pub fn plate(mut self, c: impl Into<Criterion>) -> Self {
        self.plate = Some(c.into());
        self
    }

    pub fn zone(mut self, c: impl Into<Criterion>) -> Self {
        self.zone = Some(c.into());
        self
    }

    pub fn popname(mut self, c: impl Into<Criterion>) -> Self {
        self.popname = Some(c.into());
        self
    }

    pub fn prjname(mut self, c: impl Into<Criterion>) -> Self {
        self.prjname = Some(c.into());
        self
    }

    /// Set a criterion by key name. Unrecognized keys are ignored.
    pub fn with(self, key: &str, c: impl Into<Criterion>) -> Self {
        match key {
            "usage" => self.usage(c),
            "plate" => self.plate(c),
            "zone" => self.zone(c),
            "popname" => self.popname(c),
            "prjname" => self.prjname(c),
            other => {
                log::debug!("Ignoring unknown filter key '{}'", other);
                let mut s = self;
                s.ignored.push(other.to_string());
                s
            }
        }
    }

    pub fn ignored_keys(&self) -> &[String] {
        &self.ignored
    }

    fn field_criteria(&self) -> [(Field, Option<&Criterion>); 5] {
        [
            (Field::Usage, self.usage.as_ref()),
            (Field::Plate, self.plate.as_ref()),
            (Field::Zone, self.zone.as_ref()),
            (Field::PopName, self.popname.as_ref()),
            (Field::PrjName, self.prjname.as_ref()),
        ]
    }

    /// Append this filter's conditions for `table` to `qb`.
    pub(crate) fn apply(&self, table: &TableSchema, qb: &mut SqlBuilder) -> Result<()> {
        if let Some((low, high)) = &self.date_range {
            let col = table.field(table.period_field())?;
            qb.where_between(
                &col.quoted(),
                &low.sql_value(),
                &high.sql_value(),
                Some(low.sql_type()),
            );
        }

        for (field, criterion) in self.field_criteria() {
            let Some(criterion) = criterion else {
                continue;
            };
            let col = table.field(field)?.quoted();
            let mut values = criterion.values();
            // Rows stored before the rename still carry the legacy zone name.
            if field == Field::Plate && values.contains(&LEGACY_ZONE.1) {
                values.push(LEGACY_ZONE.0);
            }
            match values.as_slice() {
                [v] => {
                    qb.where_eq(&col, v);
                }
                vs => {
                    qb.where_in(&col, vs);
                }
            }
        }

        Ok(())
    }
}
