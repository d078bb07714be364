//! Table reflection over the market database.
//!
//! Logical fields used by the query layer are resolved to physical columns
//! once, when the schema is loaded, instead of by string lookup at query time.

use crate::connection::Connection;
use crate::error::{Result, WinsunError};
use std::collections::{BTreeMap, HashMap};

// ---------------------------------------------------------------------------
// Field: logical columns known to the query layer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Week,
    YearMonth,
    Usage,
    Plate,
    Zone,
    PopName,
    PrjName,
    Area,
    Amount,
    AreaBucket,
    UnitPriceBucket,
    TotalPriceBucket,
}

impl Field {
    pub const ALL: [Field; 12] = [
        Field::Week,
        Field::YearMonth,
        Field::Usage,
        Field::Plate,
        Field::Zone,
        Field::PopName,
        Field::PrjName,
        Field::Area,
        Field::Amount,
        Field::AreaBucket,
        Field::UnitPriceBucket,
        Field::TotalPriceBucket,
    ];

    /// Physical column name in the scraped tables.
    pub fn column_name(&self) -> &'static str {
        match self {
            Field::Week => "星期",
            Field::YearMonth => "年月",
            Field::Usage => "功能",
            Field::Plate => "板块",
            Field::Zone => "片区",
            Field::PopName => "popularizename",
            Field::PrjName => "projectname",
            Field::Area => "面积",
            Field::Amount => "金额",
            Field::AreaBucket => "面积段",
            Field::UnitPriceBucket => "单价段",
            Field::TotalPriceBucket => "总价段",
        }
    }
}

// ---------------------------------------------------------------------------
// ColumnRef
// ---------------------------------------------------------------------------

/// A column known to exist in a reflected table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: String,
    pub name: String,
    pub data_type: String,
}

impl ColumnRef {
    /// Double-quoted identifier for SQL.
    pub fn quoted(&self) -> String {
        quote_ident(&self.name)
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// ---------------------------------------------------------------------------
// TableSchema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: String,
    columns: Vec<ColumnRef>,
    fields: HashMap<Field, ColumnRef>,
}

impl TableSchema {
    pub(crate) fn new(name: String, columns: Vec<ColumnRef>) -> Self {
        let fields = Field::ALL
            .iter()
            .filter_map(|f| {
                columns
                    .iter()
                    .find(|c| c.name == f.column_name())
                    .map(|c| (*f, c.clone()))
            })
            .collect();
        Self {
            name,
            columns,
            fields,
        }
    }

    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    pub fn has_field(&self, field: Field) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn field(&self, field: Field) -> Result<&ColumnRef> {
        self.fields
            .get(&field)
            .ok_or_else(|| WinsunError::UnknownColumn {
                table: self.name.clone(),
                column: field.column_name().to_string(),
            })
    }

    /// Validate an arbitrary column name (measures such as `件数`).
    pub fn column(&self, name: &str) -> Result<&ColumnRef> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| WinsunError::UnknownColumn {
                table: self.name.clone(),
                column: name.to_string(),
            })
    }

    /// Period column for this table: week tables carry `星期`, others `年月`.
    pub fn period_field(&self) -> Field {
        if self.name.contains("week") {
            Field::Week
        } else {
            Field::YearMonth
        }
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Schema {
    tables: BTreeMap<String, TableSchema>,
}

impl Schema {
    /// Read every table in the `main` schema with its ordered columns.
    pub fn reflect(conn: &Connection) -> Result<Self> {
        let table = conn.execute_table(
            "SELECT table_name, column_name, data_type \
             FROM information_schema.columns \
             WHERE table_schema = 'main' \
             ORDER BY table_name, ordinal_position",
            &[],
        )?;

        let mut grouped: BTreeMap<String, Vec<ColumnRef>> = BTreeMap::new();
        for row in &table.rows {
            let get = |i: usize| {
                row.get(i)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string()
            };
            let table_name = get(0);
            grouped.entry(table_name.clone()).or_default().push(ColumnRef {
                table: table_name,
                name: get(1),
                data_type: get(2),
            });
        }

        let tables: BTreeMap<String, TableSchema> = grouped
            .into_iter()
            .map(|(name, cols)| (name.clone(), TableSchema::new(name, cols)))
            .collect();
        log::info!("Reflected {} tables", tables.len());

        Ok(Self { tables })
    }

    pub fn table(&self, name: &str) -> Result<&TableSchema> {
        self.tables
            .get(name)
            .ok_or_else(|| WinsunError::NotFound(format!("table '{}'", name)))
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(|k| k.as_str()).collect()
    }
}
