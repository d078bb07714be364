//! Fetch, archive and load raw market records.
//!
//! Records arrive as a JSON array per (granularity, period, table). The raw
//! text is archived under `{root}/{granularity}_{table}/{period_key}.json`
//! before being inserted, so a failed load can be replayed offline.

use crate::config;
use crate::connection::Connection;
use crate::error::{Result, WinsunError};
use crate::period::Granularity;
use crate::schema::Schema;
use chrono::NaiveDate;
use duckdb::types::Value as DbValue;
use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, REFERER, USER_AGENT};
use serde_json::{Map, Value};
use std::fs;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::time::Duration;

const BOM: &[u8] = b"\xef\xbb\xbf";

pub type Record = Map<String, Value>;

// ---------------------------------------------------------------------------
// PortalClient
// ---------------------------------------------------------------------------

/// HTTP client for the data-export endpoint.
///
/// The portal requires a logged-in session; the cookie string is copied from
/// a browser session by the operator.
pub struct PortalClient {
    client: Client,
}

impl PortalClient {
    pub fn new(cookie: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(
                "Mozilla/5.0 (Windows NT 10.0; WOW64) AppleWebKit/537.36 (KHTML, like Gecko)",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-CN,zh;q=0.9"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(
            REFERER,
            HeaderValue::from_str(&format!("{}/", config::PORTAL_URL))
                .map_err(|e| WinsunError::InvalidArgument(e.to_string()))?,
        );
        headers.insert(
            COOKIE,
            HeaderValue::from_str(cookie)
                .map_err(|e| WinsunError::InvalidArgument(format!("invalid cookie: {}", e)))?,
        );

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch the raw JSON text for one table and period.
    pub fn fetch(&self, granularity: Granularity, period_key: &str, table: &str) -> Result<String> {
        let resp = self
            .client
            .get(config::DATA_URL)
            .query(&[
                ("type", granularity.as_str()),
                ("t1", period_key),
                ("t2", period_key),
                ("t", table),
            ])
            .send()?
            .error_for_status()?;
        let bytes = resp.bytes()?;
        log::info!("Fetched {} {} {}", granularity, table, period_key);
        Ok(String::from_utf8_lossy(strip_bom(&bytes)).into_owned())
    }
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(BOM).unwrap_or(bytes)
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

/// On-disk copies of fetched JSON text.
#[derive(Debug, Clone)]
pub struct Archive {
    pub root: PathBuf,
}

impl Archive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, granularity: Granularity, period_key: &str, table: &str) -> PathBuf {
        self.root
            .join(format!("{}_{}", granularity, table))
            .join(format!("{}.json", period_key))
    }

    pub fn write(
        &self,
        text: &str,
        granularity: Granularity,
        period_key: &str,
        table: &str,
    ) -> Result<PathBuf> {
        let path = self.path(granularity, period_key, table);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, text)?;
        log::info!("Archived {} {} {} to {}", granularity, table, period_key, path.display());
        Ok(path)
    }

    /// Read archived text; a `.json.gz` copy is decompressed transparently.
    pub fn load(&self, granularity: Granularity, period_key: &str, table: &str) -> Result<String> {
        let path = self.path(granularity, period_key, table);
        if path.exists() {
            let bytes = fs::read(&path)?;
            return Ok(String::from_utf8_lossy(strip_bom(&bytes)).into_owned());
        }

        let gz = path.with_extension("json.gz");
        if gz.exists() {
            let mut decoder = BufReader::new(GzDecoder::new(BufReader::new(fs::File::open(&gz)?)));
            let mut bytes = Vec::new();
            decoder.read_to_end(&mut bytes)?;
            return Ok(String::from_utf8_lossy(strip_bom(&bytes)).into_owned());
        }

        Err(WinsunError::NotFound(format!(
            "no archive for {} {} {} at {}",
            granularity,
            table,
            period_key,
            path.display()
        )))
    }
}

// ---------------------------------------------------------------------------
// Record conversion
// ---------------------------------------------------------------------------

/// Parse the portal's JSON array of records.
pub fn parse_records(text: &str) -> Result<Vec<Record>> {
    Ok(serde_json::from_str(text)?)
}

/// Parse a `YYYY-MM-DD` date, ignoring any time part.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let day = s.split([' ', 'T']).next().unwrap_or_default();
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| WinsunError::InvalidArgument(format!("bad date '{}': {}", s, e)))
}

fn to_db_value(column: &str, value: &Value) -> Result<DbValue> {
    if config::DATE_FIELDS.contains(&column) {
        if let Value::String(s) = value {
            let date = parse_date(s)?;
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
            return Ok(DbValue::Date32((date - epoch).num_days() as i32));
        }
    }
    Ok(match value {
        Value::Null => DbValue::Null,
        Value::Bool(b) => DbValue::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => DbValue::BigInt(i),
            None => DbValue::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => DbValue::Text(s.clone()),
        other => DbValue::Text(other.to_string()),
    })
}

/// Column list and row values for `records`, restricted to columns the
/// table has. Fields the table lacks are dropped with a warning.
pub fn to_rows(
    schema: &Schema,
    table: &str,
    records: &[Record],
) -> Result<(Vec<String>, Vec<Vec<DbValue>>)> {
    let table_schema = schema.table(table)?;

    let mut columns: Vec<String> = Vec::new();
    let mut skipped: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if columns.contains(key) || skipped.contains(key) {
                continue;
            }
            if table_schema.column(key).is_ok() {
                columns.push(key.clone());
            } else {
                skipped.push(key.clone());
            }
        }
    }
    if !skipped.is_empty() {
        log::warn!("Table {} has no columns for fields {:?}", table, skipped);
    }

    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let mut row = Vec::with_capacity(columns.len());
        for col in &columns {
            row.push(match record.get(col) {
                Some(v) => to_db_value(col, v)?,
                None => DbValue::Null,
            });
        }
        rows.push(row);
    }

    Ok((columns, rows))
}

// ---------------------------------------------------------------------------
// Ingestor
// ---------------------------------------------------------------------------

/// Fetch → archive → insert for the market tables.
pub struct Ingestor<'a> {
    conn: &'a Connection,
    schema: &'a Schema,
    archive: Archive,
    client: Option<PortalClient>,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        conn: &'a Connection,
        schema: &'a Schema,
        archive: Archive,
        client: Option<PortalClient>,
    ) -> Self {
        Self {
            conn,
            schema,
            archive,
            client,
        }
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    /// Fetch one table's text and archive it.
    pub fn get_write(&self, granularity: Granularity, period_key: &str, table: &str) -> Result<String> {
        let client = self.client.as_ref().ok_or_else(|| {
            WinsunError::InvalidArgument("no portal client configured; use replay".into())
        })?;
        let text = client.fetch(granularity, period_key, table)?;
        self.archive.write(&text, granularity, period_key, table)?;
        Ok(text)
    }

    /// Insert the records in `text` into `{granularity}_{table}` as one
    /// transaction. Returns the number of rows inserted.
    pub fn insert(&self, granularity: Granularity, table: &str, text: &str) -> Result<usize> {
        let name = format!("{}_{}", granularity, table);
        let records = parse_records(text)?;
        let (columns, rows) = to_rows(self.schema, &name, &records)?;
        let n = self.conn.insert_batch(&name, &columns, &rows)?;
        log::info!("Inserted {} records into {}", n, name);
        Ok(n)
    }

    /// Fetch, archive and insert one table.
    pub fn get_write_update(
        &self,
        granularity: Granularity,
        period_key: &str,
        table: &str,
    ) -> Result<usize> {
        let text = self.get_write(granularity, period_key, table)?;
        self.insert(granularity, table, &text)
    }

    /// Insert one table from its archived text.
    pub fn replay(&self, granularity: Granularity, period_key: &str, table: &str) -> Result<usize> {
        let text = self.archive.load(granularity, period_key, table)?;
        self.insert(granularity, table, &text)
    }

    /// Fetch, archive and insert listings, subscriptions and sales for one
    /// period. Stops at the first failing table.
    pub fn update_period(&self, granularity: Granularity, period_key: &str) -> Result<usize> {
        let mut total = 0;
        for table in config::MARKET_TABLES {
            total += self.get_write_update(granularity, period_key, table)?;
        }
        Ok(total)
    }
}
