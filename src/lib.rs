//! Nanjing housing-market data in DuckDB.
//!
//! Weekly and monthly listing (上市), subscription and sale (成交) records are
//! stored in DuckDB tables named `{granularity}_{kind}` together with the
//! area, unit-price and total-price bucket lookup tables. This crate filters
//! and aggregates them, cross-tabulates bucketed volumes, assembles
//! supply/sales/price reports and narrates their trends.
//!
//! # Quick start
//!
//! ```no_run
//! use winsun_market::{FilterCriteria, Granularity, MarketDb, OutputBy};
//!
//! let db = MarketDb::builder().database("winsun.duckdb").build().unwrap();
//!
//! let criteria = FilterCriteria::new().usage(winsun_market::config::spzz());
//! let gxj = db.gxj(OutputBy::Trend, Granularity::Week, 10, criteria).unwrap();
//! println!("{}", gxj.shuoli(2, None).unwrap().full_text());
//! ```

#[cfg(feature = "async")]
pub mod async_client;
pub mod config;
pub mod connection;
pub mod error;
pub mod ingest;
pub mod models;
pub mod period;
pub mod queries;
pub mod schema;
pub mod sql_builder;

#[cfg(feature = "async")]
pub use async_client::AsyncMarketDb;
pub use connection::Connection;
pub use error::{Result, WinsunError};
pub use ingest::{Archive, Ingestor, PortalClient};
pub use models::{CrossTab, Metric, Report, ReportRow, Table};
pub use period::{CalendarResolver, Granularity, PeriodKey, PeriodResolver, PeriodWindow};
pub use queries::{
    BucketKind, Columns, Criterion, FilterCriteria, Gxj, OutputBy, Query, Shuoli,
};
pub use schema::{Field, Schema};
pub use sql_builder::SqlBuilder;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// MarketDbBuilder
// ---------------------------------------------------------------------------

/// Builder for configuring and constructing a [`MarketDb`].
///
/// Use [`MarketDb::builder()`] to obtain a builder, chain configuration
/// methods, and call [`build()`](MarketDbBuilder::build).
#[derive(Default)]
pub struct MarketDbBuilder {
    database: Option<PathBuf>,
    in_memory: bool,
    connection: Option<Connection>,
    data_root: Option<PathBuf>,
    resolver: Option<Box<dyn PeriodResolver + Send>>,
}

impl MarketDbBuilder {
    /// Open this database file instead of the default one.
    ///
    /// If not set, `winsun.duckdb` under the platform data directory is used
    /// (e.g. `~/.local/share/winsun-market` on Linux).
    pub fn database<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.database = Some(path.as_ref().to_path_buf());
        self
    }

    /// Use a fresh in-memory database. Tables must be created before they
    /// can be queried; call [`MarketDb::reflect`] afterwards.
    pub fn in_memory(mut self, in_memory: bool) -> Self {
        self.in_memory = in_memory;
        self
    }

    /// Use an already opened connection.
    pub fn connection(mut self, conn: Connection) -> Self {
        self.connection = Some(conn);
        self
    }

    /// Root directory of the raw JSON archive.
    pub fn data_root<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Resolve reporting periods with `resolver` instead of today's calendar.
    pub fn resolver<R: PeriodResolver + Send + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Open the database and read its schema.
    pub fn build(self) -> Result<MarketDb> {
        let conn = match (self.connection, self.in_memory) {
            (Some(conn), _) => conn,
            (None, true) => Connection::open_in_memory()?,
            (None, false) => {
                let path = self.database.unwrap_or_else(config::default_database_path);
                Connection::open(path)?
            }
        };
        let schema = Schema::reflect(&conn)?;
        Ok(MarketDb {
            conn,
            schema,
            resolver: self
                .resolver
                .unwrap_or_else(|| Box::new(CalendarResolver::today())),
            data_root: self.data_root.unwrap_or_else(config::default_data_root),
        })
    }
}

// ---------------------------------------------------------------------------
// MarketDb
// ---------------------------------------------------------------------------

/// The main entry point.
///
/// Owns the [`Connection`], the reflected [`Schema`] and the period resolver,
/// and hands out lightweight borrowing query interfaces.
pub struct MarketDb {
    conn: Connection,
    schema: Schema,
    resolver: Box<dyn PeriodResolver + Send>,
    data_root: PathBuf,
}

impl MarketDb {
    pub fn builder() -> MarketDbBuilder {
        MarketDbBuilder::default()
    }

    // -- Query accessors ---------------------------------------------------

    /// Start a filter/group plan over `table`.
    pub fn query(&self, table: &str) -> Result<Query<'_>> {
        Query::new(&self.conn, &self.schema, table)
    }

    /// Supply/sales/price report over the last `period` periods.
    pub fn gxj(
        &self,
        output_by: OutputBy,
        granularity: Granularity,
        period: u32,
        criteria: FilterCriteria,
    ) -> Result<Gxj<'_>> {
        Gxj::new(
            &self.conn,
            &self.schema,
            self.resolver.as_ref(),
            output_by,
            granularity,
            period,
            criteria,
        )
    }

    /// Rank groups of `table` over the last `period` periods.
    ///
    /// See [`queries::rank::rank`].
    pub fn rank(
        &self,
        table: &str,
        period: u32,
        group_by: impl Into<Columns>,
        outputs: impl Into<Columns>,
        criteria: &FilterCriteria,
    ) -> Result<Table> {
        queries::rank(
            &self.conn,
            &self.schema,
            self.resolver.as_ref(),
            table,
            period,
            group_by,
            outputs,
            criteria,
        )
    }

    /// The `count` most recent reporting periods.
    pub fn resolve(&self, granularity: Granularity, count: u32) -> Result<PeriodWindow> {
        self.resolver.resolve(granularity, count)
    }

    // -- Ingest ------------------------------------------------------------

    pub fn archive(&self) -> Archive {
        Archive::new(&self.data_root)
    }

    /// Loader writing into this database. Without a client only archived
    /// text can be replayed.
    pub fn ingestor(&self, client: Option<PortalClient>) -> Ingestor<'_> {
        Ingestor::new(&self.conn, &self.schema, self.archive(), client)
    }

    // -- Metadata and utility methods --------------------------------------

    /// Re-read the schema after tables were created or altered.
    pub fn reflect(&mut self) -> Result<()> {
        self.schema = Schema::reflect(&self.conn)?;
        Ok(())
    }

    /// Execute a raw SQL query with `?` positional placeholders.
    pub fn sql(
        &self,
        query: &str,
        params: &[String],
    ) -> Result<Vec<HashMap<String, serde_json::Value>>> {
        self.conn.execute(query, params)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Consume the database handle and release the connection.
    pub fn close(self) {
        drop(self);
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for MarketDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MarketDb(data_root={}, tables=[{}])",
            self.data_root.display(),
            self.schema.table_names().join(", ")
        )
    }
}
