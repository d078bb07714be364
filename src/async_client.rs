//! Async wrapper around [`MarketDb`] for use in async runtimes (Tokio, etc.).
//!
//! Runs every operation on the blocking thread pool via
//! [`tokio::task::spawn_blocking`], keeping the async event loop free.
//!
//! # Example
//!
//! ```no_run
//! use winsun_market::{AsyncMarketDb, FilterCriteria, Granularity, MarketDb, OutputBy};
//!
//! # async fn example() -> winsun_market::Result<()> {
//! let db = AsyncMarketDb::new(MarketDb::builder().build()?);
//!
//! let text = db
//!     .run(|d| {
//!         let gxj = d.gxj(OutputBy::Trend, Granularity::Week, 10, FilterCriteria::new())?;
//!         Ok(gxj.shuoli(2, None)?.full_text())
//!     })
//!     .await?;
//! println!("{text}");
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{Result, WinsunError};
use crate::MarketDb;

/// Async wrapper around [`MarketDb`].
///
/// The underlying [`MarketDb`] is protected by a [`Mutex`]; a DuckDB
/// connection must not be used from two threads at once.
#[derive(Clone)]
pub struct AsyncMarketDb {
    inner: Arc<Mutex<MarketDb>>,
}

impl AsyncMarketDb {
    pub fn new(db: MarketDb) -> Self {
        Self {
            inner: Arc::new(Mutex::new(db)),
        }
    }

    /// Run a sync operation on the blocking thread pool.
    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&MarketDb) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|_| WinsunError::InvalidArgument("database lock poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| WinsunError::InvalidArgument(format!("Task join error: {e}")))?
    }

    /// Execute a raw SQL query asynchronously.
    pub async fn sql(
        &self,
        query: &str,
        params: &[String],
    ) -> Result<Vec<HashMap<String, serde_json::Value>>> {
        let query = query.to_string();
        let params = params.to_vec();
        self.run(move |d| d.sql(&query, &params)).await
    }

    /// Re-read the schema asynchronously.
    pub async fn reflect(&self) -> Result<()> {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = db
                .lock()
                .map_err(|_| WinsunError::InvalidArgument("database lock poisoned".into()))?;
            guard.reflect()
        })
        .await
        .map_err(|e| WinsunError::InvalidArgument(format!("Task join error: {e}")))?
    }
}
