//! Query layer over the market tables.
//!
//! Each module works against a borrowed [`Connection`](crate::connection::Connection)
//! and [`Schema`](crate::schema::Schema): filtering and grouping plans,
//! range cross-tabulation, supply/sales/price reports, trend narration and
//! rankings.

pub mod filter;
pub mod gxj;
pub mod narrative;
pub mod query;
pub mod range;
pub mod rank;
pub mod shuoli;

pub use filter::{Criterion, FilterCriteria};
pub use gxj::{average_price, Gxj, OutputBy};
pub use narrative::{Chinese, Comparison, Direction, Narrator};
pub use query::{Columns, Query};
pub use range::{BucketKind, RangeClassifier, RangeSet};
pub use rank::rank;
pub use shuoli::{change, gr2change, growth_rate, Shuoli};
