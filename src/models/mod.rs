pub mod report;
pub mod table;

pub use report::*;
pub use table::*;
