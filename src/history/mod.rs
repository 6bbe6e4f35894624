pub mod query;
pub mod range;

pub use query::{query, HistoryRow};
pub use range::{parse_timezone, resolve, TimeWindow};
