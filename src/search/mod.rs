//! Interactive full-text filtering over build rows.

pub mod matcher;
pub mod query;

pub use matcher::{ColumnState, SearchMatcher, TableRow};
pub use query::{SearchQuery, SearchToken};
