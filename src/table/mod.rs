//! Build table: the live listing of captured builds and how its columns render.

pub mod columns;
pub mod source;

pub use columns::{BuildRow, DEFAULT_COLUMNS};
pub use source::BuildTable;
