//! Storage layer: JSONL event streams and artifacts, CSV listing export.

pub mod csv;
pub mod jsonl;

// Re-export key types
pub use self::csv::CsvExporter;
pub use jsonl::{ARTIFACT_FORMAT_VERSION, ArtifactHeader, JsonlEventLog, read_artifact};
