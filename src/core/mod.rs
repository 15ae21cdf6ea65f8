//! Core types: the build record state machine, its field surface, and capture configuration.

pub mod config;
pub mod field;
pub mod handle;
pub mod record;

// Re-export key types for convenience
pub use config::CaptureConfig;
pub use field::{BuildField, FieldValue};
pub use handle::BuildHandle;
pub use record::{BuildKind, BuildRecord, BuildStatus};
