//! Event capture: routes the global build event stream into per-build artifacts.
//!
//! - **event**: the event model delivered by the build engine
//! - **sink**: isolated write targets, one per captured context
//! - **paths**: unique artifact path allocation
//! - **listing**: the collection that receives captured builds
//! - **demux**: the demultiplexer tying them together

pub mod demux;
pub mod event;
pub mod listing;
pub mod paths;
pub mod sink;

// Re-export key types
pub use demux::EventDemultiplexer;
pub use event::{BuildEvent, ContextId, EventKind, EventPayload, Importance};
pub use listing::BuildListing;
pub use paths::{ArtifactPathGenerator, UuidPathGenerator};
pub use sink::{JsonlSink, JsonlSinkFactory, LogSink, SinkFactory, SinkOptions, Verbosity};
