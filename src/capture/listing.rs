use crate::core::BuildHandle;

/// Live collection that receives captured builds.
///
/// Implementations must be callable from any thread. `add_entry` runs while
/// the demultiplexer holds its capture lock, so it must not call back into the
/// demultiplexer.
pub trait BuildListing: Send + Sync {
    /// Whether new builds should currently be captured.
    fn is_logging(&self) -> bool;

    /// Publish a newly started build.
    fn add_entry(&self, build: BuildHandle);

    /// A published build changed state (re-sort / re-render).
    fn notify_change(&self);
}
