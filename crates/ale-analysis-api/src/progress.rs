//! Progress reporting
//!
//! An optional sink passed through to commands for user-visible progress.
//! The engine forwards it unchanged and never interprets its contents.

/// Sink for user-visible progress and diagnostics
pub trait ProgressSink: Send + Sync {
    /// Report a progress message
    fn message(&self, text: &str);

    /// Report fractional completion in `[0.0, 1.0]`
    fn fraction(&self, _fraction: f32) {}
}

/// Progress sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn message(&self, _text: &str) {}
}
