//! Error types for the analysis engine
//!
//! Completion handles resolve to `Result<T, EngineError>`. Cancellation and
//! interruption are dedicated variants rather than failures of the command's
//! own logic, so callers can tell the three apart with the predicates below.

use ale_analysis_api::DescriptorError;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine no longer accepts work
    #[error("engine is stopped")]
    Stopped,

    /// The operation was cancelled before or while it ran
    #[error("operation cancelled")]
    Cancelled,

    /// The worker was forcefully interrupted while the operation ran
    #[error("worker interrupted")]
    Interrupted,

    /// Scope descriptor failed validation
    #[error("invalid scope descriptor: {0}")]
    InvalidDescriptor(#[from] DescriptorError),

    /// No scope registered under the given key
    #[error("no scope registered for key '{0}'")]
    UnknownScope(String),

    /// The analyzer reported a failure
    #[error("analysis failed: {0}")]
    AnalysisFailed(String),

    /// Releasing a scope execution context failed
    #[error("scope release failed: {0}")]
    ScopeRelease(String),

    /// Rebuilding the analyzer from a new plugin set failed
    #[error("plugin reload failed: {0}")]
    PluginReload(String),

    /// A failure whose cleanup also failed; the primary cause is preserved
    /// and the cleanup failure is attached as a secondary cause
    #[error("{primary}; scope release also failed: {secondary}")]
    WithSecondary {
        /// The original failure
        primary: Box<EngineError>,
        /// The cleanup failure that followed it
        secondary: Box<EngineError>,
    },
}

impl EngineError {
    /// Chain a cleanup failure behind a primary one
    #[inline]
    #[must_use]
    pub fn with_secondary(self, secondary: EngineError) -> Self {
        Self::WithSecondary {
            primary: Box::new(self),
            secondary: Box::new(secondary),
        }
    }

    /// The primary cause, unwrapping a secondary chain if present
    #[must_use]
    pub fn primary(&self) -> &EngineError {
        match self {
            Self::WithSecondary { primary, .. } => primary.primary(),
            other => other,
        }
    }

    /// True when the operation was cancelled cooperatively
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True when the worker was forcefully interrupted
    #[inline]
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}
