//! ALE Analysis API
//!
//! Shared data types for the analysis engine and its clients:
//! - Scope identifiers, descriptors and file events
//! - Analysis configuration and results
//! - Issues reported by analyzers
//! - Plugin descriptions
//! - Progress reporting
//!
//! This crate carries no engine logic; it mirrors the boundary between the
//! scheduler and the callers that feed it work.

#![warn(unreachable_pub)]

pub mod analysis;
pub mod config;
pub mod plugin;
pub mod progress;
pub mod scope;

// Re-exports for convenience
pub use analysis::{
    AnalysisConfig, AnalysisConfigBuilder, AnalysisResults, Issue, IssueSink, Severity, TextRange,
};
pub use config::EngineConfig;
pub use plugin::{PluginInfo, PluginSet};
pub use progress::{NoProgress, ProgressSink};
pub use scope::{DescriptorError, FileEvent, FileEventKind, ScopeDescriptor, ScopeId, SourceFile};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
