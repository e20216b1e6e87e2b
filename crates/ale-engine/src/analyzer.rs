//! Collaborator seams toward the analysis subsystem
//!
//! The scheduler never runs detection rules or loads plugins itself; it
//! drives implementations of these traits, supplied by the excluded
//! analysis/plugin layers.

use crate::cancel::CancelToken;
use crate::error::EngineError;
use crate::scope::ScopeContext;
use ale_analysis_api::{
    AnalysisConfig, AnalysisResults, EngineConfig, FileEvent, IssueSink, PluginSet, ProgressSink,
};

/// The per-scope analysis capability supplied by the plugin subsystem
///
/// `analyze` must poll the supplied token and honor cancellation promptly;
/// the engine will not terminate it forcefully outside of shutdown.
#[async_trait::async_trait]
pub trait Analyzer: Send + Sync {
    /// Run one analysis inside the given scope context
    async fn analyze(
        &self,
        scope: &ScopeContext,
        config: &AnalysisConfig,
        sink: &IssueSink,
        progress: &dyn ProgressSink,
        token: &CancelToken,
    ) -> Result<AnalysisResults, EngineError>;

    /// Called once when a scope context comes to life
    fn scope_started(&self, _scope: &ScopeContext) -> Result<(), EngineError> {
        Ok(())
    }

    /// Called exactly once when a scope context is released
    fn scope_stopped(&self, _scope: &ScopeContext) -> Result<(), EngineError> {
        Ok(())
    }

    /// A file event was forwarded to a registered scope
    fn file_event(&self, _scope: &ScopeContext, _event: &FileEvent) {}
}

/// Builds the engine's analyzer state from a plugin set
///
/// Invoked once at engine start and again on every plugin reset; the engine
/// swaps the result in wholesale rather than mutating analyzer state in
/// place.
pub trait AnalyzerFactory: Send + Sync {
    /// Build an analyzer for the given plugin set
    fn create(
        &self,
        config: &EngineConfig,
        plugins: &PluginSet,
    ) -> Result<Box<dyn Analyzer>, EngineError>;
}

/// Source of the currently available plugin set
pub trait PluginProvider: Send + Sync {
    /// The plugins a reset should rebuild the analyzer from
    fn current_plugins(&self) -> PluginSet;
}
