//! Command variants and their worker-side execution
//!
//! A command is an immutable unit of schedulable work. Every variant runs
//! synchronously inside the worker loop against the scope registry; nested
//! async calls are allowed but must honor the operation's cancel token.

use crate::cancel::CancelToken;
use crate::engine::{EngineShared, WorkerState};
use crate::error::EngineError;
use crate::pending::CommandOutput;
use crate::scope::ScopeContext;
use ale_analysis_api::{
    AnalysisConfig, AnalysisResults, FileEvent, Issue, IssueSink, NoProgress, PluginSet,
    ProgressSink, ScopeDescriptor, ScopeId,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// A schedulable unit of work
pub enum Command {
    /// Run one analysis, against a registered scope or a transient one
    RunAnalysis {
        /// Target scope; `None` or an unknown id analyzes transiently
        scope: Option<ScopeId>,
        /// What to analyze
        config: AnalysisConfig,
        /// Receives issues as the analyzer streams them
        sink: IssueSink,
        /// Optional user-visible progress reporting, passed through unchanged
        progress: Option<Arc<dyn ProgressSink>>,
    },
    /// Create a persistent scope context
    RegisterScope {
        /// Caller-chosen scope key
        id: ScopeId,
        /// What the scope contains
        descriptor: ScopeDescriptor,
    },
    /// Release a persistent scope context; cancels work targeting it
    UnregisterScope {
        /// Scope key; unknown ids are a no-op
        id: ScopeId,
    },
    /// Forward a file-system event to a registered scope
    NotifyFileEvent {
        /// Scope key; unknown ids are a no-op
        id: ScopeId,
        /// The event
        event: FileEvent,
    },
    /// Rebuild the analyzer from a new plugin set
    ResetPlugins {
        /// The replacement set
        plugins: PluginSet,
    },
    /// Release every scope and make the worker loop exit
    StopEngine,
}

impl Command {
    /// Variant name for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RunAnalysis { .. } => "run-analysis",
            Self::RegisterScope { .. } => "register-scope",
            Self::UnregisterScope { .. } => "unregister-scope",
            Self::NotifyFileEvent { .. } => "notify-file-event",
            Self::ResetPlugins { .. } => "reset-plugins",
            Self::StopEngine => "stop-engine",
        }
    }

    /// The scope whose unregistration invalidates this command
    ///
    /// Matches analyses and file events only: a queued registration must
    /// survive the unregistration of its predecessor.
    #[must_use]
    pub fn cancel_scope(&self) -> Option<&ScopeId> {
        match self {
            Self::RunAnalysis { scope, .. } => scope.as_ref(),
            Self::NotifyFileEvent { id, .. } => Some(id),
            _ => None,
        }
    }

    pub(crate) async fn execute(
        self,
        state: &mut WorkerState,
        shared: &EngineShared,
        token: &CancelToken,
    ) -> Result<CommandOutput, EngineError> {
        match self {
            Self::RunAnalysis {
                scope,
                config,
                sink,
                progress,
            } => run_analysis(state, scope, config, sink, progress, token)
                .await
                .map(CommandOutput::Analysis),
            Self::RegisterScope { id, descriptor } => {
                register_scope(state, id, descriptor).map(|()| CommandOutput::Unit)
            }
            Self::UnregisterScope { id } => {
                unregister_scope(state, shared, &id).map(|()| CommandOutput::Unit)
            }
            Self::NotifyFileEvent { id, event } => {
                notify_file_event(state, &id, &event);
                Ok(CommandOutput::Unit)
            }
            Self::ResetPlugins { plugins } => {
                reset_plugins(state, shared, plugins).map(|()| CommandOutput::Unit)
            }
            Self::StopEngine => {
                stop_engine(state);
                Ok(CommandOutput::Unit)
            }
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("Command");
        debug.field("kind", &self.kind());
        if let Some(scope) = self.cancel_scope() {
            debug.field("scope", &scope.as_str());
        }
        debug.finish()
    }
}

fn register_scope(
    state: &mut WorkerState,
    id: ScopeId,
    descriptor: ScopeDescriptor,
) -> Result<(), EngineError> {
    descriptor.validate()?;

    // a prior context under the same id is released exactly once, before the
    // replacement comes to life; the registration itself still takes effect
    // when that release fails
    if let Some(prior) = state.registry.unregister(&id) {
        if let Err(err) = state.analyzer.scope_stopped(&prior) {
            warn!(scope = %id, error = %err, "release of replaced scope context failed");
        }
    }

    let context = ScopeContext::persistent(id.clone(), descriptor);
    state.analyzer.scope_started(&context)?;

    info!(scope = %id, files = context.file_count(), "scope registered");
    state.registry.register(id, context);
    Ok(())
}

fn unregister_scope(
    state: &mut WorkerState,
    shared: &EngineShared,
    id: &ScopeId,
) -> Result<(), EngineError> {
    if state.registry.get(id).is_none() {
        debug!(scope = %id, "unregister: scope unknown, nothing to do");
        return Ok(());
    }

    // cancel still-queued work targeting the scope, then the in-flight
    // operation if it targets it too; entries stay queued and are skipped
    let marked = shared.cancel_scope(id);
    if marked > 0 {
        debug!(scope = %id, marked, "cancelled pending commands for unregistered scope");
    }

    let context = state
        .registry
        .unregister(id)
        .ok_or_else(|| EngineError::UnknownScope(id.to_string()))?;
    info!(scope = %id, "scope unregistered");
    state.analyzer.scope_stopped(&context)
}

fn notify_file_event(state: &mut WorkerState, id: &ScopeId, event: &FileEvent) {
    match state.registry.get_mut(id) {
        Some(context) => {
            context.apply_file_event(event);
            state.analyzer.file_event(context, event);
        }
        None => debug!(scope = %id, "dropping file event for unknown scope"),
    }
}

async fn run_analysis(
    state: &mut WorkerState,
    scope: Option<ScopeId>,
    config: AnalysisConfig,
    sink: IssueSink,
    progress: Option<Arc<dyn ProgressSink>>,
    token: &CancelToken,
) -> Result<AnalysisResults, EngineError> {
    let started = Instant::now();
    let analysis_id = config.analysis_id;

    if config.input_files.is_empty() {
        info!(%analysis_id, "no files to analyze");
        return Ok(AnalysisResults::empty());
    }

    let issue_count = Arc::new(AtomicUsize::new(0));
    let counting_sink: IssueSink = {
        let count = Arc::clone(&issue_count);
        let inner = Arc::clone(&sink);
        Arc::new(move |issue: Issue| {
            count.fetch_add(1, Ordering::Relaxed);
            inner(issue);
        })
    };
    let progress = progress.unwrap_or_else(|| Arc::new(NoProgress));

    info!(%analysis_id, files = config.input_files.len(), "starting analysis");

    // a known scope id runs against the registered context; anything else
    // runs in a transient context released right after this one analysis
    if let Some(id) = &scope {
        if let Some(context) = state.registry.get(id) {
            let mut results = state
                .analyzer
                .analyze(context, &config, &counting_sink, progress.as_ref(), token)
                .await?;
            results.duration = Some(started.elapsed());
            info!(
                %analysis_id,
                scope = %id,
                issues = issue_count.load(Ordering::Relaxed),
                "analysis finished"
            );
            return Ok(results);
        }
        debug!(%analysis_id, scope = %id, "scope unknown, analyzing in a transient scope");
    }

    let context = state.registry.create_transient(&config);
    state.analyzer.scope_started(&context)?;
    let outcome = state
        .analyzer
        .analyze(&context, &config, &counting_sink, progress.as_ref(), token)
        .await;
    let cleanup = state.analyzer.scope_stopped(&context);

    match (outcome, cleanup) {
        (Ok(mut results), Ok(())) => {
            results.duration = Some(started.elapsed());
            info!(
                %analysis_id,
                issues = issue_count.load(Ordering::Relaxed),
                "analysis finished"
            );
            Ok(results)
        }
        (Ok(_), Err(cleanup_err)) => Err(cleanup_err),
        (Err(primary), Ok(())) => Err(primary),
        // the original failure stays primary, the release failure rides along
        (Err(primary), Err(cleanup_err)) => Err(primary.with_secondary(cleanup_err)),
    }
}

fn reset_plugins(
    state: &mut WorkerState,
    shared: &EngineShared,
    plugins: PluginSet,
) -> Result<(), EngineError> {
    match state.factory.create(&state.config, &plugins) {
        Ok(analyzer) => {
            state.analyzer = analyzer;
            state.plugins = plugins;
            // queued analyses were built against the old plugin set; other
            // pending commands stay
            let stale = shared.queue.remove_analyses();
            let cleared = stale.len();
            for operation in stale {
                operation.resolve_cancelled();
            }
            info!(
                plugins = state.plugins.plugins.len(),
                cleared, "analyzer rebuilt from new plugin set"
            );
            Ok(())
        }
        Err(err) => {
            // surfaced loudly: the caller decides whether to restart the
            // engine; the previous analyzer stays in place
            error!(error = %err, "plugin reload failed, keeping previous analyzer state");
            Err(EngineError::PluginReload(err.to_string()))
        }
    }
}

fn stop_engine(state: &mut WorkerState) {
    for context in state.registry.drain() {
        if let Err(err) = state.analyzer.scope_stopped(&context) {
            let scope = context.id().map(ScopeId::to_string).unwrap_or_default();
            warn!(%scope, error = %err, "scope release failed during engine stop");
        }
    }
}
