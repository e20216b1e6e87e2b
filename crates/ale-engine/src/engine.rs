//! The engine facade and its single worker loop
//!
//! [`Engine::start`] builds the analyzer through the supplied factory and
//! spawns one tokio task that owns every piece of mutable scheduling state.
//! All public methods only touch the shared queue, the lifecycle state and
//! the in-flight token; nothing outside the worker ever sees the registry or
//! the analyzer.

use crate::analyzer::{Analyzer, AnalyzerFactory, PluginProvider};
use crate::cancel::CancelToken;
use crate::command::Command;
use crate::error::EngineError;
use crate::pending::{
    map_analysis, map_raw, map_unit, CommandOutput, Completion, PendingOperation,
};
use crate::queue::CommandQueue;
use crate::scope::ScopeRegistry;
use ale_analysis_api::{
    AnalysisConfig, AnalysisResults, EngineConfig, FileEvent, IssueSink, PluginSet,
    ProgressSink, ScopeDescriptor, ScopeId,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Built but the worker has not started yet
    Created,
    /// Accepting and executing commands
    Running,
    /// Graceful stop requested; no further submissions accepted
    Stopping,
    /// The worker loop has exited
    Stopped,
}

/// Everything the worker loop owns exclusively
pub(crate) struct WorkerState {
    pub(crate) config: EngineConfig,
    pub(crate) registry: ScopeRegistry,
    pub(crate) analyzer: Box<dyn Analyzer>,
    pub(crate) factory: Arc<dyn AnalyzerFactory>,
    pub(crate) plugins: PluginSet,
}

struct ExecutingOp {
    scope: Option<ScopeId>,
    token: CancelToken,
}

/// State reachable from both the facade and the worker
pub(crate) struct EngineShared {
    pub(crate) queue: CommandQueue,
    executing: Mutex<Option<ExecutingOp>>,
    state: Mutex<EngineState>,
}

impl EngineShared {
    fn new() -> Self {
        Self {
            queue: CommandQueue::new(),
            executing: Mutex::new(None),
            state: Mutex::new(EngineState::Created),
        }
    }

    /// Mark queued commands targeting `scope` cancelled, plus the in-flight
    /// one when it targets the same scope; returns how many tokens were hit
    pub(crate) fn cancel_scope(&self, scope: &ScopeId) -> usize {
        let mut marked = self.queue.cancel_scope(scope);
        // the token is cloned out of the lock: its cancel callbacks may
        // re-enter the engine
        let inflight = {
            let executing = self.executing.lock();
            executing
                .as_ref()
                .filter(|current| current.scope.as_ref() == Some(scope))
                .map(|current| current.token.clone())
        };
        if let Some(token) = inflight {
            token.cancel();
            marked += 1;
        }
        marked
    }
}

/// Ordered, cancellable, single-writer command scheduler
///
/// Commands submitted from any task execute strictly in submission order on
/// one worker. Each submission hands back a [`Completion`] that resolves to
/// the command's result, to [`EngineError::Cancelled`], or to
/// [`EngineError::Interrupted`].
pub struct Engine {
    shared: Arc<EngineShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Build the analyzer from `plugins` and start the worker loop
    ///
    /// Fails without spawning anything when the factory cannot build an
    /// analyzer for the initial plugin set.
    pub fn start(
        config: EngineConfig,
        plugins: PluginSet,
        factory: Arc<dyn AnalyzerFactory>,
    ) -> Result<Self, EngineError> {
        let analyzer = factory.create(&config, &plugins)?;
        let state = WorkerState {
            config,
            registry: ScopeRegistry::new(),
            analyzer,
            factory,
            plugins,
        };

        let shared = Arc::new(EngineShared::new());
        *shared.state.lock() = EngineState::Running;
        let worker = tokio::spawn(worker_loop(Arc::clone(&shared), state));
        info!("analysis engine started");

        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> EngineState {
        *self.shared.state.lock()
    }

    /// Enqueue a command for execution
    ///
    /// Never blocks. Fails fast with [`EngineError::Stopped`] once a stop has
    /// been requested.
    pub fn submit(&self, command: Command) -> Result<Completion<CommandOutput>, EngineError> {
        self.submit_with(command, map_raw)
    }

    fn submit_with<T>(
        &self,
        command: Command,
        map: fn(CommandOutput) -> T,
    ) -> Result<Completion<T>, EngineError> {
        // the state lock is held across the push so a concurrent stop cannot
        // drain the queue between the check and the enqueue
        let state = self.shared.state.lock();
        if *state != EngineState::Running {
            return Err(EngineError::Stopped);
        }
        let (completion, completer) = Completion::new(map);
        let seq = self.shared.queue.push(PendingOperation {
            seq: 0,
            command,
            token: CancelToken::new(),
            completer,
        });
        drop(state);
        debug!(seq, "command submitted");
        Ok(completion)
    }

    /// Create a persistent scope context under `id`
    pub fn register_scope(
        &self,
        id: ScopeId,
        descriptor: ScopeDescriptor,
    ) -> Result<Completion<()>, EngineError> {
        self.submit_with(Command::RegisterScope { id, descriptor }, map_unit)
    }

    /// Release the scope registered under `id`, cancelling work targeting it
    pub fn unregister_scope(&self, id: ScopeId) -> Result<Completion<()>, EngineError> {
        self.submit_with(Command::UnregisterScope { id }, map_unit)
    }

    /// Forward a client file event to the scope registered under `id`
    pub fn notify_file_event(
        &self,
        id: ScopeId,
        event: FileEvent,
    ) -> Result<Completion<()>, EngineError> {
        self.submit_with(Command::NotifyFileEvent { id, event }, map_unit)
    }

    /// Enqueue one analysis
    ///
    /// With `scope` set to a registered id the analysis runs against that
    /// scope's context; otherwise a transient context is created for this
    /// single analysis and released right after it.
    pub fn run_analysis(
        &self,
        scope: Option<ScopeId>,
        config: AnalysisConfig,
        sink: IssueSink,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<Completion<AnalysisResults>, EngineError> {
        self.submit_with(
            Command::RunAnalysis {
                scope,
                config,
                sink,
                progress,
            },
            map_analysis,
        )
    }

    /// Rebuild the analyzer from the given plugin set
    pub fn reset_plugins(&self, plugins: PluginSet) -> Result<Completion<()>, EngineError> {
        self.submit_with(Command::ResetPlugins { plugins }, map_unit)
    }

    /// Rebuild the analyzer from whatever the provider currently reports
    pub fn reset_plugins_from(
        &self,
        provider: &dyn PluginProvider,
    ) -> Result<Completion<()>, EngineError> {
        self.reset_plugins(provider.current_plugins())
    }

    /// Cancel queued and in-flight work targeting `scope` without touching
    /// the scope registration itself; returns how many tokens were marked
    pub fn cancel(&self, scope: &ScopeId) -> usize {
        self.shared.cancel_scope(scope)
    }

    /// Graceful shutdown
    ///
    /// Rejects further submissions, resolves everything still queued as
    /// cancelled, cancels the in-flight token and enqueues the final
    /// stop command. The returned completion resolves once every scope has
    /// been released and the worker loop has exited. Repeat calls return an
    /// already-resolved completion.
    pub fn stop(&self) -> Completion<()> {
        {
            let mut state = self.shared.state.lock();
            match *state {
                EngineState::Stopping | EngineState::Stopped => {
                    return Completion::ready(Ok(CommandOutput::Unit), map_unit);
                }
                _ => *state = EngineState::Stopping,
            }
        }
        info!("engine stop requested");

        let drained = self.shared.queue.drain();
        if !drained.is_empty() {
            debug!(count = drained.len(), "cancelling queued commands on stop");
        }
        for operation in drained {
            operation.resolve_cancelled();
        }
        let inflight = self
            .shared
            .executing
            .lock()
            .as_ref()
            .map(|current| current.token.clone());
        if let Some(token) = inflight {
            token.cancel();
        }

        // bypasses submit's state check: this is the one command allowed in
        // past the STOPPING gate
        let (completion, completer) = Completion::new(map_unit);
        self.shared.queue.push(PendingOperation {
            seq: 0,
            command: Command::StopEngine,
            token: CancelToken::new(),
            completer,
        });
        completion
    }

    /// Forceful shutdown
    ///
    /// Cancels the in-flight token, aborts the worker task and resolves any
    /// queue remnants as cancelled. An operation that was executing resolves
    /// as [`EngineError::Interrupted`] through its dropped completer.
    pub fn interrupt(&self) {
        *self.shared.state.lock() = EngineState::Stopped;
        let inflight = self.shared.executing.lock().take();
        if let Some(current) = inflight {
            current.token.cancel();
        }
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
        for operation in self.shared.queue.drain() {
            operation.resolve_cancelled();
        }
        info!("engine interrupted");
    }
}

async fn worker_loop(shared: Arc<EngineShared>, mut state: WorkerState) {
    loop {
        let PendingOperation {
            seq,
            command,
            token,
            completer,
        } = shared.queue.take().await;

        if token.is_cancelled() {
            debug!(seq, kind = command.kind(), "skipping cancelled command");
            completer.resolve(Err(EngineError::Cancelled));
            continue;
        }

        let kind = command.kind();
        let stopping = matches!(command, Command::StopEngine);
        *shared.executing.lock() = Some(ExecutingOp {
            scope: command.cancel_scope().cloned(),
            token: token.clone(),
        });

        debug!(seq, kind, "executing command");
        let result = command.execute(&mut state, &shared, &token).await;
        *shared.executing.lock() = None;

        if token.is_cancelled() {
            // side effects that already happened stand; only the handle
            // reports cancellation
            completer.resolve(Err(EngineError::Cancelled));
        } else {
            if let Err(err) = &result {
                warn!(seq, kind, error = %err, "command failed");
            }
            completer.resolve(result);
        }

        if stopping {
            *shared.state.lock() = EngineState::Stopped;
            info!("engine stopped");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ale_analysis_api::SourceFile;

    struct NoopAnalyzer;

    #[async_trait::async_trait]
    impl Analyzer for NoopAnalyzer {
        async fn analyze(
            &self,
            scope: &crate::scope::ScopeContext,
            _config: &AnalysisConfig,
            _sink: &IssueSink,
            _progress: &dyn ProgressSink,
            _token: &CancelToken,
        ) -> Result<AnalysisResults, EngineError> {
            Ok(AnalysisResults::indexed(scope.file_count()))
        }
    }

    struct NoopFactory;

    impl AnalyzerFactory for NoopFactory {
        fn create(
            &self,
            _config: &EngineConfig,
            _plugins: &PluginSet,
        ) -> Result<Box<dyn Analyzer>, EngineError> {
            Ok(Box::new(NoopAnalyzer))
        }
    }

    fn engine() -> Engine {
        Engine::start(EngineConfig::new(), PluginSet::empty(), Arc::new(NoopFactory)).unwrap()
    }

    #[tokio::test]
    async fn starts_running() {
        let engine = engine();
        assert_eq!(engine.state(), EngineState::Running);
        engine.stop().await.unwrap();
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[tokio::test]
    async fn analysis_against_registered_scope() {
        let engine = engine();
        let descriptor = ScopeDescriptor::new()
            .with_files(vec![SourceFile::new("a.py", ""), SourceFile::new("b.py", "")]);
        engine
            .register_scope(ScopeId::new("m1"), descriptor)
            .unwrap()
            .await
            .unwrap();

        let config = AnalysisConfig::builder()
            .add_input_file(SourceFile::new("a.py", ""))
            .build();
        let results = engine
            .run_analysis(Some(ScopeId::new("m1")), config, Arc::new(|_| {}), None)
            .unwrap()
            .await
            .unwrap();
        assert_eq!(results.indexed_file_count, 2);
        assert!(results.duration.is_some());

        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn empty_input_short_circuits() {
        let engine = engine();
        let results = engine
            .run_analysis(None, AnalysisConfig::builder().build(), Arc::new(|_| {}), None)
            .unwrap()
            .await
            .unwrap();
        assert_eq!(results.indexed_file_count, 0);
        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn submit_after_stop_is_rejected() {
        let engine = engine();
        engine.stop().await.unwrap();

        let err = engine
            .register_scope(ScopeId::new("m1"), ScopeDescriptor::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::Stopped));
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let engine = engine();
        engine.stop().await.unwrap();
        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn interrupt_forces_stopped() {
        let engine = engine();
        engine.interrupt();
        assert_eq!(engine.state(), EngineState::Stopped);
        assert!(engine.submit(Command::StopEngine).is_err());
    }
}
