//! Testing utilities for the ALE workspace
//!
//! Scriptable analyzer and factory fakes plus small fixture helpers, shared
//! by the engine's integration tests.

#![allow(missing_docs)]

use ale_analysis_api::{
    AnalysisConfig, AnalysisResults, EngineConfig, FileEvent, Issue, IssueSink, PluginSet,
    ProgressSink, Severity, SourceFile,
};
use ale_engine::{Analyzer, AnalyzerFactory, CancelToken, EngineError, PluginProvider, ScopeContext};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use uuid::Uuid;

/// What a [`FakeAnalyzer`] observed, in execution order
#[derive(Debug, Default)]
pub struct AnalysisRecord {
    started: Mutex<Vec<String>>,
    stopped: Mutex<Vec<String>>,
    lifecycle: Mutex<Vec<String>>,
    analyzed: Mutex<Vec<Uuid>>,
    file_counts: Mutex<Vec<usize>>,
    events: Mutex<Vec<String>>,
}

impl AnalysisRecord {
    /// Scope labels passed to `scope_started`; transient contexts record
    /// as `"<transient>"`
    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    /// Scope labels passed to `scope_stopped`
    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().clone()
    }

    /// Interleaved `started:`/`stopped:` labels, in the order the analyzer
    /// observed the context lifecycle calls
    pub fn lifecycle(&self) -> Vec<String> {
        self.lifecycle.lock().clone()
    }

    /// Analysis ids in the order they ran
    pub fn analyzed(&self) -> Vec<Uuid> {
        self.analyzed.lock().clone()
    }

    /// Scope-context file counts seen by each analysis, in execution order
    pub fn file_counts(&self) -> Vec<usize> {
        self.file_counts.lock().clone()
    }

    /// Paths of forwarded file events
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

fn scope_label(scope: &ScopeContext) -> String {
    scope
        .id()
        .map_or_else(|| "<transient>".to_owned(), |id| id.to_string())
}

/// Scriptable [`Analyzer`] that records everything it is asked to do
///
/// By default every analysis succeeds instantly with one issue per input
/// file. Behavior is adjusted through the `with_*`/`failing_*` builders;
/// clones share the same [`AnalysisRecord`].
#[derive(Clone, Default)]
pub struct FakeAnalyzer {
    record: Arc<AnalysisRecord>,
    issues_per_file: usize,
    delay: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
    ignore_cancellation: bool,
    fail_analysis: Option<String>,
    fail_release: Option<String>,
    analysis_started: Option<Arc<Notify>>,
    cancel_callback: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl FakeAnalyzer {
    pub fn new() -> Self {
        Self {
            issues_per_file: 1,
            ..Self::default()
        }
    }

    pub fn record(&self) -> Arc<AnalysisRecord> {
        Arc::clone(&self.record)
    }

    /// Issues emitted per input file (default 1)
    #[must_use]
    pub fn with_issues_per_file(mut self, count: usize) -> Self {
        self.issues_per_file = count;
        self
    }

    /// Make every analysis take roughly this long, polling the cancel token
    /// along the way
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Hold every analysis until the test adds a permit to `gate`
    ///
    /// While held the analyzer keeps polling its cancel token, so cancelled
    /// analyses resolve without the permit.
    #[must_use]
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Never look at the cancel token while waiting
    ///
    /// Turns a gated analysis into one only a forceful interrupt can end.
    #[must_use]
    pub fn ignoring_cancellation(mut self) -> Self {
        self.ignore_cancellation = true;
        self
    }

    /// Make every analysis fail with `AnalysisFailed(message)`
    #[must_use]
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.fail_analysis = Some(message.into());
        self
    }

    /// Make every scope release fail with `ScopeRelease(message)`
    #[must_use]
    pub fn failing_release_with(mut self, message: impl Into<String>) -> Self {
        self.fail_release = Some(message.into());
        self
    }

    /// Notify `signal` as soon as an analysis starts executing
    #[must_use]
    pub fn with_analysis_started(mut self, signal: Arc<Notify>) -> Self {
        self.analysis_started = Some(signal);
        self
    }

    /// Register `callback` on the cancel token of every analysis
    #[must_use]
    pub fn with_cancel_callback(mut self, callback: Arc<dyn Fn() + Send + Sync>) -> Self {
        self.cancel_callback = Some(callback);
        self
    }
}

#[async_trait::async_trait]
impl Analyzer for FakeAnalyzer {
    async fn analyze(
        &self,
        scope: &ScopeContext,
        config: &AnalysisConfig,
        sink: &IssueSink,
        progress: &dyn ProgressSink,
        token: &CancelToken,
    ) -> Result<AnalysisResults, EngineError> {
        self.record.analyzed.lock().push(config.analysis_id);
        self.record.file_counts.lock().push(scope.file_count());
        if let Some(callback) = &self.cancel_callback {
            let callback = Arc::clone(callback);
            token.on_cancel(move || callback());
        }
        if let Some(signal) = &self.analysis_started {
            signal.notify_one();
        }
        progress.message("analyzing");

        let step = Duration::from_millis(2);
        if let Some(gate) = &self.gate {
            loop {
                if !self.ignore_cancellation && token.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                match gate.try_acquire() {
                    Ok(permit) => {
                        permit.forget();
                        break;
                    }
                    Err(_) => tokio::time::sleep(step).await,
                }
            }
        }
        if let Some(delay) = self.delay {
            let mut remaining = delay;
            while remaining > Duration::ZERO {
                if !self.ignore_cancellation && token.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                tokio::time::sleep(step.min(remaining)).await;
                remaining = remaining.saturating_sub(step);
            }
        }
        if !self.ignore_cancellation && token.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if let Some(message) = &self.fail_analysis {
            return Err(EngineError::AnalysisFailed(message.clone()));
        }

        for file in &config.input_files {
            for issue_index in 0..self.issues_per_file {
                let issue = Issue::new(
                    format!("fake:rule{issue_index}"),
                    format!("issue in scope {}", scope_label(scope)),
                    Severity::Minor,
                )
                .in_file(&file.path);
                sink(issue);
            }
        }
        Ok(AnalysisResults::indexed(config.input_files.len()))
    }

    fn scope_started(&self, scope: &ScopeContext) -> Result<(), EngineError> {
        let label = scope_label(scope);
        self.record.lifecycle.lock().push(format!("started:{label}"));
        self.record.started.lock().push(label);
        Ok(())
    }

    fn scope_stopped(&self, scope: &ScopeContext) -> Result<(), EngineError> {
        let label = scope_label(scope);
        self.record.lifecycle.lock().push(format!("stopped:{label}"));
        self.record.stopped.lock().push(label);
        match &self.fail_release {
            Some(message) => Err(EngineError::ScopeRelease(message.clone())),
            None => Ok(()),
        }
    }

    fn file_event(&self, _scope: &ScopeContext, event: &FileEvent) {
        self.record
            .events
            .lock()
            .push(event.file.path.display().to_string());
    }
}

/// [`AnalyzerFactory`] handing out clones of a template analyzer
///
/// The template can be swapped between creations, and the next creation can
/// be scripted to fail, which is how plugin-reset failure paths are tested.
#[derive(Default)]
pub struct FakeFactory {
    template: Mutex<FakeAnalyzer>,
    creations: AtomicUsize,
    fail_next: AtomicBool,
}

impl FakeFactory {
    pub fn new(template: FakeAnalyzer) -> Self {
        Self {
            template: Mutex::new(template),
            creations: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        }
    }

    /// How many analyzers have been built so far
    pub fn creations(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }

    /// Replace the template used for subsequent creations
    pub fn set_template(&self, template: FakeAnalyzer) {
        *self.template.lock() = template;
    }

    /// Make the next `create` call fail
    pub fn fail_next_create(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl AnalyzerFactory for FakeFactory {
    fn create(
        &self,
        _config: &EngineConfig,
        _plugins: &PluginSet,
    ) -> Result<Box<dyn Analyzer>, EngineError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(EngineError::PluginReload("scripted factory failure".into()));
        }
        self.creations.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.template.lock().clone()))
    }
}

/// [`PluginProvider`] returning a fixed set
pub struct FixedPlugins(pub PluginSet);

impl PluginProvider for FixedPlugins {
    fn current_plugins(&self) -> PluginSet {
        self.0.clone()
    }
}

/// A source file with empty contents
pub fn source(path: &str) -> SourceFile {
    SourceFile::new(path, "")
}

/// A descriptor holding the given file paths
pub fn descriptor(paths: &[&str]) -> ale_analysis_api::ScopeDescriptor {
    ale_analysis_api::ScopeDescriptor::new()
        .with_files(paths.iter().map(|p| source(p)).collect())
}

/// An analysis configuration over the given file paths
pub fn analysis_config(paths: &[&str]) -> AnalysisConfig {
    AnalysisConfig::builder()
        .add_input_files(paths.iter().map(|p| source(p)))
        .build()
}

/// Sink that appends every issue to a shared vector
pub fn collecting_sink() -> (IssueSink, Arc<Mutex<Vec<Issue>>>) {
    let issues = Arc::new(Mutex::new(Vec::new()));
    let collected = Arc::clone(&issues);
    let sink: IssueSink = Arc::new(move |issue| collected.lock().push(issue));
    (sink, issues)
}

/// Install a test subscriber honoring `RUST_LOG`; safe to call repeatedly
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
