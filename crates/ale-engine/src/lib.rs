//! ALE Engine
//!
//! An ordered, cancellable command scheduler for a code-analysis backend.
//! Clients submit commands from any task; a single worker executes them
//! strictly in submission order, so analyses, scope registrations and plugin
//! resets never interleave.
//!
//! ```no_run
//! use ale_analysis_api::{AnalysisConfig, EngineConfig, PluginSet, ScopeDescriptor, ScopeId, SourceFile};
//! use ale_engine::Engine;
//! use std::sync::Arc;
//!
//! # async fn run(factory: Arc<dyn ale_engine::AnalyzerFactory>) -> Result<(), ale_engine::EngineError> {
//! let engine = Engine::start(EngineConfig::new(), PluginSet::empty(), factory)?;
//!
//! let descriptor = ScopeDescriptor::new().with_files(vec![SourceFile::new("a.py", "")]);
//! engine.register_scope(ScopeId::new("project"), descriptor)?.await?;
//!
//! let config = AnalysisConfig::builder()
//!     .add_input_file(SourceFile::new("a.py", ""))
//!     .build();
//! let results = engine
//!     .run_analysis(Some(ScopeId::new("project")), config, Arc::new(|_| {}), None)?
//!     .await?;
//! println!("indexed {} files", results.indexed_file_count);
//!
//! engine.stop().await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod analyzer;
pub mod cancel;
pub mod command;
pub mod engine;
pub mod error;
pub mod pending;
mod queue;
pub mod scope;

pub use analyzer::{Analyzer, AnalyzerFactory, PluginProvider};
pub use cancel::CancelToken;
pub use command::Command;
pub use engine::{Engine, EngineState};
pub use error::EngineError;
pub use pending::{CommandOutput, Completion};
pub use scope::ScopeContext;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
