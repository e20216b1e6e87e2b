//! Scope execution contexts and their registry
//!
//! A scope context is the engine's per-scope container: the scope's file set
//! and settings, everything an analyzer needs to run inside that boundary.
//! Persistent contexts live from register to unregister; transient ones are
//! created for a single analysis that targets no registered scope and are
//! released right after it.
//!
//! The registry is mutated exclusively by the worker loop, which is the
//! engine's whole serialization story: no locking here by construction.

use ale_analysis_api::{
    AnalysisConfig, FileEvent, FileEventKind, ScopeDescriptor, ScopeId, SourceFile,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Execution context for one analysis scope
#[derive(Debug)]
pub struct ScopeContext {
    id: Option<ScopeId>,
    descriptor: ScopeDescriptor,
    files: HashMap<PathBuf, SourceFile>,
    transient: bool,
}

impl ScopeContext {
    pub(crate) fn persistent(id: ScopeId, descriptor: ScopeDescriptor) -> Self {
        let files = descriptor
            .files
            .iter()
            .map(|f| (f.path.clone(), f.clone()))
            .collect();
        Self {
            id: Some(id),
            descriptor,
            files,
            transient: false,
        }
    }

    /// Ad-hoc context for a single analysis outside any registered scope
    pub(crate) fn transient(config: &AnalysisConfig) -> Self {
        let descriptor = ScopeDescriptor {
            base_dir: config.base_dir.clone(),
            files: config.input_files.clone(),
            settings: HashMap::new(),
        };
        let files = config
            .input_files
            .iter()
            .map(|f| (f.path.clone(), f.clone()))
            .collect();
        Self {
            id: None,
            descriptor,
            files,
            transient: true,
        }
    }

    /// Scope identifier; transient contexts have none
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<&ScopeId> {
        self.id.as_ref()
    }

    /// Whether this context lives for a single analysis only
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.transient
    }

    /// The descriptor this context was built from
    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &ScopeDescriptor {
        &self.descriptor
    }

    /// Current file set
    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    /// Lookup one file by path
    #[must_use]
    pub fn file(&self, path: &Path) -> Option<&SourceFile> {
        self.files.get(path)
    }

    /// Number of files currently in the scope
    #[inline]
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Keep the file set in sync with a client file event
    pub(crate) fn apply_file_event(&mut self, event: &FileEvent) {
        match event.kind {
            FileEventKind::Created | FileEventKind::Modified => {
                self.files
                    .insert(event.file.path.clone(), event.file.clone());
            }
            FileEventKind::Deleted => {
                self.files.remove(&event.file.path);
            }
        }
    }
}

/// Registry of persistent scope contexts, owned by the worker loop
#[derive(Debug, Default)]
pub(crate) struct ScopeRegistry {
    scopes: HashMap<ScopeId, ScopeContext>,
}

impl ScopeRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert a context under `id`
    ///
    /// The caller removes and releases any prior context registered under the
    /// same id first, via [`Self::unregister`].
    pub(crate) fn register(&mut self, id: ScopeId, context: ScopeContext) {
        self.scopes.insert(id, context);
    }

    /// Remove a context; `None` when the id is unknown
    pub(crate) fn unregister(&mut self, id: &ScopeId) -> Option<ScopeContext> {
        self.scopes.remove(id)
    }

    pub(crate) fn get(&self, id: &ScopeId) -> Option<&ScopeContext> {
        self.scopes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &ScopeId) -> Option<&mut ScopeContext> {
        self.scopes.get_mut(id)
    }

    /// Build a transient context from an analysis configuration
    pub(crate) fn create_transient(&self, config: &AnalysisConfig) -> ScopeContext {
        ScopeContext::transient(config)
    }

    /// Remove every context, for engine stop
    pub(crate) fn drain(&mut self) -> Vec<ScopeContext> {
        self.scopes.drain().map(|(_, ctx)| ctx).collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.scopes.len()
    }
}
