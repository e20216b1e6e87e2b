//! Scope identifiers, descriptors and file events
//!
//! A scope is an analysis boundary (typically a workspace folder) registered
//! with the engine under an opaque, caller-supplied key. The descriptor
//! carries everything the engine needs to build the scope's execution
//! context: its file set and its settings.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Opaque scope identifier, chosen by the caller (e.g. a workspace-folder key)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId(String);

impl ScopeId {
    /// Create a scope id from any string-like key
    #[inline]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The underlying key
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ScopeId {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ScopeId {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

/// A source file handed to the engine by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path, relative to the scope base directory when one is set
    pub path: PathBuf,
    /// File contents as seen by the client (may be unsaved editor state)
    pub contents: String,
    /// Language key, if the client detected one
    pub language: Option<String>,
    /// Whether the file is test code
    pub is_test: bool,
}

impl SourceFile {
    /// Create a source file with contents
    #[inline]
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            language: None,
            is_test: false,
        }
    }

    /// With a language key
    #[inline]
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Mark as test code
    #[inline]
    #[must_use]
    pub fn as_test(mut self) -> Self {
        self.is_test = true;
        self
    }
}

/// Descriptor for a persistent scope registration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeDescriptor {
    /// Base directory of the scope, if any
    pub base_dir: Option<PathBuf>,
    /// Initial file set
    pub files: Vec<SourceFile>,
    /// Scope-level settings (rule parameters, analyzer properties, ...)
    pub settings: HashMap<String, String>,
}

impl ScopeDescriptor {
    /// Create an empty descriptor
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a base directory
    #[inline]
    #[must_use]
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// With an initial file set
    #[inline]
    #[must_use]
    pub fn with_files(mut self, files: Vec<SourceFile>) -> Self {
        self.files = files;
        self
    }

    /// With one setting
    #[inline]
    #[must_use]
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Validate the descriptor before a registration is applied
    ///
    /// # Errors
    /// - `DescriptorError::DuplicateFile` when two files share a path
    /// - `DescriptorError::EmptyPath` when a file has no path
    pub fn validate(&self) -> Result<(), DescriptorError> {
        let mut seen = HashSet::new();
        for file in &self.files {
            if file.path.as_os_str().is_empty() {
                return Err(DescriptorError::EmptyPath);
            }
            if !seen.insert(&file.path) {
                return Err(DescriptorError::DuplicateFile(file.path.clone()));
            }
        }
        Ok(())
    }
}

/// Descriptor validation errors
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    /// Two files share the same path
    #[error("duplicate input file: {0}")]
    DuplicateFile(PathBuf),

    /// A file has an empty path
    #[error("input file with empty path")]
    EmptyPath,
}

/// Kind of file-system event forwarded to a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileEventKind {
    /// File was created
    Created,
    /// File contents changed
    Modified,
    /// File was deleted
    Deleted,
}

/// A file-system event targeting one registered scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEvent {
    /// What happened
    pub kind: FileEventKind,
    /// The affected file; for deletions only the path is meaningful
    pub file: SourceFile,
}

impl FileEvent {
    /// Create a file event
    #[inline]
    pub fn new(kind: FileEventKind, file: SourceFile) -> Self {
        Self { kind, file }
    }
}
