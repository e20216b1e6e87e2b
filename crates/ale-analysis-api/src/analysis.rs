//! Analysis configuration, results and issues
//!
//! Mirrors what the engine passes to an analyzer for one run and what it
//! hands back to the caller when the run completes.

use crate::scope::SourceFile;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Issue severity as reported by detection rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Informational finding
    Info,
    /// Minor issue
    Minor,
    /// Major issue
    Major,
    /// Critical issue
    Critical,
    /// Blocker, should not ship
    Blocker,
}

/// Text range of an issue, 1-based lines and 0-based columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRange {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl TextRange {
    /// Range covering a single whole line
    #[inline]
    #[must_use]
    pub fn line(line: u32) -> Self {
        Self {
            start_line: line,
            start_column: 0,
            end_line: line,
            end_column: 0,
        }
    }
}

/// One finding reported by an analyzer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Key of the rule that raised the issue
    pub rule_key: String,
    /// Human-readable message
    pub message: String,
    /// Severity
    pub severity: Severity,
    /// File the issue belongs to; engine-wide issues have none
    pub file: Option<PathBuf>,
    /// Location inside the file, when known
    pub range: Option<TextRange>,
}

impl Issue {
    /// Create an issue
    pub fn new(rule_key: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            rule_key: rule_key.into(),
            message: message.into(),
            severity,
            file: None,
            range: None,
        }
    }

    /// Attach a file
    #[inline]
    #[must_use]
    pub fn in_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Attach a range
    #[inline]
    #[must_use]
    pub fn at(mut self, range: TextRange) -> Self {
        self.range = Some(range);
        self
    }
}

/// Sink receiving issues as the analyzer streams them
///
/// The engine never interprets issues; it only forwards them (counting them
/// for its completion log).
pub type IssueSink = Arc<dyn Fn(Issue) + Send + Sync>;

/// Configuration for one analysis run
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Unique id of this analysis, carried through logs and traces
    pub analysis_id: Uuid,
    /// Files to analyze
    pub input_files: Vec<SourceFile>,
    /// Keys of the rules to run
    pub active_rules: Vec<String>,
    /// Extra analyzer properties
    pub extra_properties: HashMap<String, String>,
    /// Base directory for relative paths
    pub base_dir: Option<PathBuf>,
}

impl AnalysisConfig {
    /// Start building a configuration
    #[inline]
    #[must_use]
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }
}

/// Builder for [`AnalysisConfig`]
#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
    input_files: Vec<SourceFile>,
    active_rules: Vec<String>,
    extra_properties: HashMap<String, String>,
    base_dir: Option<PathBuf>,
}

impl AnalysisConfigBuilder {
    /// Add input files
    #[must_use]
    pub fn add_input_files(mut self, files: impl IntoIterator<Item = SourceFile>) -> Self {
        self.input_files.extend(files);
        self
    }

    /// Add one input file
    #[must_use]
    pub fn add_input_file(mut self, file: SourceFile) -> Self {
        self.input_files.push(file);
        self
    }

    /// Add active rules by key
    #[must_use]
    pub fn add_active_rules(
        mut self,
        rules: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.active_rules.extend(rules.into_iter().map(Into::into));
        self
    }

    /// Put one extra property
    #[must_use]
    pub fn put_extra_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_properties.insert(key.into(), value.into());
        self
    }

    /// Set the base directory
    #[must_use]
    pub fn base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Finish, assigning a fresh analysis id
    #[must_use]
    pub fn build(self) -> AnalysisConfig {
        AnalysisConfig {
            analysis_id: Uuid::new_v4(),
            input_files: self.input_files,
            active_rules: self.active_rules,
            extra_properties: self.extra_properties,
            base_dir: self.base_dir,
        }
    }
}

/// Outcome of one analysis run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResults {
    /// Number of files the analyzer indexed
    pub indexed_file_count: usize,
    /// Files whose analysis failed (analysis of the rest still counts)
    pub failed_files: Vec<PathBuf>,
    /// Wall-clock duration, stamped by the engine
    pub duration: Option<Duration>,
}

impl AnalysisResults {
    /// Empty results (nothing analyzed)
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Results for a number of indexed files
    #[inline]
    #[must_use]
    pub fn indexed(count: usize) -> Self {
        Self {
            indexed_file_count: count,
            ..Self::default()
        }
    }

    /// True when at least one file failed
    #[inline]
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed_files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn config_builder_collects_inputs() {
        let config = AnalysisConfig::builder()
            .add_input_file(SourceFile::new("a.py", "x = 1"))
            .add_input_files(vec![SourceFile::new("b.py", "")])
            .add_active_rules(["S100", "S101"])
            .put_extra_property("python.version", "3.12")
            .base_dir("/work")
            .build();

        assert_eq!(config.input_files.len(), 2);
        assert_eq!(config.active_rules, vec!["S100", "S101"]);
        assert_eq!(
            config.extra_properties.get("python.version").map(String::as_str),
            Some("3.12")
        );
    }

    #[test]
    fn configs_get_distinct_ids() {
        let a = AnalysisConfig::builder().build();
        let b = AnalysisConfig::builder().build();
        assert_ne!(a.analysis_id, b.analysis_id);
    }

    #[test]
    fn issue_builder() {
        let issue = Issue::new("S100", "rename this", Severity::Minor)
            .in_file("a.py")
            .at(TextRange::line(3));

        assert_eq!(issue.file.as_deref(), Some(std::path::Path::new("a.py")));
        assert_eq!(issue.range.unwrap().start_line, 3);
    }

    #[test]
    fn results_failure_flag() {
        let mut results = AnalysisResults::indexed(2);
        assert!(!results.has_failures());
        results.failed_files.push("a.py".into());
        assert!(results.has_failures());
    }
}
