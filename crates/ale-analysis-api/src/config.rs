//! Engine configuration
//!
//! Global settings handed to the analyzer factory when the engine (re)builds
//! its analyzer state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Global engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Working directory for analyzer scratch files
    pub work_dir: Option<PathBuf>,
    /// Engine-wide analyzer properties
    pub extra_properties: HashMap<String, String>,
}

impl EngineConfig {
    /// Create a default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a working directory
    #[inline]
    #[must_use]
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(work_dir.into());
        self
    }

    /// With one engine-wide property
    #[inline]
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_properties.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = EngineConfig::new()
            .with_work_dir("/tmp/ale")
            .with_property("telemetry", "off");

        assert!(config.work_dir.is_some());
        assert_eq!(config.extra_properties.len(), 1);
    }
}
