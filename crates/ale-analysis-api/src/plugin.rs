//! Plugin descriptions
//!
//! The engine never loads plugins itself; it only tracks which set the
//! current analyzer was built from so that a reset can swap the whole set.

use serde::{Deserialize, Serialize};

/// One loaded analyzer plugin
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Plugin key (e.g. "python")
    pub key: String,
    /// Plugin version string
    pub version: String,
}

impl PluginInfo {
    /// Create a plugin description
    #[inline]
    pub fn new(key: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version: version.into(),
        }
    }
}

/// The set of plugins an analyzer is built from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSet {
    /// Loaded plugins
    pub plugins: Vec<PluginInfo>,
}

impl PluginSet {
    /// Empty set
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Set from plugin descriptions
    #[inline]
    pub fn from_plugins(plugins: impl IntoIterator<Item = PluginInfo>) -> Self {
        Self {
            plugins: plugins.into_iter().collect(),
        }
    }

    /// Whether a plugin with the given key is present
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.plugins.iter().any(|p| p.key == key)
    }
}
