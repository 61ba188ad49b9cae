//! Project configuration for the `shire` CLI.
//!
//! Read from `shire.toml` in the project root, or from the file passed with
//! `--config`. Every section is optional.
//!
//! # Example
//!
//! ```toml
//! [index]
//! ignore = [".git", "target", "node_modules"]
//! max_file_size = 1048576
//!
//! [log]
//! filter = "info"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use shire_eval::source::DEFAULT_MAX_FILE_SIZE;
use shire_eval::FileSystemSource;

/// File looked up in the project root when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "shire.toml";

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShireConfig {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// `[index]` section: which project files are eligible items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// File or directory names skipped anywhere in the tree.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
    /// Largest eligible file, in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            ignore: default_ignore(),
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_ignore() -> Vec<String> {
    [".git", "target", "node_modules"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

/// `[log]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

impl ShireConfig {
    /// File-system item source rooted at `root` with this configuration.
    pub fn source(&self, root: &Path) -> FileSystemSource {
        FileSystemSource::new(root)
            .with_ignore(self.index.ignore.clone())
            .with_max_file_size(self.index.max_file_size)
    }
}

// ── Functions ─────────────────────────────────────────────────────────────────

/// Read and parse a config file from `path`.
///
/// Returns a human-readable error string on failure.
pub fn read_config(path: &Path) -> Result<ShireConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;

    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

/// Load the explicit config file, else `shire.toml` under `root` when it
/// exists, else defaults.
pub fn load_config(explicit: Option<&Path>, root: &Path) -> Result<ShireConfig, String> {
    if let Some(path) = explicit {
        return read_config(path);
    }
    let implicit = root.join(CONFIG_FILE_NAME);
    if implicit.is_file() {
        read_config(&implicit)
    } else {
        Ok(ShireConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: ShireConfig = toml::from_str("").unwrap();
        assert_eq!(config, ShireConfig::default());
        assert_eq!(config.index.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert!(config.index.ignore.contains(&"target".to_string()));
    }

    #[test]
    fn sections_override_defaults() {
        let config: ShireConfig = toml::from_str(
            "[index]\nignore = [\"dist\"]\nmax_file_size = 10\n\n[log]\nfilter = \"debug\"\n",
        )
        .unwrap();
        assert_eq!(config.index.ignore, vec!["dist"]);
        assert_eq!(config.index.max_file_size, 10);
        assert_eq!(config.log.filter.as_deref(), Some("debug"));
    }

    #[test]
    fn missing_implicit_file_is_not_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(
            load_config(None, dir.path()).unwrap(),
            ShireConfig::default()
        );
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = load_config(Some(&dir.path().join("nope.toml")), dir.path()).unwrap_err();
        assert!(err.starts_with("could not read"));
    }

    #[test]
    fn unknown_value_types_fail_to_parse() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[index]\nmax_file_size = \"big\"\n").unwrap();
        let err = load_config(None, dir.path()).unwrap_err();
        assert!(err.starts_with("could not parse"));
    }
}
