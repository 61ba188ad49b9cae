//! Item sources: where candidate sets come from.
//!
//! An `ItemSource` enumerates the eligible items of a project (file paths,
//! `/`-separated and relative to the project root) and answers whether a
//! single path is eligible. Ordering is not part of the contract; the
//! pipeline's `sort` verb is the only place ordering is imposed.

use async_trait::async_trait;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Bytes inspected when deciding whether a file is binary.
const BINARY_SNIFF_LEN: usize = 8 * 1024;

/// Default upper bound for an eligible file.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("cannot read '{path}': {message}")]
    Io { path: String, message: String },

    #[error("item source unavailable: {0}")]
    Unavailable(String),
}

impl SourceError {
    fn io(path: &Path, err: std::io::Error) -> Self {
        SourceError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

// ──────────────────────────────────────────────
// Trait
// ──────────────────────────────────────────────

/// Asynchronous provider of candidate items.
///
/// Each call to [`enumerate`](ItemSource::enumerate) returns its own
/// complete list; concurrent callers never share a partially built one.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Every eligible item.
    async fn enumerate(&self) -> Result<Vec<String>, SourceError>;

    /// Whether `path` names an eligible item.
    async fn is_eligible(&self, path: &str) -> bool;
}

// ──────────────────────────────────────────────
// StaticItemSource
// ──────────────────────────────────────────────

/// A source that returns a fixed list of items, in the given order.
#[derive(Debug, Clone, Default)]
pub struct StaticItemSource {
    items: Vec<String>,
}

impl StaticItemSource {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ItemSource for StaticItemSource {
    async fn enumerate(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.items.clone())
    }

    async fn is_eligible(&self, path: &str) -> bool {
        self.items.iter().any(|i| i == path)
    }
}

// ──────────────────────────────────────────────
// FileSystemSource
// ──────────────────────────────────────────────

/// Project files under a root directory.
///
/// A file is eligible when it is a regular file, no path component is an
/// ignored name, it is at most `max_file_size` bytes, and its first 8 KiB
/// contain no NUL byte.
#[derive(Debug, Clone)]
pub struct FileSystemSource {
    root: PathBuf,
    ignore: Vec<String>,
    max_file_size: u64,
}

impl FileSystemSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignore: Vec::new(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    pub fn with_ignore(mut self, ignore: Vec<String>) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_ignored(&self, name: &str) -> bool {
        self.ignore.iter().any(|i| i == name)
    }

    /// Blocking walk of the whole tree.
    fn walk(&self) -> Result<Vec<String>, SourceError> {
        let mut items = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let entries = fs::read_dir(&dir).map_err(|e| SourceError::io(&dir, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| SourceError::io(&dir, e))?;
                let name = entry.file_name();
                if self.is_ignored(&name.to_string_lossy()) {
                    continue;
                }
                let file_type = entry.file_type().map_err(|e| SourceError::io(&dir, e))?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() && self.is_eligible_file(&path) {
                    if let Some(rel) = relative_item(&self.root, &path) {
                        items.push(rel);
                    }
                }
            }
        }
        items.sort();
        Ok(items)
    }

    fn is_eligible_file(&self, path: &Path) -> bool {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_file() && meta.len() <= self.max_file_size => {}
            _ => return false,
        }
        let mut buf = [0u8; BINARY_SNIFF_LEN];
        let read = fs::File::open(path).and_then(|mut f| f.read(&mut buf));
        match read {
            Ok(n) => !buf[..n].contains(&0),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "skipping unreadable file");
                false
            }
        }
    }

    fn is_eligible_item(&self, item: &str) -> bool {
        if item.split('/').any(|part| part.is_empty() || part == ".." || self.is_ignored(part)) {
            return false;
        }
        self.is_eligible_file(&self.root.join(item))
    }
}

/// `path` relative to `root`, with `/` separators.
fn relative_item(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

#[async_trait]
impl ItemSource for FileSystemSource {
    #[tracing::instrument(level = "debug", skip_all, fields(root = %self.root.display()))]
    async fn enumerate(&self) -> Result<Vec<String>, SourceError> {
        let this = self.clone();
        let items = tokio::task::spawn_blocking(move || this.walk())
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))??;
        tracing::debug!(count = items.len(), "enumerated items");
        Ok(items)
    }

    async fn is_eligible(&self, path: &str) -> bool {
        let this = self.clone();
        let item = path.to_string();
        tokio::task::spawn_blocking(move || this.is_eligible_item(&item))
            .await
            .unwrap_or(false)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
