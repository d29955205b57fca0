use crate::error::Result;
use crate::io::atomic_write;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// CacheSnapshot
// ---------------------------------------------------------------------------

/// Result of reading the processed-client file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub ids: BTreeSet<String>,
    /// Set when the file exists but could not be read and `ids` is empty as a
    /// fallback. Every client will look new for this run.
    pub degraded: bool,
}

// ---------------------------------------------------------------------------
// ProcessedCache
// ---------------------------------------------------------------------------

/// Whitespace-delimited set of client ids that have already been notified.
///
/// The set only grows through [`ProcessedCache::save`]; removal is a manual
/// operation.
#[derive(Debug, Clone)]
pub struct ProcessedCache {
    path: PathBuf,
}

impl ProcessedCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Strict read. A missing file is an empty set; any other failure is an error.
    pub fn try_load(&self) -> Result<BTreeSet<String>> {
        if !self.path.exists() {
            return Ok(BTreeSet::new());
        }
        let data = std::fs::read_to_string(&self.path)?;
        Ok(parse_tokens(&data))
    }

    /// Lenient read used by the pipeline: read errors degrade to an empty set.
    pub fn load(&self) -> CacheSnapshot {
        match self.try_load() {
            Ok(ids) => {
                tracing::debug!(path = %self.path.display(), cached = ids.len(), "loaded processed-client cache");
                CacheSnapshot {
                    ids,
                    degraded: false,
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "could not read processed-client cache; treating every client as new, duplicate notifications are possible"
                );
                CacheSnapshot {
                    ids: BTreeSet::new(),
                    degraded: true,
                }
            }
        }
    }

    /// Overwrite the file with `ids` joined by single spaces.
    pub fn save(&self, ids: &BTreeSet<String>) -> Result<()> {
        let data = ids.iter().map(String::as_str).collect::<Vec<_>>().join(" ");
        atomic_write(&self.path, data.as_bytes())?;
        tracing::debug!(path = %self.path.display(), cached = ids.len(), "saved processed-client cache");
        Ok(())
    }

    /// Add `ids` to the persisted set. Returns how many were not already present.
    pub fn add<I, S>(&self, ids: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut current = self.try_load()?;
        let before = current.len();
        current.extend(ids.into_iter().map(Into::into));
        let added = current.len() - before;
        self.save(&current)?;
        Ok(added)
    }

    /// Manually drop `ids` from the persisted set. Returns how many were removed.
    pub fn remove<S: AsRef<str>>(&self, ids: &[S]) -> Result<usize> {
        let mut current = self.try_load()?;
        let before = current.len();
        for id in ids {
            current.remove(id.as_ref());
        }
        let removed = before - current.len();
        self.save(&current)?;
        Ok(removed)
    }

    /// Manually empty the set. The file is kept, with no contents.
    pub fn clear(&self) -> Result<()> {
        self.save(&BTreeSet::new())
    }
}

fn parse_tokens(data: &str) -> BTreeSet<String> {
    data.split_whitespace().map(str::to_string).collect()
}
