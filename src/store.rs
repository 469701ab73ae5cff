//! Signature file store.
//!
//! Reads files from the vault directory and caches their contents by
//! filename. Signature files are treated as immutable while the process
//! runs, so one store is shared by every evaluation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Raw file access.
pub trait FileSource: Send + Sync {
    /// Read a whole file. `None` when it is missing, unreadable or empty.
    fn read(&self, path: &Path) -> Option<Vec<u8>>;
}

/// Reads straight from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskSource;

impl FileSource for DiskSource {
    fn read(&self, path: &Path) -> Option<Vec<u8>> {
        if !path.is_file() {
            return None;
        }
        match std::fs::read(path) {
            Ok(data) if !data.is_empty() => Some(data),
            Ok(_) => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read file");
                None
            }
        }
    }
}

/// Thread-safe, load-once cache of signature file contents.
pub struct SignatureStore {
    root: PathBuf,
    source: Box<dyn FileSource>,
    cache: RwLock<HashMap<String, Option<Arc<str>>>>,
}

impl SignatureStore {
    /// Create a store reading from `root` on disk.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_source(root, DiskSource)
    }

    /// Create a store with a custom file source.
    pub fn with_source(root: impl Into<PathBuf>, source: impl FileSource + 'static) -> Self {
        Self {
            root: root.into(),
            source: Box::new(source),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The vault directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get a file's contents, loading it on first use.
    ///
    /// Missing files are cached as absent too.
    pub fn get(&self, name: &str) -> Option<Arc<str>> {
        if let Ok(cache) = self.cache.read() {
            if let Some(entry) = cache.get(name) {
                return entry.clone();
            }
        }

        let mut cache = match self.cache.write() {
            Ok(cache) => cache,
            // poisoned
            Err(_) => return self.read_uncached(name),
        };
        if let Some(entry) = cache.get(name) {
            return entry.clone();
        }

        let loaded = self.read_uncached(name);
        debug!(
            file = %name,
            bytes = loaded.as_ref().map_or(0, |c| c.len()),
            "Signature file loaded"
        );
        cache.insert(name.to_string(), loaded.clone());
        loaded
    }

    /// Read a file from the vault without touching the cache.
    pub fn read_uncached(&self, name: &str) -> Option<Arc<str>> {
        self.source
            .read(&self.root.join(name))
            .map(|data| Arc::from(String::from_utf8_lossy(&data).as_ref()))
    }

    /// Whether `name` has been loaded (or found missing) already.
    pub fn is_cached(&self, name: &str) -> bool {
        self.cache
            .read()
            .map(|c| c.contains_key(name))
            .unwrap_or(false)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached entry so files are read again on next use.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }
}
