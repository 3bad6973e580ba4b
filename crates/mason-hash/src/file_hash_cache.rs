use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::UNIX_EPOCH;

use crate::content_hash::ContentHash;
use crate::error::{HashCacheError, Result};

/// Source of content digests for a set of paths.
///
/// The trait is intentionally small so it can be implemented by a single
/// memoizing cache, a stack of caches, or a test fake.
pub trait FileHashLoader: Send + Sync {
    /// Whether this loader is responsible for `path`.
    ///
    /// A stacked cache uses this to pick the first layer that claims a path
    /// without forcing lower layers to compute anything.
    fn serves(&self, path: &Path) -> bool;

    /// The digest of the file's current content.
    fn get(&self, path: &Path) -> Result<ContentHash>;
}

/// Reads file content into a digest. Split out from the cache so tests can
/// count underlying reads.
pub trait FileDigester: Send + Sync {
    fn digest(&self, path: &Path) -> io::Result<ContentHash>;
}

/// Digests files straight from the local filesystem.
#[derive(Debug, Default)]
pub struct DefaultFileDigester;

impl FileDigester for DefaultFileDigester {
    fn digest(&self, path: &Path) -> io::Result<ContentHash> {
        let file = fs::File::open(path)?;
        ContentHash::from_reader(file)
    }
}

/// A cheap signature of a file's on-disk state, used to decide whether a
/// memoized digest is still valid without re-reading content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InvalidationToken {
    len: u64,
    mtime_nanos: u128,
}

impl InvalidationToken {
    fn for_path(path: &Path) -> io::Result<Self> {
        let meta = fs::metadata(path)?;
        let mtime_nanos = match meta.modified() {
            Ok(time) => time
                .duration_since(UNIX_EPOCH)
                .map(|dur| dur.as_nanos())
                .unwrap_or(0),
            // Filesystems without mtime support degrade to size-only
            // invalidation rather than failing the build.
            Err(_) => 0,
        };
        Ok(Self {
            len: meta.len(),
            mtime_nanos,
        })
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    token: InvalidationToken,
    hash: ContentHash,
}

/// A per-path memoizing content hash cache over one filesystem root.
///
/// Each entry remembers the digest together with the invalidation token
/// observed when it was computed; a lookup whose current token differs
/// recomputes and replaces the entry. Digests are computed outside the map
/// lock, so populating one path does not block reads of unrelated paths.
/// Entries are always complete `(token, digest)` pairs, never torn values,
/// so an aborted build leaves the cache usable.
///
/// The cache only ever reads the filesystem.
pub struct FileHashCache {
    root: PathBuf,
    digester: Arc<dyn FileDigester>,
    entries: RwLock<HashMap<PathBuf, CacheEntry>>,
}

impl FileHashCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_digester(root, Arc::new(DefaultFileDigester))
    }

    pub fn with_digester(root: impl Into<PathBuf>, digester: Arc<dyn FileDigester>) -> Self {
        Self {
            root: root.into(),
            digester,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Drops the memoized entry for `path`, forcing the next lookup to
    /// recompute.
    pub fn invalidate(&self, path: &Path) {
        self.entries
            .write()
            .expect("hash cache lock poisoned")
            .remove(path);
    }

    /// Drops every memoized entry.
    pub fn invalidate_all(&self) {
        self.entries
            .write()
            .expect("hash cache lock poisoned")
            .clear();
    }

    fn io_error(path: &Path, source: io::Error) -> HashCacheError {
        HashCacheError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl FileHashLoader for FileHashCache {
    fn serves(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    fn get(&self, path: &Path) -> Result<ContentHash> {
        let token =
            InvalidationToken::for_path(path).map_err(|source| Self::io_error(path, source))?;

        {
            let entries = self.entries.read().expect("hash cache lock poisoned");
            if let Some(entry) = entries.get(path) {
                if entry.token == token {
                    return Ok(entry.hash.clone());
                }
            }
        }

        tracing::debug!(
            target = "mason.hash",
            path = %path.display(),
            "hashing file content"
        );
        let hash = self
            .digester
            .digest(path)
            .map_err(|source| Self::io_error(path, source))?;

        // Two concurrent lookups for the same modified path may both hash
        // it; either entry is a valid digest for the observed token, so the
        // last writer winning is fine.
        self.entries
            .write()
            .expect("hash cache lock poisoned")
            .insert(
                path.to_path_buf(),
                CacheEntry {
                    token,
                    hash: hash.clone(),
                },
            );
        Ok(hash)
    }
}
