use std::path::Path;
use std::sync::Arc;

use crate::content_hash::ContentHash;
use crate::error::{HashCacheError, Result};
use crate::file_hash_cache::FileHashLoader;

/// An ordered stack of hash caches queried first-match.
///
/// Typical composition puts a cache over generated outputs in front of the
/// source tree cache, so a digest request for a generated file never falls
/// through to (or populates) the broader layer. Composition is an explicit
/// list, not a chain of delegating caches, so each layer stays testable in
/// isolation.
pub struct StackedFileHashCache {
    layers: Vec<Arc<dyn FileHashLoader>>,
}

impl StackedFileHashCache {
    pub fn new(layers: Vec<Arc<dyn FileHashLoader>>) -> Self {
        Self { layers }
    }
}

impl FileHashLoader for StackedFileHashCache {
    fn serves(&self, path: &Path) -> bool {
        self.layers.iter().any(|layer| layer.serves(path))
    }

    fn get(&self, path: &Path) -> Result<ContentHash> {
        for layer in &self.layers {
            if layer.serves(path) {
                return layer.get(path);
            }
        }
        Err(HashCacheError::UnhandledPath {
            path: path.to_path_buf(),
        })
    }
}
