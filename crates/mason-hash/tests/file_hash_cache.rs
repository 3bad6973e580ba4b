use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mason_hash::{ContentHash, FileDigester, FileHashCache, FileHashLoader};

/// Counts underlying content reads so memoization is observable.
#[derive(Debug, Default)]
struct CountingDigester {
    reads: AtomicUsize,
}

impl CountingDigester {
    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl FileDigester for CountingDigester {
    fn digest(&self, path: &Path) -> std::io::Result<ContentHash> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let bytes = std::fs::read(path)?;
        Ok(ContentHash::from_bytes(bytes))
    }
}

#[test]
fn unmodified_path_is_not_reread() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("header.h");
    std::fs::write(&path, "struct A;").unwrap();

    let digester = Arc::new(CountingDigester::default());
    let cache = FileHashCache::with_digester(dir.path(), digester.clone());

    let first = cache.get(&path).unwrap();
    let second = cache.get(&path).unwrap();
    let third = cache.get(&path).unwrap();

    assert_eq!(first, second);
    assert_eq!(second, third);
    assert_eq!(digester.reads(), 1, "memoized lookups must not re-read");
}

#[test]
fn modified_file_is_rehashed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("header.h");
    std::fs::write(&path, "struct A;").unwrap();

    let digester = Arc::new(CountingDigester::default());
    let cache = FileHashCache::with_digester(dir.path(), digester.clone());

    let before = cache.get(&path).unwrap();

    // Different length guarantees the invalidation token changes even on
    // filesystems with coarse mtime granularity.
    std::fs::write(&path, "struct A; struct B;").unwrap();

    let after = cache.get(&path).unwrap();
    assert_ne!(before, after);
    assert_eq!(digester.reads(), 2);
}

#[test]
fn distinct_paths_are_cached_independently() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.h");
    let b = dir.path().join("b.h");
    std::fs::write(&a, "a").unwrap();
    std::fs::write(&b, "b").unwrap();

    let digester = Arc::new(CountingDigester::default());
    let cache = FileHashCache::with_digester(dir.path(), digester.clone());

    let hash_a = cache.get(&a).unwrap();
    let hash_b = cache.get(&b).unwrap();
    assert_ne!(hash_a, hash_b);

    cache.invalidate(&a);
    assert_eq!(cache.get(&a).unwrap(), hash_a);
    assert_eq!(cache.get(&b).unwrap(), hash_b);
    assert_eq!(digester.reads(), 3, "only the invalidated path is re-read");
}
