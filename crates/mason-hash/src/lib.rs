//! Content hashing for rule key computation.
//!
//! This crate provides the file-content digest layer that both the ordinary
//! and dependency-file rule keys consult: a [`ContentHash`] digest type, a
//! per-path memoizing [`FileHashCache`] invalidated by a cheap metadata
//! signature, and a [`StackedFileHashCache`] that composes several caches
//! (e.g. one over generated outputs in front of one over the source tree)
//! queried in priority order.

mod content_hash;
mod error;
mod file_hash_cache;
mod stacked;

pub use content_hash::ContentHash;
pub use error::{HashCacheError, Result};
pub use file_hash_cache::{DefaultFileDigester, FileDigester, FileHashCache, FileHashLoader};
pub use stacked::StackedFileHashCache;
