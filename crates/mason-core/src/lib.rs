//! Core shared types for Mason: build target identity, source references,
//! and source path resolution.
//!
//! Everything here is immutable value data plus pure path arithmetic. The
//! rule key and step layers build on these types but this crate never
//! touches the filesystem.

mod resolver;
mod source_path;
mod target;

pub use resolver::{ResolveError, SourcePathResolver};
pub use source_path::SourcePath;
pub use target::{gen_path, BuildTarget, TargetParseError};
