use mason_core::{BuildTarget, ResolveError};
use mason_hash::HashCacheError;

pub type Result<T> = std::result::Result<T, RuleKeyError>;

/// Errors from rule key computation.
///
/// All of these abort the current rule's key and propagate to the caller
/// unchanged; retrying a deterministic digest computation cannot succeed, so
/// the remedy is always in the rule graph or the filesystem.
#[derive(Debug, thiserror::Error)]
pub enum RuleKeyError {
    #[error(transparent)]
    Hash(#[from] HashCacheError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("source path {reference} names target {target}, but no rule is registered for it")]
    UnknownRule {
        target: BuildTarget,
        reference: String,
    },

    #[error("dependency cycle through {target} while computing its rule key")]
    Cycle { target: BuildTarget },
}
