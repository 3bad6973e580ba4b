use mason_core::ResolveError;

use crate::step::StepError;

pub type Result<T> = std::result::Result<T, BuildError>;

/// Errors from step generation and step execution.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("step `{description}` failed: {source}")]
    StepFailed {
        description: String,
        source: StepError,
    },

    #[error("step `{description}` exited with code {code}")]
    StepExited { description: String, code: i32 },
}
