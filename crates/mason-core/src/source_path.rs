use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::target::BuildTarget;

/// An abstract reference to a build input: either a literal path in the
/// source tree, or a path under another rule's output root.
///
/// A `SourcePath` only becomes a concrete filesystem path through a
/// [`crate::SourcePathResolver`] that knows where producing rules put their
/// outputs. Rule configurations hold these by value; a rule output reference
/// must never (transitively) point back at its own rule.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourcePath {
    /// A project-root-relative path into the source tree.
    Path(PathBuf),

    /// A path relative to `target`'s output root. An empty `path` refers to
    /// the output root itself.
    BuildTargetOutput { target: BuildTarget, path: PathBuf },
}

impl SourcePath {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        SourcePath::Path(path.into())
    }

    pub fn build_target_output(target: BuildTarget, path: impl Into<PathBuf>) -> Self {
        SourcePath::BuildTargetOutput {
            target,
            path: path.into(),
        }
    }

    /// The producing rule, if this reference points at a rule output.
    pub fn producing_target(&self) -> Option<&BuildTarget> {
        match self {
            SourcePath::Path(_) => None,
            SourcePath::BuildTargetOutput { target, .. } => Some(target),
        }
    }
}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourcePath::Path(path) => write!(f, "//{}", path.display()),
            SourcePath::BuildTargetOutput { target, path } => {
                if path.as_os_str().is_empty() {
                    write!(f, "{target}$(output)")
                } else {
                    write!(f, "{target}$(output)/{}", path.display())
                }
            }
        }
    }
}
