use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::source_path::SourcePath;
use crate::target::BuildTarget;

/// Errors from [`SourcePathResolver::resolve`].
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no output root registered for target {target} (referenced as {reference})")]
    UnknownTarget {
        target: BuildTarget,
        reference: String,
    },
}

/// Resolves [`SourcePath`] references into concrete absolute paths.
///
/// Output roots are registered by action graph construction before any rule
/// key is computed. Resolution is pure path arithmetic: it is deterministic,
/// side-effect free, and cheap enough to call many times per rule key.
#[derive(Debug, Clone, Default)]
pub struct SourcePathResolver {
    project_root: PathBuf,
    output_roots: HashMap<BuildTarget, PathBuf>,
}

impl SourcePathResolver {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            output_roots: HashMap::new(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Registers the project-relative output root for `target`.
    ///
    /// Re-registering a target replaces the previous root; the action graph
    /// is expected to register each rule exactly once.
    pub fn register_output_root(&mut self, target: BuildTarget, root: impl Into<PathBuf>) {
        self.output_roots.insert(target, root.into());
    }

    /// The registered project-relative output root for `target`, if any.
    pub fn output_root(&self, target: &BuildTarget) -> Option<&Path> {
        self.output_roots.get(target).map(PathBuf::as_path)
    }

    /// Resolves a reference to an absolute filesystem path.
    pub fn resolve(&self, source: &SourcePath) -> Result<PathBuf, ResolveError> {
        match source {
            SourcePath::Path(path) => Ok(self.project_root.join(path)),
            SourcePath::BuildTargetOutput { target, path } => {
                let root = self.output_roots.get(target).ok_or_else(|| {
                    ResolveError::UnknownTarget {
                        target: target.clone(),
                        reference: source.to_string(),
                    }
                })?;
                let absolute = self.project_root.join(root);
                if path.as_os_str().is_empty() {
                    Ok(absolute)
                } else {
                    Ok(absolute.join(path))
                }
            }
        }
    }
}
