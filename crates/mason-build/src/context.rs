use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mason_core::{ResolveError, SourcePath, SourcePathResolver};

use crate::error::Result;
use crate::step::Step;

/// What a rule gets when asked for its steps: access to source path
/// resolution, scoped to the project root.
#[derive(Clone)]
pub struct BuildContext {
    resolver: Arc<SourcePathResolver>,
}

impl BuildContext {
    pub fn new(resolver: Arc<SourcePathResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &SourcePathResolver {
        &self.resolver
    }

    pub fn project_root(&self) -> &Path {
        self.resolver.project_root()
    }

    /// Resolves a reference to a project-relative path where possible.
    ///
    /// Steps carry project-relative paths so they compare equal across
    /// checkouts; paths outside the project stay absolute.
    pub fn resolve_rel(&self, source: &SourcePath) -> std::result::Result<PathBuf, ResolveError> {
        let absolute = self.resolver.resolve(source)?;
        Ok(match absolute.strip_prefix(self.resolver.project_root()) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => absolute,
        })
    }
}

/// Receives a rule's declarations of which output paths should be recorded
/// for caching.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildableContext {
    artifacts: BTreeSet<PathBuf>,
}

impl BuildableContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a project-relative path as a cacheable output of this rule.
    pub fn record_artifact(&mut self, path: impl Into<PathBuf>) {
        self.artifacts.insert(path.into());
    }

    pub fn recorded_artifacts(&self) -> &BTreeSet<PathBuf> {
        &self.artifacts
    }
}

/// A rule that can materialize its output as an ordered step sequence.
///
/// Steps must be idempotent and must only depend on filesystem state the
/// rule itself is responsible for, never on the execution order of other
/// rules.
pub trait Buildable {
    fn build_steps(
        &self,
        build: &BuildContext,
        buildable: &mut BuildableContext,
    ) -> Result<Vec<Step>>;
}
