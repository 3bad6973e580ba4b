use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use mason_core::{BuildTarget, ResolveError, SourcePath, SourcePathResolver};

use crate::builder::RuleKey;
use crate::error::RuleKeyError;
use crate::factory::RuleKeyFactory;
use crate::rule::BuildRule;

/// Errors from dependency-file reading and refined key computation.
#[derive(Debug, thiserror::Error)]
pub enum DepFileError {
    #[error("failed to read dep file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The correctness backstop against under-declared inputs: an execution
    /// reported reading a file the rule never declared, so the dependency
    /// graph is incomplete and no cached artifact for this rule can be
    /// trusted.
    #[error("dep file for {target} lists {path}, which is not among the rule's declared inputs")]
    UndeclaredInput { target: BuildTarget, path: PathBuf },

    #[error(transparent)]
    RuleKey(#[from] RuleKeyError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// The capability a rule implements to opt in to dependency-file key
/// refinement. The refinement algorithm itself is rule-kind agnostic; any
/// rule that can report its actually-used inputs may implement this.
pub trait DepFileRule: BuildRule {
    /// The declared inputs eligible for dep-file filtering. Inputs outside
    /// this set (and non-input configuration fields) always contribute to
    /// the refined key.
    fn covered_inputs(&self) -> Vec<SourcePath>;

    /// The concrete paths the last execution actually read: the tool's own
    /// dependency manifest, merged with any supplemental entries the tool
    /// cannot express itself.
    fn read_dep_file(&self, resolver: &SourcePathResolver) -> Result<Vec<PathBuf>, DepFileError>;
}

/// A refined key plus the recorded input subset that produced it.
///
/// The external cache stores this next to the conservative key. On a later
/// build the candidate key is recomputed from `used_paths` via
/// [`DepFileRuleKeyFactory::build_with_recorded_inputs`]; a match means the
/// artifact is reusable even though some declared-but-unused input changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepFileRuleKey {
    pub key: RuleKey,
    /// Project-relative paths the execution reported consuming.
    pub used_paths: BTreeSet<PathBuf>,
}

/// Pairs a precompiled-header-producing target with the recorded dependency
/// list of that header's own compilation.
///
/// Compilers do not re-emit files included via a reused precompiled header
/// in the consuming compile's dep file, so rules that consume a PCH must
/// merge these supplemental lines into their own reported input list for
/// refinement to be sound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecompiledHeaderReference {
    target: BuildTarget,
    dep_file: SourcePath,
}

impl PrecompiledHeaderReference {
    pub fn new(target: BuildTarget, dep_file: SourcePath) -> Self {
        Self { target, dep_file }
    }

    pub fn target(&self) -> &BuildTarget {
        &self.target
    }

    /// A reference to the precompiled header output itself, for declaring
    /// the PCH as an ordinary input of the consuming rule.
    pub fn source_path(&self) -> SourcePath {
        SourcePath::build_target_output(self.target.clone(), "")
    }

    /// Reads the PCH's recorded dependency list, one path per line.
    pub fn read_dep_file_lines(
        &self,
        resolver: &SourcePathResolver,
    ) -> Result<Vec<PathBuf>, DepFileError> {
        let path = resolver.resolve(&self.dep_file)?;
        read_dep_file_lines(&path)
    }
}

/// Parses a dependency manifest: one concrete path per line, blank lines
/// skipped.
pub fn read_dep_file_lines(path: &Path) -> Result<Vec<PathBuf>, DepFileError> {
    let contents = fs::read_to_string(path).map_err(|source| DepFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Computes dependency-file refined keys via the two-phase protocol.
///
/// Phase 1 (pre-execution) is the ordinary conservative key over all
/// declared inputs; it is the only usable cache key for a rule that has
/// never executed, since no manifest exists yet. Phase 2 runs after a real
/// execution recorded a manifest: the key is recomputed over only the used
/// subset, and every manifest entry is verified against the declared
/// inputs.
pub struct DepFileRuleKeyFactory {
    factory: Arc<RuleKeyFactory>,
}

impl DepFileRuleKeyFactory {
    pub fn new(factory: Arc<RuleKeyFactory>) -> Self {
        Self { factory }
    }

    /// Phase 1: the ordinary key over all declared inputs, used as the
    /// cache lookup key before any execution evidence exists.
    pub fn build_conservative(&self, rule: &dyn DepFileRule) -> Result<RuleKey, RuleKeyError> {
        self.factory.build(rule)
    }

    /// Phase 2: reads the rule's dependency manifest, verifies it against
    /// the declared inputs, and computes the refined key over the used
    /// subset.
    pub fn build_from_dep_file(
        &self,
        rule: &dyn DepFileRule,
    ) -> Result<DepFileRuleKey, DepFileError> {
        let resolver = self.factory.resolver();
        let root = resolver.project_root();

        let mut covered = BTreeSet::new();
        for input in rule.covered_inputs() {
            let resolved = resolver.resolve(&input)?;
            covered.insert(project_relative(root, &resolved));
        }

        let mut used_paths = BTreeSet::new();
        for path in rule.read_dep_file(resolver)? {
            let rel = project_relative(root, &path);
            if !covered.contains(&rel) {
                tracing::warn!(
                    target = "mason.rulekey",
                    rule = %rule.target(),
                    path = %rel.display(),
                    "dep file entry is not a declared input; artifact cannot be trusted"
                );
                return Err(DepFileError::UndeclaredInput {
                    target: rule.target().clone(),
                    path: rel,
                });
            }
            used_paths.insert(rel);
        }

        let key = self.build_with_recorded_inputs(rule, &used_paths)?;
        tracing::debug!(
            target = "mason.rulekey",
            rule = %rule.target(),
            key = %key,
            used = used_paths.len(),
            "computed dep-file rule key"
        );
        Ok(DepFileRuleKey { key, used_paths })
    }

    /// Recomputes the candidate refined key from subset membership recorded
    /// by an earlier execution. Matching the stored key means the artifact
    /// is reusable even if the conservative key changed.
    pub fn build_with_recorded_inputs(
        &self,
        rule: &dyn DepFileRule,
        used_paths: &BTreeSet<PathBuf>,
    ) -> Result<RuleKey, DepFileError> {
        let covered: BTreeSet<SourcePath> = rule.covered_inputs().into_iter().collect();
        let root = self.factory.resolver().project_root().to_path_buf();
        // Only covered inputs are subject to filtering; anything else the
        // rule appends always contributes.
        let filter = move |source: &SourcePath, resolved: &Path| {
            !covered.contains(source) || used_paths.contains(&project_relative(&root, resolved))
        };
        Ok(self.factory.build_dep_file_key(rule, &filter)?)
    }
}

fn project_relative(root: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => path.to_path_buf(),
    }
}
