use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::BuildError;
use crate::fs_steps::{CleanDirectoryStep, SymlinkTreeMergeStep, WriteModuleMapStep};

/// What step execution gets: the project root all step-relative paths are
/// joined against.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    project_root: PathBuf,
}

impl ExecutionContext {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Joins a step-held path against the project root. Absolute paths pass
    /// through (sources outside the project).
    pub(crate) fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepExitCode {
    Success,
    Failure(i32),
}

impl StepExitCode {
    pub fn is_success(self) -> bool {
        matches!(self, StepExitCode::Success)
    }

    pub fn code(self) -> i32 {
        match self {
            StepExitCode::Success => 0,
            StepExitCode::Failure(code) => code,
        }
    }
}

/// Errors from executing a single step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("refusing to replace existing entry at {path}")]
    LinkConflict { path: PathBuf },
}

/// An atomic, idempotent filesystem mutation emitted by a rule.
///
/// The set of step kinds is closed: new rule kinds compose these variants
/// rather than subclassing an open step hierarchy. Every variant is plain
/// data, so step sequences can be logged for a dry run and compared for
/// equality in tests before anything executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    CleanDirectory(CleanDirectoryStep),
    SymlinkTreeMerge(SymlinkTreeMergeStep),
    WriteModuleMap(WriteModuleMapStep),
}

impl Step {
    pub fn short_name(&self) -> &'static str {
        match self {
            Step::CleanDirectory(_) => "clean_dir",
            Step::SymlinkTreeMerge(_) => "link_tree",
            Step::WriteModuleMap(_) => "module_map",
        }
    }

    /// A stable description for logging and failure reporting.
    pub fn description(&self) -> String {
        match self {
            Step::CleanDirectory(step) => format!("clean_dir {}", step.path.display()),
            Step::SymlinkTreeMerge(step) => format!(
                "link_tree [{}] {} ({} links)",
                step.category,
                step.root.display(),
                step.links.len()
            ),
            Step::WriteModuleMap(step) => format!("module_map {}", step.path.display()),
        }
    }

    pub fn execute(&self, ctx: &ExecutionContext) -> Result<StepExitCode, StepError> {
        match self {
            Step::CleanDirectory(step) => step.execute(ctx),
            Step::SymlinkTreeMerge(step) => step.execute(ctx),
            Step::WriteModuleMap(step) => step.execute(ctx),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// Runs steps in order, halting on the first failure.
///
/// A failing step aborts the remaining steps of this rule; the error names
/// the failing step's description so the failure is diagnosable from logs
/// alone.
pub fn run_steps(steps: &[Step], ctx: &ExecutionContext) -> Result<(), BuildError> {
    for step in steps {
        tracing::info!(
            target = "mason.build",
            step = step.short_name(),
            description = %step.description(),
            "running step"
        );
        let exit = step.execute(ctx).map_err(|source| BuildError::StepFailed {
            description: step.description(),
            source,
        })?;
        if !exit.is_success() {
            return Err(BuildError::StepExited {
                description: step.description(),
                code: exit.code(),
            });
        }
    }
    Ok(())
}
