use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::module_map::ModuleMap;
use crate::step::{ExecutionContext, StepError, StepExitCode};

fn io_error(path: &Path, source: io::Error) -> StepError {
    StepError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Removes and recreates a directory. Safe to re-run: a missing directory
/// is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanDirectoryStep {
    /// Project-relative directory to clean.
    pub path: PathBuf,
}

impl CleanDirectoryStep {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn execute(&self, ctx: &ExecutionContext) -> Result<StepExitCode, StepError> {
        let dir = ctx.absolute(&self.path);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(io_error(&dir, err)),
        }
        fs::create_dir_all(&dir).map_err(|err| io_error(&dir, err))?;
        Ok(StepExitCode::Success)
    }
}

/// Materializes a logical-path → concrete-path mapping as a symlink tree
/// under `root`.
///
/// Re-running against an already-merged tree is a no-op: links that already
/// point at the right place are left alone. A conflicting existing entry is
/// replaced only if `delete_existing` permits it; otherwise the step fails
/// rather than silently clobbering another rule's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymlinkTreeMergeStep {
    /// Label for logging, e.g. the kind of tree being merged.
    pub category: String,
    /// Project-relative root of the tree.
    pub root: PathBuf,
    /// Logical path (under `root`) → resolved source path.
    pub links: BTreeMap<PathBuf, PathBuf>,
    /// Decides whether an existing conflicting entry may be deleted.
    pub delete_existing: Option<fn(&Path) -> bool>,
}

impl SymlinkTreeMergeStep {
    pub fn new(
        category: impl Into<String>,
        root: impl Into<PathBuf>,
        links: BTreeMap<PathBuf, PathBuf>,
    ) -> Self {
        Self {
            category: category.into(),
            root: root.into(),
            links,
            delete_existing: None,
        }
    }

    pub(crate) fn execute(&self, ctx: &ExecutionContext) -> Result<StepExitCode, StepError> {
        let root = ctx.absolute(&self.root);
        for (logical, source) in &self.links {
            let dest = root.join(logical);
            let target = ctx.absolute(source);

            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|err| io_error(parent, err))?;
            }

            match fs::symlink_metadata(&dest) {
                Ok(meta) => {
                    if meta.file_type().is_symlink()
                        && fs::read_link(&dest).ok().as_deref() == Some(&target)
                    {
                        continue;
                    }
                    let may_delete = self.delete_existing.is_some_and(|pred| pred(&dest));
                    if !may_delete {
                        return Err(StepError::LinkConflict { path: dest });
                    }
                    if meta.is_dir() {
                        fs::remove_dir_all(&dest).map_err(|err| io_error(&dest, err))?;
                    } else {
                        fs::remove_file(&dest).map_err(|err| io_error(&dest, err))?;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(io_error(&dest, err)),
            }

            link_or_copy(&target, &dest)?;
        }
        Ok(StepExitCode::Success)
    }
}

#[cfg(unix)]
fn link_or_copy(target: &Path, dest: &Path) -> Result<(), StepError> {
    std::os::unix::fs::symlink(target, dest).map_err(|err| io_error(dest, err))
}

#[cfg(not(unix))]
fn link_or_copy(target: &Path, dest: &Path) -> Result<(), StepError> {
    // Symlink creation commonly needs elevated rights on Windows; a copy
    // preserves the layout contract.
    fs::copy(target, dest)
        .map(|_| ())
        .map_err(|err| io_error(dest, err))
}

/// Writes a rendered module map manifest, creating parent directories.
/// Idempotent: output depends only on the step's own data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteModuleMapStep {
    /// Project-relative manifest path.
    pub path: PathBuf,
    pub module_map: ModuleMap,
}

impl WriteModuleMapStep {
    pub fn new(path: impl Into<PathBuf>, module_map: ModuleMap) -> Self {
        Self {
            path: path.into(),
            module_map,
        }
    }

    pub(crate) fn execute(&self, ctx: &ExecutionContext) -> Result<StepExitCode, StepError> {
        let path = ctx.absolute(&self.path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| io_error(parent, err))?;
        }
        fs::write(&path, self.module_map.render()).map_err(|err| io_error(&path, err))?;
        Ok(StepExitCode::Success)
    }
}
