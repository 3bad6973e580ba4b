//! The build action model: ordered, deterministic, replayable filesystem
//! steps that a rule emits to materialize its output.
//!
//! Steps are data before they are ever executed: describable for dry-run
//! logging, comparable in tests, and idempotent against partially-completed
//! output. The [`HeaderLayoutRule`] is the representative composite
//! buildable: it cleans its output root, merges a logical-to-concrete
//! symlink mapping into it, and writes a module map manifest derived purely
//! from the logical path set.

mod context;
mod error;
mod fs_steps;
mod header_layout;
mod logging;
mod module_map;
mod step;

pub use context::{BuildContext, Buildable, BuildableContext};
pub use error::{BuildError, Result};
pub use logging::init_logging;
pub use fs_steps::{CleanDirectoryStep, SymlinkTreeMergeStep, WriteModuleMapStep};
pub use header_layout::HeaderLayoutRule;
pub use module_map::{ModuleMap, SwiftMode};
pub use step::{run_steps, ExecutionContext, Step, StepError, StepExitCode};
