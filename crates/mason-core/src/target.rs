use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A unique, hierarchical identifier for a build rule.
///
/// Rendered canonically as `cell//base/path:name#flavor1,flavor2`. The cell
/// is optional (the root cell renders as a bare `//`), flavors are kept
/// sorted so two targets that differ only in flavor declaration order are
/// the same target.
///
/// Targets are immutable and used as map keys throughout the build: the rule
/// key memo table, resolver output roots, and dep-file records are all keyed
/// by `BuildTarget`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildTarget {
    cell: Option<String>,
    base_path: String,
    name: String,
    flavors: BTreeSet<String>,
}

/// Errors from [`BuildTarget::parse`].
#[derive(Debug, thiserror::Error)]
pub enum TargetParseError {
    #[error("build target `{input}` is missing the `//` root separator")]
    MissingRootSeparator { input: String },

    #[error("build target `{input}` is missing the `:` before the rule name")]
    MissingName { input: String },

    #[error("build target `{input}` has an empty rule name")]
    EmptyName { input: String },

    #[error("build target `{input}` has an empty flavor")]
    EmptyFlavor { input: String },
}

impl BuildTarget {
    pub fn new(cell: Option<String>, base_path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            cell,
            base_path: base_path.into(),
            name: name.into(),
            flavors: BTreeSet::new(),
        }
    }

    /// Returns a copy of this target with `flavor` added.
    pub fn with_flavor(mut self, flavor: impl Into<String>) -> Self {
        self.flavors.insert(flavor.into());
        self
    }

    /// Parses the canonical `cell//base/path:name#flavors` form.
    pub fn parse(input: &str) -> Result<Self, TargetParseError> {
        let Some((cell, rest)) = input.split_once("//") else {
            return Err(TargetParseError::MissingRootSeparator {
                input: input.to_string(),
            });
        };
        let cell = if cell.is_empty() {
            None
        } else {
            Some(cell.to_string())
        };

        let Some((base_path, name_and_flavors)) = rest.split_once(':') else {
            return Err(TargetParseError::MissingName {
                input: input.to_string(),
            });
        };

        let (name, flavors) = match name_and_flavors.split_once('#') {
            Some((name, flavors)) => {
                let mut set = BTreeSet::new();
                for flavor in flavors.split(',') {
                    if flavor.is_empty() {
                        return Err(TargetParseError::EmptyFlavor {
                            input: input.to_string(),
                        });
                    }
                    set.insert(flavor.to_string());
                }
                (name, set)
            }
            None => (name_and_flavors, BTreeSet::new()),
        };

        if name.is_empty() {
            return Err(TargetParseError::EmptyName {
                input: input.to_string(),
            });
        }

        Ok(Self {
            cell,
            base_path: base_path.to_string(),
            name: name.to_string(),
            flavors,
        })
    }

    pub fn cell(&self) -> Option<&str> {
        self.cell.as_deref()
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flavors(&self) -> impl Iterator<Item = &str> {
        self.flavors.iter().map(String::as_str)
    }

    /// The directory-safe short name, `name` plus any flavors.
    ///
    /// Used when mapping a target onto an output path so that two flavors of
    /// the same rule never share an output directory.
    pub fn flavored_name(&self) -> String {
        if self.flavors.is_empty() {
            self.name.clone()
        } else {
            let flavors: Vec<&str> = self.flavors.iter().map(String::as_str).collect();
            format!("{}#{}", self.name, flavors.join(","))
        }
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(cell) = &self.cell {
            write!(f, "{cell}")?;
        }
        write!(f, "//{}:{}", self.base_path, self.name)?;
        if !self.flavors.is_empty() {
            let flavors: Vec<&str> = self.flavors.iter().map(String::as_str).collect();
            write!(f, "#{}", flavors.join(","))?;
        }
        Ok(())
    }
}

/// The conventional project-relative root for a target's generated outputs:
/// `out/gen/<base_path>/<flavored name>`.
///
/// Rules that produce files place them under this root; the resolver maps
/// `SourcePath::BuildTargetOutput` references into it once the action graph
/// registers the rule.
pub fn gen_path(target: &BuildTarget) -> PathBuf {
    PathBuf::from("out")
        .join("gen")
        .join(target.base_path())
        .join(target.flavored_name())
}
