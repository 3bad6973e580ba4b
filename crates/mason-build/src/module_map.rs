use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Whether a module map declares the generated `<Module>-Swift.h` interop
/// companion header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwiftMode {
    NoSwift,
    IncludeSwiftHeader,
}

/// A generated descriptor grouping a set of headers into a named module.
///
/// The rendered content is a pure function of the module name, the swift
/// mode, and the *set* of logical header paths. Header contents never enter
/// into it, so rule-key sensitivity to a manifest change flows through the
/// rule's declared fields, not through file hashing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMap {
    name: String,
    swift_mode: SwiftMode,
    headers: BTreeSet<PathBuf>,
}

impl ModuleMap {
    /// `headers` are logical paths as laid out in the symlink tree, e.g.
    /// `SomeModule/Header.h`. Paths outside the named module's directory
    /// are ignored; order does not matter.
    pub fn new(
        name: impl Into<String>,
        swift_mode: SwiftMode,
        headers: impl IntoIterator<Item = PathBuf>,
    ) -> Self {
        let name = name.into();
        let headers = headers
            .into_iter()
            .filter(|path| path.starts_with(&name))
            .collect();
        Self {
            name,
            swift_mode,
            headers,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn swift_mode(&self) -> SwiftMode {
        self.swift_mode
    }

    fn swift_header(&self) -> PathBuf {
        Path::new(&self.name).join(format!("{}-Swift.h", self.name))
    }

    /// Renders the `module.modulemap` content. Deterministic: headers are
    /// emitted in sorted order, relative to the module directory where the
    /// map is written.
    pub fn render(&self) -> String {
        let swift_header = self.swift_header();
        let mut out = String::new();
        let _ = writeln!(out, "module {} {{", self.name);
        for header in &self.headers {
            if self.swift_mode == SwiftMode::IncludeSwiftHeader && *header == swift_header {
                continue;
            }
            let rel = header.strip_prefix(&self.name).unwrap_or(header);
            let _ = writeln!(out, "    header \"{}\"", display_slashes(rel));
        }
        let _ = writeln!(out, "    export *");
        let _ = writeln!(out, "}}");

        if self.swift_mode == SwiftMode::IncludeSwiftHeader {
            let _ = writeln!(out);
            let _ = writeln!(out, "module {}.Swift {{", self.name);
            let _ = writeln!(out, "    header \"{}-Swift.h\"", self.name);
            let _ = writeln!(out, "    requires objc");
            let _ = writeln!(out, "}}");
        }

        out
    }
}

fn display_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
