use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use mason_core::{gen_path, BuildTarget, SourcePath};
use mason_rulekey::{BuildRule, RuleKeyBuilder};

use crate::context::{BuildContext, Buildable, BuildableContext};
use crate::error::Result;
use crate::fs_steps::{CleanDirectoryStep, SymlinkTreeMergeStep, WriteModuleMapStep};
use crate::module_map::{ModuleMap, SwiftMode};
use crate::step::Step;

/// Merges a mapping of logical header paths onto resolved sources as a
/// symlink tree and generates a module map manifest for the layout.
///
/// The manifest is computed purely from the set of logical paths and the
/// detected swift mode, so key sensitivity to a module-name or path-set
/// change flows entirely through the declared-field contributions; this
/// rule has no dependency-file refinement.
pub struct HeaderLayoutRule {
    target: BuildTarget,
    /// Project-relative root the symlink tree is merged into.
    output_root: PathBuf,
    /// Logical header path → input reference. Keys unique by construction.
    links: BTreeMap<PathBuf, SourcePath>,
    /// Overrides the module name otherwise derived from the link paths.
    module_name: Option<String>,
}

impl HeaderLayoutRule {
    pub fn new(
        target: BuildTarget,
        output_root: impl Into<PathBuf>,
        links: BTreeMap<PathBuf, SourcePath>,
    ) -> Self {
        Self {
            target,
            output_root: output_root.into(),
            links,
            module_name: None,
        }
    }

    pub fn with_module_name(mut self, name: impl Into<String>) -> Self {
        self.module_name = Some(name.into());
        self
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// The module this layout describes: the configured override, or the
    /// leading path component of the (lexicographically first) logical
    /// link. `None` for an empty mapping.
    pub fn module_name(&self) -> Option<String> {
        if let Some(name) = &self.module_name {
            return Some(name.clone());
        }
        let first = self.links.keys().next()?;
        first
            .components()
            .next()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
    }

    /// Where the generated manifest lives: under the target's gen root, in
    /// the module's directory.
    pub fn module_map_path(&self) -> Option<PathBuf> {
        let module = self.module_name()?;
        Some(gen_path(&self.target).join(module).join("module.modulemap"))
    }

    fn swift_mode(&self, module: &str) -> SwiftMode {
        let companion = format!("{module}-Swift.h");
        let has_companion = self
            .links
            .keys()
            .any(|logical| logical.file_name().is_some_and(|name| *name == *companion.as_str()));
        if has_companion {
            SwiftMode::IncludeSwiftHeader
        } else {
            SwiftMode::NoSwift
        }
    }
}

impl BuildRule for HeaderLayoutRule {
    fn target(&self) -> &BuildTarget {
        &self.target
    }

    fn rule_type(&self) -> &'static str {
        "header_layout"
    }

    fn append_to_rule_key(&self, builder: &mut RuleKeyBuilder<'_>) -> mason_rulekey::Result<()> {
        builder.field_path("output_root", &self.output_root);
        builder.field_opt_str("module_name", self.module_name.as_deref());
        builder.field_source_path_map("links", &self.links)?;
        Ok(())
    }
}

impl Buildable for HeaderLayoutRule {
    fn build_steps(
        &self,
        build: &BuildContext,
        buildable: &mut BuildableContext,
    ) -> Result<Vec<Step>> {
        let mut resolved = BTreeMap::new();
        for (logical, source) in &self.links {
            resolved.insert(logical.clone(), build.resolve_rel(source)?);
        }

        let mut steps = vec![
            Step::CleanDirectory(CleanDirectoryStep::new(self.output_root.clone())),
            Step::SymlinkTreeMerge(SymlinkTreeMergeStep::new(
                "cxx_header",
                self.output_root.clone(),
                resolved,
            )),
        ];

        if let Some(module) = self.module_name() {
            let map_path = gen_path(&self.target).join(&module).join("module.modulemap");
            let module_map = ModuleMap::new(
                module.clone(),
                self.swift_mode(&module),
                self.links.keys().cloned(),
            );
            steps.push(Step::WriteModuleMap(WriteModuleMapStep::new(
                map_path.clone(),
                module_map,
            )));
            buildable.record_artifact(map_path);
        }

        buildable.record_artifact(self.output_root.clone());
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_with_links(paths: &[&str]) -> HeaderLayoutRule {
        let links = paths
            .iter()
            .map(|path| (PathBuf::from(path), SourcePath::path(format!("src/{path}"))))
            .collect();
        HeaderLayoutRule::new(
            BuildTarget::parse("//test:test").unwrap(),
            "out/gen/test/test/symlink-tree-root",
            links,
        )
    }

    #[test]
    fn module_name_derived_from_links() {
        let rule = rule_with_links(&["SomeModule/Header.h", "SomeModule/SomeModule.h"]);
        assert_eq!(rule.module_name().as_deref(), Some("SomeModule"));
    }

    #[test]
    fn module_name_override_wins() {
        let rule = rule_with_links(&["SomeModule/Header.h"]).with_module_name("Renamed");
        assert_eq!(rule.module_name().as_deref(), Some("Renamed"));
    }

    #[test]
    fn empty_mapping_has_no_module() {
        let rule = rule_with_links(&[]);
        assert_eq!(rule.module_name(), None);
        assert_eq!(rule.module_map_path(), None);
    }

    #[test]
    fn swift_companion_is_detected() {
        let plain = rule_with_links(&["SomeModule/Header.h"]);
        assert_eq!(plain.swift_mode("SomeModule"), SwiftMode::NoSwift);

        let swift = rule_with_links(&["SomeModule/Header.h", "SomeModule/SomeModule-Swift.h"]);
        assert_eq!(
            swift.swift_mode("SomeModule"),
            SwiftMode::IncludeSwiftHeader
        );
    }
}
