use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use mason_build::{
    run_steps, BuildContext, Buildable, BuildableContext, CleanDirectoryStep, ExecutionContext,
    HeaderLayoutRule, ModuleMap, Step, SwiftMode, SymlinkTreeMergeStep, WriteModuleMapStep,
};
use mason_core::{gen_path, BuildTarget, SourcePath, SourcePathResolver};
use mason_hash::{FileHashCache, StackedFileHashCache};
use mason_rulekey::RuleKeyFactory;

fn layout_target() -> BuildTarget {
    BuildTarget::parse("//lib:header-layout").expect("valid target")
}

fn links(entries: &[(&str, &str)]) -> BTreeMap<PathBuf, SourcePath> {
    entries
        .iter()
        .map(|(logical, source)| (PathBuf::from(logical), SourcePath::path(*source)))
        .collect()
}

fn tree_root() -> PathBuf {
    gen_path(&layout_target()).join("tree")
}

fn build_context(project_root: &std::path::Path) -> BuildContext {
    BuildContext::new(Arc::new(SourcePathResolver::new(project_root)))
}

#[test]
fn emits_clean_merge_and_module_map_steps() {
    let rule = HeaderLayoutRule::new(
        layout_target(),
        tree_root(),
        links(&[
            ("SomeModule/SomeModule.h", "src/SomeModule.h"),
            ("SomeModule/Header.h", "src/Header.h"),
        ]),
    );

    let ctx = build_context(std::path::Path::new("/repo"));
    let mut buildable = BuildableContext::new();
    let steps = rule.build_steps(&ctx, &mut buildable).expect("build steps");

    let resolved = [
        ("SomeModule/Header.h", "src/Header.h"),
        ("SomeModule/SomeModule.h", "src/SomeModule.h"),
    ]
    .iter()
    .map(|(logical, source)| (PathBuf::from(logical), PathBuf::from(source)))
    .collect();
    let map_path = gen_path(&layout_target())
        .join("SomeModule")
        .join("module.modulemap");
    let expected = vec![
        Step::CleanDirectory(CleanDirectoryStep::new(tree_root())),
        Step::SymlinkTreeMerge(SymlinkTreeMergeStep::new("cxx_header", tree_root(), resolved)),
        Step::WriteModuleMap(WriteModuleMapStep::new(
            map_path.clone(),
            ModuleMap::new(
                "SomeModule",
                SwiftMode::NoSwift,
                vec![
                    PathBuf::from("SomeModule/Header.h"),
                    PathBuf::from("SomeModule/SomeModule.h"),
                ],
            ),
        )),
    ];
    assert_eq!(steps, expected);

    assert!(buildable.recorded_artifacts().contains(&tree_root()));
    assert!(buildable.recorded_artifacts().contains(&map_path));
}

#[test]
fn swift_companion_header_switches_module_map_mode() {
    let rule = HeaderLayoutRule::new(
        layout_target(),
        tree_root(),
        links(&[
            ("SomeModule/Header.h", "src/Header.h"),
            ("SomeModule/SomeModule-Swift.h", "out/SomeModule-Swift.h"),
        ]),
    );

    let ctx = build_context(std::path::Path::new("/repo"));
    let mut buildable = BuildableContext::new();
    let steps = rule.build_steps(&ctx, &mut buildable).expect("build steps");

    let module_map = match steps.last() {
        Some(Step::WriteModuleMap(step)) => &step.module_map,
        other => panic!("expected module map step, got {other:?}"),
    };
    assert_eq!(module_map.swift_mode(), SwiftMode::IncludeSwiftHeader);
    assert!(module_map.render().contains("module SomeModule.Swift {"));
}

#[test]
fn rule_key_changes_with_module_name() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    fs::create_dir_all(root.join("src")).expect("mkdir");
    fs::write(root.join("src/Header.h"), "#pragma once\n").expect("write header");

    let key_for = |module_override: Option<&str>| {
        let mut rule = HeaderLayoutRule::new(
            layout_target(),
            tree_root(),
            links(&[("SomeModule/Header.h", "src/Header.h")]),
        );
        if let Some(name) = module_override {
            rule = rule.with_module_name(name);
        }
        let resolver = Arc::new(SourcePathResolver::new(root));
        let loader = Arc::new(StackedFileHashCache::new(vec![Arc::new(
            FileHashCache::new(root),
        )]));
        RuleKeyFactory::new(resolver, loader)
            .build(&rule)
            .expect("rule key")
    };

    assert_eq!(key_for(None), key_for(None));
    assert_ne!(key_for(None), key_for(Some("RenamedModule")));
}

#[test]
fn executing_steps_twice_is_idempotent() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    fs::create_dir_all(root.join("src")).expect("mkdir");
    fs::write(root.join("src/Header.h"), "#pragma once\n").expect("write header");
    fs::write(root.join("src/SomeModule.h"), "#include \"Header.h\"\n").expect("write header");

    let rule = HeaderLayoutRule::new(
        layout_target(),
        tree_root(),
        links(&[
            ("SomeModule/Header.h", "src/Header.h"),
            ("SomeModule/SomeModule.h", "src/SomeModule.h"),
        ]),
    );

    let ctx = build_context(root);
    let mut buildable = BuildableContext::new();
    let steps = rule.build_steps(&ctx, &mut buildable).expect("build steps");

    let exec = ExecutionContext::new(root);
    run_steps(&steps, &exec).expect("first run");

    let linked = root.join(tree_root()).join("SomeModule/Header.h");
    assert_eq!(
        fs::read_to_string(&linked).expect("read through link"),
        "#pragma once\n"
    );
    let map_path = root
        .join(gen_path(&layout_target()))
        .join("SomeModule/module.modulemap");
    let rendered = fs::read_to_string(&map_path).expect("read module map");
    assert!(rendered.starts_with("module SomeModule {"));
    assert!(rendered.contains("header \"Header.h\""));

    // Re-running over the completed output must not fail or change it.
    run_steps(&steps, &exec).expect("second run");
    assert_eq!(
        fs::read_to_string(&map_path).expect("read module map"),
        rendered
    );
}

#[test]
fn merge_refuses_to_clobber_foreign_output() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    fs::create_dir_all(root.join("src")).expect("mkdir");
    fs::write(root.join("src/Header.h"), "#pragma once\n").expect("write header");

    let dest_dir = root.join(tree_root()).join("SomeModule");
    fs::create_dir_all(&dest_dir).expect("mkdir");
    fs::write(dest_dir.join("Header.h"), "not ours\n").expect("write conflict");

    let resolved = [("SomeModule/Header.h", "src/Header.h")]
        .iter()
        .map(|(logical, source)| (PathBuf::from(logical), PathBuf::from(source)))
        .collect();
    let steps = vec![Step::SymlinkTreeMerge(SymlinkTreeMergeStep::new(
        "cxx_header",
        tree_root(),
        resolved,
    ))];

    let exec = ExecutionContext::new(root);
    run_steps(&steps, &exec).expect_err("conflicting entry must fail the step");
}
