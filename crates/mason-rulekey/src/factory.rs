use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use mason_core::{BuildTarget, SourcePath, SourcePathResolver};
use mason_hash::FileHashLoader;

use crate::builder::{Contribution, RuleKey, RuleKeyBuilder};
use crate::error::{Result, RuleKeyError};
use crate::rule::{BuildRule, RuleResolver};

/// Distinguishes ordinary keys from dependency-file refined keys so the two
/// can never collide for the same rule.
#[derive(Debug, Clone, Copy)]
pub(crate) enum KeyKind {
    Default,
    DepFile,
}

impl KeyKind {
    fn as_str(self) -> &'static str {
        match self {
            KeyKind::Default => "default",
            KeyKind::DepFile => "dep-file",
        }
    }
}

/// Computes and memoizes rule keys for one build invocation.
///
/// The factory is owned by the build driver and dropped at build end; the
/// memo table is the only mutable state and is keyed by immutable
/// [`BuildTarget`] identities. Each rule gets a per-target slot whose lock
/// is held for the duration of that rule's computation, so concurrent
/// requests for the same uncomputed key block on the in-flight computation
/// instead of racing, while requests for unrelated rules proceed.
///
/// Keys are demanded depth-first: a rule's key computation recursively
/// obtains its dependencies' keys first. Because slot locks are only ever
/// acquired along dependency edges, an acyclic rule graph cannot deadlock;
/// cycles within one demand tree are detected and reported.
///
/// Errors are propagated unchanged and never cached: a failed slot is left
/// empty rather than poisoned.
pub struct RuleKeyFactory {
    resolver: Arc<SourcePathResolver>,
    hash_loader: Arc<dyn FileHashLoader>,
    rules: RuleResolver,
    memo: Mutex<HashMap<BuildTarget, Arc<Mutex<Option<RuleKey>>>>>,
}

impl RuleKeyFactory {
    pub fn new(resolver: Arc<SourcePathResolver>, hash_loader: Arc<dyn FileHashLoader>) -> Self {
        Self {
            resolver,
            hash_loader,
            rules: RuleResolver::new(),
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Supplies the producing-rule lookup used to key rule-output inputs.
    pub fn with_rules(mut self, rules: RuleResolver) -> Self {
        self.rules = rules;
        self
    }

    pub(crate) fn resolver(&self) -> &SourcePathResolver {
        &self.resolver
    }

    pub(crate) fn hash_loader(&self) -> &dyn FileHashLoader {
        self.hash_loader.as_ref()
    }

    pub(crate) fn rule_for(&self, target: &BuildTarget) -> Option<&Arc<dyn BuildRule>> {
        self.rules.get(target)
    }

    /// Computes (or returns the memoized) key for `rule`.
    pub fn build(&self, rule: &dyn BuildRule) -> Result<RuleKey> {
        let mut visiting = Vec::new();
        self.build_inner(rule, &mut visiting)
    }

    /// Recomputes `rule`'s key from scratch, recording every labeled
    /// contribution for diagnostics. Dependency sub-keys still come from the
    /// memo table; only this rule's own contributions are expanded.
    pub fn audit(&self, rule: &dyn BuildRule) -> Result<(RuleKey, Vec<Contribution>)> {
        let mut visiting = vec![rule.target().clone()];
        let (key, contributions) =
            self.compute_key(rule, &mut visiting, None, KeyKind::Default, true)?;
        Ok((key, contributions.unwrap_or_default()))
    }

    pub(crate) fn build_inner(
        &self,
        rule: &dyn BuildRule,
        visiting: &mut Vec<BuildTarget>,
    ) -> Result<RuleKey> {
        let target = rule.target();
        if visiting.contains(target) {
            return Err(RuleKeyError::Cycle {
                target: target.clone(),
            });
        }

        let slot = {
            let mut memo = self.memo.lock().expect("rule key memo lock poisoned");
            memo.entry(target.clone())
                .or_insert_with(|| Arc::new(Mutex::new(None)))
                .clone()
        };

        // Holding the slot lock across the computation is what makes the
        // expensive hash walk at-most-once per rule per build.
        let mut guard = slot.lock().expect("rule key slot lock poisoned");
        if let Some(key) = guard.as_ref() {
            return Ok(key.clone());
        }

        visiting.push(target.clone());
        let result = self.compute_key(rule, visiting, None, KeyKind::Default, false);
        visiting.pop();

        let (key, _) = result?;
        *guard = Some(key.clone());
        tracing::debug!(
            target = "mason.rulekey",
            rule = %rule.target(),
            key = %key,
            "computed rule key"
        );
        Ok(key)
    }

    /// Computes a dependency-file refined key: same structure as the default
    /// key, but literal inputs rejected by `filter` contribute nothing.
    pub(crate) fn build_dep_file_key(
        &self,
        rule: &dyn BuildRule,
        filter: &dyn Fn(&SourcePath, &Path) -> bool,
    ) -> Result<RuleKey> {
        let mut visiting = vec![rule.target().clone()];
        let (key, _) = self.compute_key(rule, &mut visiting, Some(filter), KeyKind::DepFile, false)?;
        Ok(key)
    }

    fn compute_key(
        &self,
        rule: &dyn BuildRule,
        visiting: &mut Vec<BuildTarget>,
        filter: Option<&dyn Fn(&SourcePath, &Path) -> bool>,
        kind: KeyKind,
        record_contributions: bool,
    ) -> Result<(RuleKey, Option<Vec<Contribution>>)> {
        let mut builder = RuleKeyBuilder::new(self, visiting, filter, record_contributions);
        builder.field_str(".key_kind", kind.as_str());
        builder.field_str(".rule_type", rule.rule_type());
        builder.field_target(".target", rule.target());

        rule.append_to_rule_key(&mut builder)?;

        for dep in rule.deps() {
            let key = self.build_inner(dep.as_ref(), &mut *builder.visiting)?;
            builder.field_rule_key(".dep", &key);
        }

        Ok(builder.finish())
    }
}
