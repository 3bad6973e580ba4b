use std::collections::HashMap;
use std::sync::Arc;

use mason_core::BuildTarget;

use crate::builder::RuleKeyBuilder;
use crate::error::Result;

/// The capability a rule needs to participate in key computation.
///
/// Rules are immutable value objects constructed by action graph building
/// (outside this crate). A rule never caches its own key; keys live in the
/// per-build [`crate::RuleKeyFactory`] memo table.
pub trait BuildRule: Send + Sync {
    fn target(&self) -> &BuildTarget;

    /// Stable class identity string, the first contribution to the key.
    fn rule_type(&self) -> &'static str;

    /// Declared dependency rules, in declaration order.
    fn deps(&self) -> Vec<Arc<dyn BuildRule>> {
        Vec::new()
    }

    /// Contributes the rule's declared fields to the key, in declaration
    /// order. Field labels identify contributions for diagnostics; the
    /// digest itself is sensitive to call order and type tags.
    fn append_to_rule_key(&self, builder: &mut RuleKeyBuilder<'_>) -> Result<()>;
}

/// Maps targets to the rules that produce them.
///
/// The key builder consults this when a rule's input is another rule's
/// output: the producing rule's key is contributed in place of the output's
/// bytes. Populated by action graph construction before any key is
/// requested.
#[derive(Default)]
pub struct RuleResolver {
    rules: HashMap<BuildTarget, Arc<dyn BuildRule>>,
}

impl RuleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, rule: Arc<dyn BuildRule>) {
        self.rules.insert(rule.target().clone(), rule);
    }

    pub fn get(&self, target: &BuildTarget) -> Option<&Arc<dyn BuildRule>> {
        self.rules.get(target)
    }
}
