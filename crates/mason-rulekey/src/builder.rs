use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use mason_core::{BuildTarget, SourcePath};

use crate::error::{Result, RuleKeyError};
use crate::factory::RuleKeyFactory;

/// An opaque, deterministic fingerprint over a rule's configuration and
/// transitive content. Two keys are equal iff their digests are equal.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleKey(String);

impl RuleKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RuleKey({}..)", &self.0[..8.min(self.0.len())])
    }
}

/// One labeled contribution to a key, recorded when the factory is built
/// with diagnostics enabled. Ordered as appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    pub label: String,
    pub value: String,
}

// Type tags keep adjacent contributions from colliding: every value is
// encoded as (field marker, label, tag, length-prefixed payload).
const TAG_FIELD: u8 = 0x01;
const TAG_STR: u8 = 0x10;
const TAG_U64: u8 = 0x11;
const TAG_BOOL: u8 = 0x12;
const TAG_NONE: u8 = 0x13;
const TAG_SOME: u8 = 0x14;
const TAG_SEQ_START: u8 = 0x15;
const TAG_SEQ_END: u8 = 0x16;
const TAG_MAP_START: u8 = 0x17;
const TAG_MAP_END: u8 = 0x18;
const TAG_PATH: u8 = 0x19;
const TAG_TARGET: u8 = 0x1a;
const TAG_RULE_KEY: u8 = 0x1b;
const TAG_SOURCE_HASH: u8 = 0x1c;
const TAG_SOURCE_KEY: u8 = 0x1d;

/// Mutable accumulator for one rule's key.
///
/// Contributions are appended in call order, which by convention is the
/// declaration order of the rule's fields; the rule class identity plus
/// ordinal position acts as the type witness, so labels exist for
/// diagnostics rather than for the digest's correctness.
///
/// `field_source_path` never hashes an input's raw bytes: a literal path
/// contributes the file's content digest from the hash cache, and a rule
/// output contributes the producing rule's (memoized) key. That keeps a
/// dependency's contribution O(1) amortized instead of a re-walk of its
/// output tree.
pub struct RuleKeyBuilder<'a> {
    factory: &'a RuleKeyFactory,
    pub(crate) visiting: &'a mut Vec<BuildTarget>,
    filter: Option<&'a dyn Fn(&SourcePath, &Path) -> bool>,
    hasher: Sha256,
    contributions: Option<Vec<Contribution>>,
}

impl<'a> RuleKeyBuilder<'a> {
    pub(crate) fn new(
        factory: &'a RuleKeyFactory,
        visiting: &'a mut Vec<BuildTarget>,
        filter: Option<&'a dyn Fn(&SourcePath, &Path) -> bool>,
        record_contributions: bool,
    ) -> Self {
        Self {
            factory,
            visiting,
            filter,
            hasher: Sha256::new(),
            contributions: record_contributions.then(Vec::new),
        }
    }

    fn raw(&mut self, bytes: &[u8]) {
        self.hasher.update((bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }

    fn tag(&mut self, tag: u8) {
        self.hasher.update([tag]);
    }

    fn begin_field(&mut self, label: &str) {
        self.tag(TAG_FIELD);
        self.raw(label.as_bytes());
    }

    fn record(&mut self, label: &str, value: impl Into<String>) {
        if let Some(contributions) = &mut self.contributions {
            contributions.push(Contribution {
                label: label.to_string(),
                value: value.into(),
            });
        }
    }

    pub fn field_str(&mut self, label: &str, value: &str) -> &mut Self {
        self.begin_field(label);
        self.tag(TAG_STR);
        self.raw(value.as_bytes());
        self.record(label, format!("string({value:?})"));
        self
    }

    pub fn field_u64(&mut self, label: &str, value: u64) -> &mut Self {
        self.begin_field(label);
        self.tag(TAG_U64);
        self.raw(&value.to_le_bytes());
        self.record(label, format!("u64({value})"));
        self
    }

    pub fn field_bool(&mut self, label: &str, value: bool) -> &mut Self {
        self.begin_field(label);
        self.tag(TAG_BOOL);
        self.raw(&[u8::from(value)]);
        self.record(label, format!("bool({value})"));
        self
    }

    pub fn field_opt_str(&mut self, label: &str, value: Option<&str>) -> &mut Self {
        self.begin_field(label);
        match value {
            None => {
                self.tag(TAG_NONE);
                self.record(label, "none");
            }
            Some(value) => {
                self.tag(TAG_SOME);
                self.tag(TAG_STR);
                self.raw(value.as_bytes());
                self.record(label, format!("some(string({value:?}))"));
            }
        }
        self
    }

    pub fn field_str_seq<S: AsRef<str>>(&mut self, label: &str, values: &[S]) -> &mut Self {
        self.begin_field(label);
        self.tag(TAG_SEQ_START);
        for value in values {
            self.tag(TAG_STR);
            self.raw(value.as_ref().as_bytes());
        }
        self.tag(TAG_SEQ_END);
        let rendered: Vec<&str> = values.iter().map(AsRef::as_ref).collect();
        self.record(label, format!("seq({rendered:?})"));
        self
    }

    /// A plain path-valued field (a project-relative layout path, not an
    /// input whose content matters).
    pub fn field_path(&mut self, label: &str, value: &Path) -> &mut Self {
        self.begin_field(label);
        self.tag(TAG_PATH);
        self.raw(path_bytes(value).as_bytes());
        self.record(label, format!("path({})", value.display()));
        self
    }

    pub fn field_target(&mut self, label: &str, value: &BuildTarget) -> &mut Self {
        self.begin_field(label);
        self.tag(TAG_TARGET);
        self.raw(value.to_string().as_bytes());
        self.record(label, format!("target({value})"));
        self
    }

    pub fn field_rule_key(&mut self, label: &str, value: &RuleKey) -> &mut Self {
        self.begin_field(label);
        self.tag(TAG_RULE_KEY);
        self.raw(value.as_str().as_bytes());
        self.record(label, format!("key({value})"));
        self
    }

    /// Contributes an input reference.
    ///
    /// A literal path contributes its rendered reference plus the file's
    /// content digest; a rule output contributes the producing rule's key,
    /// computed through the factory (recursively, with memoization). An
    /// input rejected by the dep-file filter contributes nothing at all, so
    /// unused declared inputs cannot perturb a refined key.
    pub fn field_source_path(&mut self, label: &str, source: &SourcePath) -> Result<&mut Self> {
        let resolved = self.factory.resolver().resolve(source)?;
        if let Some(filter) = self.filter {
            if !filter(source, &resolved) {
                self.record(label, format!("skipped({source})"));
                return Ok(self);
            }
        }

        self.begin_field(label);
        match source {
            SourcePath::Path(_) => {
                let digest = self.factory.hash_loader().get(&resolved)?;
                self.tag(TAG_SOURCE_HASH);
                self.raw(source.to_string().as_bytes());
                self.raw(digest.as_str().as_bytes());
                self.record(label, format!("{source}={digest}"));
            }
            SourcePath::BuildTargetOutput { target, .. } => {
                let factory = self.factory;
                let producing = factory
                    .rule_for(target)
                    .ok_or_else(|| RuleKeyError::UnknownRule {
                        target: target.clone(),
                        reference: source.to_string(),
                    })?
                    .clone();
                let key = factory.build_inner(producing.as_ref(), &mut *self.visiting)?;
                self.tag(TAG_SOURCE_KEY);
                self.raw(source.to_string().as_bytes());
                self.raw(key.as_str().as_bytes());
                self.record(label, format!("{source}=key:{key}"));
            }
        }
        Ok(self)
    }

    /// Contributes an ordered logical-path → input mapping (a symlink
    /// mapping). Entries whose input the dep-file filter rejects are skipped
    /// wholesale, logical path included.
    pub fn field_source_path_map(
        &mut self,
        label: &str,
        map: &BTreeMap<PathBuf, SourcePath>,
    ) -> Result<&mut Self> {
        self.begin_field(label);
        self.tag(TAG_MAP_START);
        for (logical, source) in map {
            let resolved = self.factory.resolver().resolve(source)?;
            if let Some(filter) = self.filter {
                if !filter(source, &resolved) {
                    self.record(label, format!("skipped({} -> {source})", logical.display()));
                    continue;
                }
            }
            self.tag(TAG_PATH);
            self.raw(path_bytes(logical).as_bytes());
            match source {
                SourcePath::Path(_) => {
                    let digest = self.factory.hash_loader().get(&resolved)?;
                    self.tag(TAG_SOURCE_HASH);
                    self.raw(source.to_string().as_bytes());
                    self.raw(digest.as_str().as_bytes());
                    self.record(
                        label,
                        format!("{} -> {source}={digest}", logical.display()),
                    );
                }
                SourcePath::BuildTargetOutput { target, .. } => {
                    let factory = self.factory;
                    let producing = factory
                        .rule_for(target)
                        .ok_or_else(|| RuleKeyError::UnknownRule {
                            target: target.clone(),
                            reference: source.to_string(),
                        })?
                        .clone();
                    let key = factory.build_inner(producing.as_ref(), &mut *self.visiting)?;
                    self.tag(TAG_SOURCE_KEY);
                    self.raw(source.to_string().as_bytes());
                    self.raw(key.as_str().as_bytes());
                    self.record(label, format!("{} -> {source}=key:{key}", logical.display()));
                }
            }
        }
        self.tag(TAG_MAP_END);
        Ok(self)
    }

    pub(crate) fn finish(self) -> (RuleKey, Option<Vec<Contribution>>) {
        let key = RuleKey(hex::encode(self.hasher.finalize()));
        (key, self.contributions)
    }
}

/// Paths are hashed by their forward-slash rendering so keys agree across
/// platforms.
fn path_bytes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
