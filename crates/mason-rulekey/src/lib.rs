//! Rule key computation: the recursive content fingerprint that decides
//! whether a previously built artifact is still valid.
//!
//! A rule's key covers its class identity, declared configuration fields,
//! the content digests of its literal inputs, and the keys of the rules it
//! depends on. Keys are deterministic across processes and machines; the
//! factory memoizes them per build so each rule's hash walk runs at most
//! once even under concurrent demand.
//!
//! The [`dep_file`] module implements the refined, dependency-file-based key
//! for rules that can report which declared inputs an execution actually
//! consumed.

mod builder;
mod dep_file;
mod error;
mod factory;
mod rule;

pub use builder::{Contribution, RuleKey, RuleKeyBuilder};
pub use dep_file::{
    read_dep_file_lines, DepFileError, DepFileRule, DepFileRuleKey, DepFileRuleKeyFactory,
    PrecompiledHeaderReference,
};
pub use error::{Result, RuleKeyError};
pub use factory::RuleKeyFactory;
pub use rule::{BuildRule, RuleResolver};
