//! Localization resource model and the checks that run over it.
//!
//! Everything in this module is pure: it works on bytes, text and in-memory
//! tables. Reading and writing files is the loader's job.
//!
//! # Architecture
//!
//! - `locale`: validated locale codes
//! - `tree`: resource trees, key paths and the flatten/unflatten transform
//! - `parser`: strict parsing of resource files
//! - `repair`: ordered recovery strategies for malformed files
//! - `scanner`: key references in application source
//! - `audit`: missing, unused, gap and orphan key sets
//! - `rules`: the data driving the consistency heuristics
//! - `validator`: per-value consistency checks between locales
//! - `finding`: the result records everything above produces
//!
//! # Example
//!
//! ```rust,ignore
//! use crate::i18n::{parse, KeyPath};
//!
//! let tree = parse(br#"{"auth": {"login": "Login"}}"#)?;
//! let table = tree.flatten();
//! assert_eq!(table[&KeyPath::new("auth.login").unwrap()], "Login");
//! ```

mod audit;
mod finding;
mod locale;
mod parser;
mod repair;
mod rules;
mod scanner;
mod tree;
mod validator;

pub use audit::{KeyAudit, OTHER_SECTION};
pub use finding::{sort_findings, Category, Finding, Severity};
pub use locale::LocaleCode;
pub use parser::{parse, parse_document};
pub use repair::{repair, RepairExhausted, RepairOutcome, RepairStrategy, RepairedDocument};
pub use rules::{CheckRules, KnownCorrection, DEFAULT_PRESERVED_TERMS};
pub use scanner::{scan, scan_directory, UsageIndex};
pub use tree::{
    unflatten, Branch, FlatTable, KeyPath, ResourceNode, ResourceTree, StructuralConflict,
    Unflattened,
};
pub use validator::ConsistencyChecker;
