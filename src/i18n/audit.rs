//! Key audit: set arithmetic over flattened key paths.
//!
//! All sets are relative to the reference locale. Usage comparisons
//! (missing / unused) need a source scan; locale comparisons (gaps,
//! orphans, structural conflicts) only need the flat tables.

use crate::i18n::finding::{Category, Finding};
use crate::i18n::locale::LocaleCode;
use crate::i18n::scanner::UsageIndex;
use crate::i18n::tree::{FlatTable, KeyPath, StructuralConflict};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Section name for single-segment keys
pub const OTHER_SECTION: &str = "other";

/// Result of auditing one resource set against source usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyAudit {
    pub reference_locale: Option<LocaleCode>,

    /// Used in source, not defined in the reference locale, with citing files
    pub missing: BTreeMap<KeyPath, Vec<PathBuf>>,

    /// Defined in the reference locale, never referenced in source
    pub unused: BTreeSet<KeyPath>,

    /// Per locale: reference keys the locale lacks
    pub locale_gaps: BTreeMap<LocaleCode, BTreeSet<KeyPath>>,

    /// Per locale: keys the reference does not define
    pub orphaned: BTreeMap<LocaleCode, BTreeSet<KeyPath>>,

    /// Per locale: leaf/branch disagreements with the reference
    pub conflicts: BTreeMap<LocaleCode, Vec<StructuralConflict>>,

    /// Whether usage sets were computed
    pub usage_scanned: bool,
}

/// Keys of `table` lying strictly below `key`.
fn descendants<'a>(table: &'a FlatTable, key: &'a KeyPath) -> impl Iterator<Item = &'a KeyPath> {
    table
        .range(key.clone()..)
        .map(|(path, _)| path)
        .take_while(move |path| path.as_str().starts_with(key.as_str()))
        .filter(move |path| key.is_ancestor_of(path))
}

/// Leaf/branch disagreements between the reference table and one locale.
fn structural_conflicts(reference: &FlatTable, target: &FlatTable) -> Vec<StructuralConflict> {
    let mut conflicts = Vec::new();
    for (leaf, below) in [(reference, target), (target, reference)] {
        for key in leaf.keys() {
            if let Some(descendant) = descendants(below, key).next() {
                conflicts.push(StructuralConflict {
                    leaf: key.clone(),
                    descendant: descendant.clone(),
                });
            }
        }
    }
    conflicts.sort();
    conflicts
}

impl KeyAudit {
    /// Audit `locales` and `usage` against the reference table.
    ///
    /// An entry for `reference_locale` in `locales` is ignored. Keys involved
    /// in a structural conflict are reported as conflicts only, never also as
    /// gaps or orphans.
    pub fn run(
        reference_locale: &LocaleCode,
        reference: &FlatTable,
        locales: &BTreeMap<LocaleCode, FlatTable>,
        usage: Option<&UsageIndex>,
    ) -> Self {
        let mut audit = KeyAudit {
            reference_locale: Some(reference_locale.clone()),
            ..KeyAudit::default()
        };

        if let Some(usage) = usage {
            audit.usage_scanned = true;
            audit.missing = usage
                .keys()
                .filter(|key| !reference.contains_key(*key))
                .map(|key| (key.clone(), usage.citing_files(key)))
                .collect();
            audit.unused = reference
                .keys()
                .filter(|key| !usage.contains(key))
                .cloned()
                .collect();
        }

        for (locale, table) in locales {
            if locale == reference_locale {
                continue;
            }

            let conflicts = structural_conflicts(reference, table);
            let mut conflicted: BTreeSet<&KeyPath> = BTreeSet::new();
            for conflict in &conflicts {
                conflicted.insert(&conflict.leaf);
                conflicted.extend(descendants(reference, &conflict.leaf));
                conflicted.extend(descendants(table, &conflict.leaf));
            }

            let gaps: BTreeSet<KeyPath> = reference
                .keys()
                .filter(|key| !table.contains_key(*key) && !conflicted.contains(key))
                .cloned()
                .collect();
            let orphans: BTreeSet<KeyPath> = table
                .keys()
                .filter(|key| !reference.contains_key(*key) && !conflicted.contains(key))
                .cloned()
                .collect();

            audit.locale_gaps.insert(locale.clone(), gaps);
            audit.orphaned.insert(locale.clone(), orphans);
            if !conflicts.is_empty() {
                audit.conflicts.insert(locale.clone(), conflicts);
            }
        }

        audit
    }

    /// Unused keys grouped by top-level section. Single-segment keys go to
    /// `other`.
    pub fn unused_by_section(&self) -> BTreeMap<String, Vec<KeyPath>> {
        let mut sections: BTreeMap<String, Vec<KeyPath>> = BTreeMap::new();
        for key in &self.unused {
            let section = if key.depth() > 1 {
                key.section()
            } else {
                OTHER_SECTION
            };
            sections
                .entry(section.to_string())
                .or_default()
                .push(key.clone());
        }
        sections
    }

    /// Total number of gap entries across all locales
    pub fn gap_count(&self) -> usize {
        self.locale_gaps.values().map(BTreeSet::len).sum()
    }

    /// Turn the audit sets into findings.
    pub fn findings(
        &self,
        reference: &FlatTable,
        locales: &BTreeMap<LocaleCode, FlatTable>,
    ) -> Vec<Finding> {
        let mut findings = Vec::new();

        let with_reference_locale = |finding: Finding| match &self.reference_locale {
            Some(locale) => finding.with_locale(locale.clone()),
            None => finding,
        };

        for (key, files) in &self.missing {
            findings.push(with_reference_locale(
                Finding::new(
                    Category::MissingKey,
                    format!("Referenced in {} file(s) but not defined", files.len()),
                )
                .with_key(key.clone())
                .with_files(files.clone()),
            ));
        }

        for key in &self.unused {
            let mut finding = Finding::new(Category::UnusedKey, "Never referenced in source")
                .with_key(key.clone());
            if let Some(value) = reference.get(key) {
                finding = finding.with_reference_value(value.clone());
            }
            findings.push(with_reference_locale(finding));
        }

        for (locale, gaps) in &self.locale_gaps {
            for key in gaps {
                let mut finding = Finding::new(Category::LocaleGap, "Missing from this locale")
                    .with_key(key.clone())
                    .with_locale(locale.clone());
                if let Some(value) = reference.get(key) {
                    finding = finding.with_reference_value(value.clone());
                }
                findings.push(finding);
            }
        }

        for (locale, orphans) in &self.orphaned {
            let table = locales.get(locale);
            for key in orphans {
                let mut finding =
                    Finding::new(Category::OrphanedKey, "Not defined in the reference locale")
                        .with_key(key.clone())
                        .with_locale(locale.clone());
                if let Some(value) = table.and_then(|t| t.get(key)) {
                    finding = finding.with_locale_value(value.clone());
                }
                findings.push(finding);
            }
        }

        for (locale, conflicts) in &self.conflicts {
            for conflict in conflicts {
                findings.push(
                    Finding::new(Category::StructuralConflict, conflict.to_string())
                        .with_key(conflict.leaf.clone())
                        .with_locale(locale.clone()),
                );
            }
        }

        findings
    }
}
