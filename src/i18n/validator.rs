//! Cross-locale consistency checks.
//!
//! For every key present in both the reference locale and a target locale,
//! the checker compares the two values with a set of independent heuristics
//! (preserved terms, identical values, length ratio, placeholder order).
//! All results are advisory findings; a single pair may produce several.

use crate::i18n::finding::{Category, Finding};
use crate::i18n::locale::LocaleCode;
use crate::i18n::rules::CheckRules;
use crate::i18n::tree::{FlatTable, KeyPath};
use regex::Regex;
use std::sync::OnceLock;

// Regex pattern for extraction (cached for performance)
static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

/// Validator comparing a target locale against the reference locale.
pub struct ConsistencyChecker<'a> {
    rules: &'a CheckRules,
}

impl<'a> ConsistencyChecker<'a> {
    pub fn new(rules: &'a CheckRules) -> Self {
        Self { rules }
    }

    /// Check every key present in both tables.
    ///
    /// Keys only present on one side are the key audit's concern and are
    /// skipped here.
    pub fn check_locale(
        &self,
        reference: &FlatTable,
        locale: &LocaleCode,
        target: &FlatTable,
    ) -> Vec<Finding> {
        let mut findings = Vec::new();

        for (key, reference_value) in reference {
            if let Some(target_value) = target.get(key) {
                findings.extend(self.check_pair(key, locale, reference_value, target_value));
            }
        }

        for correction in self.rules.corrections_for(locale.code()) {
            let Some(key) = KeyPath::new(&correction.key) else {
                continue;
            };
            if target.get(&key) == Some(&correction.current) {
                findings.push(
                    Finding::new(
                        Category::SuggestedImprovement,
                        format!("Suggested: \"{}\" ({})", correction.suggested, correction.reason),
                    )
                    .with_key(key.clone())
                    .with_locale(locale.clone())
                    .with_locale_value(correction.current.clone())
                    .with_reference_value(reference.get(&key).cloned().unwrap_or_default()),
                );
            }
        }

        findings
    }

    /// Run every check on one reference/target value pair.
    pub fn check_pair(
        &self,
        key: &KeyPath,
        locale: &LocaleCode,
        reference: &str,
        target: &str,
    ) -> Vec<Finding> {
        let finding = |category: Category, detail: String| {
            Finding::new(category, detail)
                .with_key(key.clone())
                .with_locale(locale.clone())
                .with_reference_value(reference)
                .with_locale_value(target)
        };
        let mut findings = Vec::new();

        // Preserved terms
        for term in &self.rules.preserved_terms {
            if reference.contains(term.as_str()) && !target.contains(term.as_str()) {
                findings.push(finding(
                    Category::PreservedTermMissing,
                    format!("Preserved term '{}' is missing from the translation", term),
                ));
            }
        }

        // Identical values
        if reference == target
            && reference.chars().count() > self.rules.min_untranslated_len
            && !self.rules.identical_is_expected(reference)
        {
            findings.push(finding(
                Category::PossiblyUntranslated,
                "Value is identical to the reference".to_string(),
            ));
        }

        // Length ratio
        let reference_len = reference.chars().count() as f64;
        let target_len = target.chars().count() as f64;
        if target_len < self.rules.min_length_ratio * reference_len
            || target_len > self.rules.max_length_ratio * reference_len
        {
            findings.push(finding(
                Category::LengthAnomaly,
                format!(
                    "Length {} is outside {}x-{}x of the reference length {}",
                    target_len, self.rules.min_length_ratio, self.rules.max_length_ratio, reference_len
                ),
            ));
        }

        // Placeholders (positional, so order matters)
        let reference_placeholders = Self::extract_placeholders(reference);
        let target_placeholders = Self::extract_placeholders(target);
        if reference_placeholders != target_placeholders {
            findings.push(finding(
                Category::PlaceholderMismatch,
                format!(
                    "Placeholder mismatch: reference has {:?}, translation has {:?}",
                    reference_placeholders, target_placeholders
                ),
            ));
        }

        findings
    }

    /// Extract interpolation placeholders in order of appearance.
    ///
    /// Recognizes `{{name}}`, `${name}`, `#{name}`, `{name}` and printf-style
    /// `%s` / `%1$s`. Whitespace inside a placeholder is ignored, so
    /// `{{ name }}` and `{{name}}` compare equal.
    pub fn extract_placeholders(text: &str) -> Vec<String> {
        let regex = PLACEHOLDER_REGEX.get_or_init(|| {
            Regex::new(
                r"\{\{\s*[\w.\-]+\s*\}\}|\$\{\s*[\w.]+\s*\}|#\{\s*[\w.]+\s*\}|\{\s*\w+\s*\}|%(?:\d+\$)?[a-zA-Z@]",
            )
            .unwrap()
        });

        regex
            .find_iter(text)
            .map(|m| m.as_str().chars().filter(|c| !c.is_whitespace()).collect())
            .collect()
    }
}
