//! Check rules: the data that drives the consistency heuristics.
//!
//! Which terms must survive translation, which values may legitimately stay
//! identical and which hand-reviewed corrections are known are all project
//! policy, so they live in a table loaded from JSON rather than in code.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Terms checked when no rules file is configured
pub const DEFAULT_PRESERVED_TERMS: &[&str] = &["email", "LinkedIn", "Google"];

/// A reviewed better translation for a specific key in a specific locale.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct KnownCorrection {
    pub locale: String,
    pub key: String,

    /// Value that is known to be poor
    pub current: String,

    /// Reviewed replacement
    pub suggested: String,

    pub reason: String,
}

/// Configuration table for the consistency checker.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CheckRules {
    /// Terms that must appear verbatim in every locale (brand names, protocol terms)
    pub preserved_terms: Vec<String>,

    /// Values allowed to be identical to the reference ("OK", "Email")
    pub identical_allowed: Vec<String>,

    /// Identical values at most this many characters long are not flagged
    pub min_untranslated_len: usize,

    /// Target shorter than `min_length_ratio * reference` is flagged
    pub min_length_ratio: f64,

    /// Target longer than `max_length_ratio * reference` is flagged
    pub max_length_ratio: f64,

    pub known_corrections: Vec<KnownCorrection>,
}

impl Default for CheckRules {
    fn default() -> Self {
        Self {
            preserved_terms: DEFAULT_PRESERVED_TERMS
                .iter()
                .map(|term| term.to_string())
                .collect(),
            identical_allowed: Vec::new(),
            min_untranslated_len: 3,
            min_length_ratio: 0.5,
            max_length_ratio: 2.0,
            known_corrections: Vec::new(),
        }
    }
}

impl CheckRules {
    /// Load rules from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read check rules {}", path.display()))?;
        let rules: CheckRules = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse check rules {}", path.display()))?;
        rules.validate()?;
        Ok(rules)
    }

    /// Reject ratio settings that would flag everything or nothing
    pub fn validate(&self) -> Result<()> {
        if !(self.min_length_ratio >= 0.0) || !self.max_length_ratio.is_finite() {
            bail!(
                "Invalid length ratios: min {} max {}",
                self.min_length_ratio,
                self.max_length_ratio
            );
        }
        if self.min_length_ratio > self.max_length_ratio {
            bail!(
                "min_length_ratio ({}) exceeds max_length_ratio ({})",
                self.min_length_ratio,
                self.max_length_ratio
            );
        }
        Ok(())
    }

    /// Corrections registered for `locale`
    pub fn corrections_for<'a>(
        &'a self,
        locale: &'a str,
    ) -> impl Iterator<Item = &'a KnownCorrection> + 'a {
        self.known_corrections
            .iter()
            .filter(move |correction| correction.locale == locale)
    }

    /// Whether an identical reference/target pair is accounted for by policy
    pub fn identical_is_expected(&self, value: &str) -> bool {
        self.identical_allowed.iter().any(|allowed| allowed == value)
            || self
                .preserved_terms
                .iter()
                .any(|term| value.contains(term.as_str()))
    }
}
