//! Findings: the unit of every audit result.

use crate::i18n::locale::LocaleCode;
use crate::i18n::tree::KeyPath;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// What kind of problem a finding describes.
///
/// Variant order is the order categories appear in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    RepairExhausted,
    BackupWriteFailed,
    UnreadableFile,
    StructuralConflict,
    MissingKey,
    LocaleGap,
    PlaceholderMismatch,
    PreservedTermMissing,
    PossiblyUntranslated,
    LengthAnomaly,
    SuggestedImprovement,
    OrphanedKey,
    UnusedKey,
}

impl Category {
    /// Severity a finding of this category carries
    pub fn severity(&self) -> Severity {
        match self {
            Category::RepairExhausted
            | Category::UnreadableFile
            | Category::StructuralConflict
            | Category::MissingKey => Severity::Error,
            Category::BackupWriteFailed
            | Category::LocaleGap
            | Category::PlaceholderMismatch
            | Category::PreservedTermMissing
            | Category::PossiblyUntranslated
            | Category::LengthAnomaly => Severity::Warning,
            Category::SuggestedImprovement | Category::OrphanedKey | Category::UnusedKey => {
                Severity::Info
            }
        }
    }

    /// Human readable heading
    pub fn label(&self) -> &'static str {
        match self {
            Category::RepairExhausted => "Unrepairable files",
            Category::BackupWriteFailed => "Repairs not written",
            Category::UnreadableFile => "Unreadable inputs",
            Category::StructuralConflict => "Structural conflicts",
            Category::MissingKey => "Keys used in source but not defined",
            Category::LocaleGap => "Keys missing from this locale",
            Category::PlaceholderMismatch => "Placeholder mismatches",
            Category::PreservedTermMissing => "Preserved terms missing",
            Category::PossiblyUntranslated => "Possibly untranslated values",
            Category::LengthAnomaly => "Length anomalies",
            Category::SuggestedImprovement => "Suggested improvements",
            Category::OrphanedKey => "Keys not present in the reference locale",
            Category::UnusedKey => "Keys defined but never used",
        }
    }
}

/// One reportable audit result. Built once through the constructor and
/// `with_*` methods, then only read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub category: Category,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_path: Option<KeyPath>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<LocaleCode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_value: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale_value: Option<String>,

    /// Files the finding refers to (citing source files, resource file)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<PathBuf>,

    pub detail: String,
}

impl Finding {
    /// Create a finding with the category's severity
    pub fn new(category: Category, detail: impl Into<String>) -> Self {
        Self {
            severity: category.severity(),
            category,
            key_path: None,
            locale: None,
            reference_value: None,
            locale_value: None,
            files: Vec::new(),
            detail: detail.into(),
        }
    }

    pub fn with_key(mut self, key: KeyPath) -> Self {
        self.key_path = Some(key);
        self
    }

    pub fn with_locale(mut self, locale: LocaleCode) -> Self {
        self.locale = Some(locale);
        self
    }

    pub fn with_reference_value(mut self, value: impl Into<String>) -> Self {
        self.reference_value = Some(value.into());
        self
    }

    pub fn with_locale_value(mut self, value: impl Into<String>) -> Self {
        self.locale_value = Some(value.into());
        self
    }

    pub fn with_files(mut self, files: Vec<PathBuf>) -> Self {
        self.files = files;
        self
    }

    /// Sort key: locale, then category, then key path text, then detail
    fn sort_key(&self) -> (Option<&LocaleCode>, Category, Option<&KeyPath>, &str) {
        (
            self.locale.as_ref(),
            self.category,
            self.key_path.as_ref(),
            &self.detail,
        )
    }
}

/// Sort findings into the stable report order.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}
