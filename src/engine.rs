//! One audit run, from disk state to a sorted set of findings.

use crate::config::Config;
use crate::error::AuditError;
use crate::i18n::{
    scan_directory, sort_findings, Category, CheckRules, ConsistencyChecker, Finding, FlatTable,
    KeyAudit, LocaleCode, Severity, UsageIndex,
};
use crate::loader::{discover_locales, load_all, LoadOptions, LocaleLoad};
use crate::metrics::{MetricsReport, RunMetrics};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Overall outcome of a run, for callers deciding an exit code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "files", rename_all = "kebab-case")]
pub enum RunStatus {
    Clean,
    FindingsPresent,

    /// Files no repair strategy could recover
    RepairExhausted(Vec<PathBuf>),
}

impl RunStatus {
    /// Exhausted repairs dominate; Info findings alone leave a run clean.
    pub fn from_findings(findings: &[Finding], exhausted: Vec<PathBuf>) -> Self {
        if !exhausted.is_empty() {
            RunStatus::RepairExhausted(exhausted)
        } else if findings.iter().any(|f| f.severity >= Severity::Warning) {
            RunStatus::FindingsPresent
        } else {
            RunStatus::Clean
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RunStatus::Clean => "clean",
            RunStatus::FindingsPresent => "findings-present",
            RunStatus::RepairExhausted(_) => "repair-exhausted",
        }
    }
}

/// Everything one run produced.
#[derive(Debug)]
pub struct AuditRun {
    pub reference_locale: LocaleCode,
    pub reference: FlatTable,

    /// Every other loaded locale
    pub locales: BTreeMap<LocaleCode, FlatTable>,

    pub loads: Vec<LocaleLoad>,

    /// `None` when the source tree could not be scanned
    pub usage: Option<UsageIndex>,

    pub key_audit: KeyAudit,

    /// Sorted by locale, category, key
    pub findings: Vec<Finding>,

    pub metrics: MetricsReport,
    pub status: RunStatus,
    pub generated_at: DateTime<Utc>,
}

/// Key audit plus consistency checks over in-memory tables.
pub fn audit_tables(
    reference_locale: &LocaleCode,
    reference: &FlatTable,
    locales: &BTreeMap<LocaleCode, FlatTable>,
    usage: Option<&UsageIndex>,
    rules: &CheckRules,
) -> (KeyAudit, Vec<Finding>) {
    let key_audit = KeyAudit::run(reference_locale, reference, locales, usage);
    let mut findings = key_audit.findings(reference, locales);

    let checker = ConsistencyChecker::new(rules);
    for (locale, table) in locales {
        if locale == reference_locale {
            continue;
        }
        findings.extend(checker.check_locale(reference, locale, table));
    }

    (key_audit, findings)
}

/// Run a full audit: discover and load every locale while scanning source,
/// then audit and check.
///
/// Fails only when the reference locale cannot be loaded; every other
/// problem becomes a finding.
pub async fn run_audit(config: &Config, rules: &CheckRules) -> Result<AuditRun, AuditError> {
    let missing_reference = || AuditError::MissingReferenceLocale {
        locale: config.reference_locale.clone(),
        dir: config.locales_dir.clone(),
    };
    let reference_locale =
        LocaleCode::from_code(&config.reference_locale).map_err(|_| missing_reference())?;

    let options = Arc::new(LoadOptions::from_config(config));
    let locale_codes = discover_locales(&options.locales_dir, &options.backup_dir)?;
    info!(
        "Auditing {} locale(s) in {} (reference: {})",
        locale_codes.len(),
        options.locales_dir.display(),
        reference_locale
    );

    let metrics = Arc::new(RunMetrics::new());
    let source_dir = config.source_dir.clone();
    let extensions = config.source_extensions.clone();
    let scan = tokio::task::spawn_blocking(move || scan_directory(&source_dir, &extensions));

    let (loads, scan) = tokio::join!(
        load_all(locale_codes, Arc::clone(&options), Arc::clone(&metrics)),
        scan
    );
    let loads = loads?;

    let mut findings: Vec<Finding> = loads.iter().flat_map(LocaleLoad::findings).collect();

    let usage = match scan? {
        Ok(usage) => {
            info!(
                "Scanned {} source file(s), {} distinct key references",
                usage.files_scanned(),
                usage.len()
            );
            Some(usage)
        }
        Err(e) => {
            warn!("Source scan failed, usage checks skipped: {:#}", e);
            findings.push(
                Finding::new(
                    Category::UnreadableFile,
                    format!("Source scan failed, usage checks skipped: {:#}", e),
                )
                .with_files(vec![config.source_dir.clone()]),
            );
            None
        }
    };

    let reference = match loads
        .iter()
        .find(|load| load.locale == reference_locale && load.is_loaded())
    {
        Some(load) => load.table.clone(),
        None => {
            error!(
                "Reference locale {} could not be loaded from {}",
                reference_locale,
                options.locales_dir.display()
            );
            return Err(missing_reference());
        }
    };

    let locales: BTreeMap<LocaleCode, FlatTable> = loads
        .iter()
        .filter(|load| load.locale != reference_locale && load.is_loaded())
        .map(|load| (load.locale.clone(), load.table.clone()))
        .collect();

    let (key_audit, audit_findings) =
        audit_tables(&reference_locale, &reference, &locales, usage.as_ref(), rules);
    findings.extend(audit_findings);
    sort_findings(&mut findings);

    let exhausted: Vec<PathBuf> = loads
        .iter()
        .flat_map(|load| load.exhausted_files().map(PathBuf::from))
        .collect();
    let status = RunStatus::from_findings(&findings, exhausted);

    let metrics = metrics.report(
        usage.as_ref().map(UsageIndex::files_scanned).unwrap_or(0),
        reference.len(),
        usage.as_ref().map(UsageIndex::len).unwrap_or(0),
        &findings,
    );
    info!(
        "Audit finished: {} ({} errors, {} warnings, {} info)",
        status.name(),
        metrics.errors,
        metrics.warnings,
        metrics.infos
    );

    Ok(AuditRun {
        reference_locale,
        reference,
        locales,
        loads,
        usage,
        key_audit,
        findings,
        metrics,
        status,
        generated_at: Utc::now(),
    })
}
