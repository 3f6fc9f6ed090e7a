//! Audit reporter: console text, tabular export and JSON export.
//!
//! Rendering never filters findings. Display caps only shorten what is
//! printed; the CSV and JSON exports always carry everything.

use crate::engine::{AuditRun, RunStatus};
use crate::i18n::{Category, Finding, FlatTable, LocaleCode};
use crate::metrics::MetricsReport;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Citing files shown per missing key
pub const FILES_SHOWN: usize = 3;

/// Sections listed in the "most referenced" summary
pub const TOP_SECTIONS: usize = 10;

fn more_marker(hidden: usize) -> String {
    format!("... and {} more", hidden)
}

fn finding_line(finding: &Finding) -> String {
    let mut line = match &finding.key_path {
        Some(key) => format!("{}: {}", key, finding.detail),
        None => finding.detail.clone(),
    };

    match (&finding.reference_value, &finding.locale_value) {
        (Some(reference), Some(value)) => {
            let _ = write!(line, " (\"{}\" -> \"{}\")", reference, value);
        }
        (Some(reference), None) => {
            let _ = write!(line, " (\"{}\")", reference);
        }
        (None, Some(value)) => {
            let _ = write!(line, " (\"{}\")", value);
        }
        (None, None) => {}
    }

    if !finding.files.is_empty() {
        let mut shown: Vec<String> = finding
            .files
            .iter()
            .take(FILES_SHOWN)
            .map(|file| file.display().to_string())
            .collect();
        if finding.files.len() > FILES_SHOWN {
            shown.push(more_marker(finding.files.len() - FILES_SHOWN));
        }
        let _ = write!(line, " [{}]", shown.join(", "));
    }

    line
}

fn render_metrics(out: &mut String, metrics: &MetricsReport) {
    let _ = writeln!(
        out,
        "Files: {} seen, {} clean, {} repaired, {} unrepairable, {} unreadable, {} backed up",
        metrics.files_seen,
        metrics.files_clean,
        metrics.files_repaired,
        metrics.files_exhausted,
        metrics.files_unreadable,
        metrics.backups_written
    );
    let _ = writeln!(
        out,
        "Keys: {} defined, {} referenced in {} source file(s)",
        metrics.keys_defined, metrics.keys_referenced, metrics.source_files_scanned
    );
    let _ = writeln!(
        out,
        "Findings: {} errors, {} warnings, {} info",
        metrics.errors, metrics.warnings, metrics.infos
    );
}

/// Render the console report.
///
/// Findings are grouped by locale, then category, in key order. Each list
/// shows at most `cap` entries followed by an "... and N more" marker.
/// Unused keys are listed separately, grouped by section.
pub fn render_text(run: &AuditRun, cap: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Localization audit (reference: {}) {}",
        run.reference_locale,
        run.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "Status: {}", run.status.name());
    if let RunStatus::RepairExhausted(files) = &run.status {
        for file in files {
            let _ = writeln!(out, "  unrepairable: {}", file.display());
        }
    }
    out.push('\n');
    render_metrics(&mut out, &run.metrics);

    let mut grouped: BTreeMap<Option<&LocaleCode>, BTreeMap<Category, Vec<&Finding>>> =
        BTreeMap::new();
    for finding in &run.findings {
        if finding.category == Category::UnusedKey {
            continue;
        }
        grouped
            .entry(finding.locale.as_ref())
            .or_default()
            .entry(finding.category)
            .or_default()
            .push(finding);
    }

    for (locale, categories) in &grouped {
        let heading = match locale {
            Some(locale) => locale.to_string(),
            None => "general".to_string(),
        };
        let _ = writeln!(out, "\n== {} ==", heading);

        for (category, findings) in categories {
            let _ = writeln!(
                out,
                "  {} [{}] ({})",
                category.label(),
                category.severity(),
                findings.len()
            );
            for finding in findings.iter().take(cap) {
                let _ = writeln!(out, "    - {}", finding_line(finding));
            }
            if findings.len() > cap {
                let _ = writeln!(out, "    {}", more_marker(findings.len() - cap));
            }
        }
    }

    if run.key_audit.usage_scanned {
        let sections = run.key_audit.unused_by_section();
        let _ = writeln!(
            out,
            "\n{} ({})",
            Category::UnusedKey.label(),
            run.key_audit.unused.len()
        );
        for (section, keys) in &sections {
            let _ = writeln!(out, "  {} ({})", section, keys.len());
            for key in keys.iter().take(cap) {
                let _ = writeln!(out, "    - {}", key);
            }
            if keys.len() > cap {
                let _ = writeln!(out, "    {}", more_marker(keys.len() - cap));
            }
        }

        if let Some(usage) = &run.usage {
            let _ = writeln!(out, "\nMost referenced sections");
            for (section, count) in usage.section_counts().iter().take(TOP_SECTIONS) {
                let _ = writeln!(out, "  {}: {}", section, count);
            }
        }
    }

    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Tabular export: one row per reference key, one column per locale.
///
/// The reference locale is the first value column, the other locales follow
/// in code order. A cell is empty when the locale lacks the key.
pub fn export_table(
    reference_locale: &LocaleCode,
    reference: &FlatTable,
    locales: &BTreeMap<LocaleCode, FlatTable>,
) -> String {
    let others: Vec<(&LocaleCode, &FlatTable)> = locales
        .iter()
        .filter(|(locale, _)| *locale != reference_locale)
        .collect();

    let mut out = String::new();
    let mut header = vec!["key".to_string(), csv_field(reference_locale.code())];
    header.extend(others.iter().map(|(locale, _)| csv_field(locale.code())));
    out.push_str(&header.join(","));
    out.push('\n');

    for (key, value) in reference {
        let mut row = vec![csv_field(key.as_str()), csv_field(value)];
        row.extend(others.iter().map(|(_, table)| {
            table
                .get(key)
                .map(|value| csv_field(value))
                .unwrap_or_default()
        }));
        out.push_str(&row.join(","));
        out.push('\n');
    }

    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: DateTime<Utc>,
    reference_locale: &'a LocaleCode,
    #[serde(flatten)]
    status: &'a RunStatus,
    metrics: &'a MetricsReport,
    findings: &'a [Finding],
}

/// Full findings export as pretty JSON.
pub fn export_json(run: &AuditRun) -> Result<String> {
    let report = JsonReport {
        generated_at: run.generated_at,
        reference_locale: &run.reference_locale,
        status: &run.status,
        metrics: &run.metrics,
        findings: &run.findings,
    };
    serde_json::to_string_pretty(&report).context("Failed to serialize audit report")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::audit_tables;
    use crate::i18n::{sort_findings, CheckRules, KeyPath, UsageIndex};
    use crate::metrics::RunMetrics;
    use std::path::{Path, PathBuf};

    fn key(text: &str) -> KeyPath {
        KeyPath::new(text).unwrap()
    }

    fn locale(code: &str) -> LocaleCode {
        LocaleCode::from_code(code).unwrap()
    }

    fn build_run(
        reference: FlatTable,
        locales: BTreeMap<LocaleCode, FlatTable>,
        usage: Option<UsageIndex>,
    ) -> AuditRun {
        let reference_locale = locale("en");
        let (key_audit, mut findings) = audit_tables(
            &reference_locale,
            &reference,
            &locales,
            usage.as_ref(),
            &CheckRules::default(),
        );
        sort_findings(&mut findings);
        let metrics = RunMetrics::new().report(0, reference.len(), 0, &findings);
        let status = RunStatus::from_findings(&findings, vec![]);
        AuditRun {
            reference_locale,
            reference,
            locales,
            loads: Vec::new(),
            usage,
            key_audit,
            findings,
            metrics,
            status,
            generated_at: Utc::now(),
        }
    }

    fn numbered_reference(count: usize) -> FlatTable {
        (0..count)
            .map(|i| (key(&format!("list.item{:02}", i)), format!("Item {}", i)))
            .collect()
    }

    // ==================== Text Report Tests ====================

    #[test]
    fn test_render_caps_lists_with_more_marker() {
        let mut locales = BTreeMap::new();
        locales.insert(locale("fr"), FlatTable::new());
        let run = build_run(numbered_reference(15), locales, None);

        let text = render_text(&run, 10);

        assert!(text.contains("== fr =="));
        assert!(text.contains("Keys missing from this locale [warning] (15)"));
        assert!(text.contains("list.item09"));
        assert!(!text.contains("list.item10"));
        assert!(text.contains("... and 5 more"));
    }

    #[test]
    fn test_render_missing_key_shows_three_files() {
        let mut usage = UsageIndex::new();
        for file in ["a.js", "b.js", "c.js", "d.js", "e.js"] {
            usage.record_source(Path::new(file), "t('dashboard.newStat')");
        }
        let run = build_run(FlatTable::new(), BTreeMap::new(), Some(usage));

        let text = render_text(&run, 10);

        assert!(text.contains("dashboard.newStat"));
        assert!(text.contains("[a.js, b.js, c.js, ... and 2 more]"));
        assert!(!text.contains("d.js"));
    }

    #[test]
    fn test_render_unused_grouped_and_top_sections() {
        let mut reference = FlatTable::new();
        reference.insert(key("auth.login"), "Login".to_string());
        reference.insert(key("auth.logout"), "Logout".to_string());
        reference.insert(key("title"), "App".to_string());
        let mut usage = UsageIndex::new();
        usage.record_source(Path::new("a.js"), "t('auth.login')");

        let run = build_run(reference, BTreeMap::new(), Some(usage));
        let text = render_text(&run, 10);

        assert!(text.contains("Keys defined but never used (2)"));
        assert!(text.contains("  auth (1)"));
        assert!(text.contains("  other (1)"));
        assert!(text.contains("Most referenced sections"));
        assert!(text.contains("  auth: 1"));
    }

    #[test]
    fn test_render_clean_status() {
        let mut reference = FlatTable::new();
        reference.insert(key("a"), "A".to_string());
        let run = build_run(reference, BTreeMap::new(), None);
        assert!(render_text(&run, 10).contains("Status: clean"));
    }

    // ==================== Export Tests ====================

    #[test]
    fn test_export_table_contains_every_key_regardless_of_cap() {
        let reference = numbered_reference(25);
        let mut locales = BTreeMap::new();
        locales.insert(locale("fr"), FlatTable::new());
        let run = build_run(reference.clone(), locales.clone(), None);

        // The console report truncates...
        assert!(render_text(&run, 3).contains("... and 22 more"));

        // ...the export does not
        let csv = export_table(&run.reference_locale, &reference, &locales);
        assert_eq!(csv.lines().count(), 26);
        assert_eq!(csv.lines().next(), Some("key,en,fr"));
        assert_eq!(csv.lines().nth(1), Some("list.item00,Item 0,"));
    }

    #[test]
    fn test_export_table_quotes_and_orders_locales() {
        let mut reference = FlatTable::new();
        reference.insert(key("greeting"), "Hello, \"friend\"".to_string());
        let mut de = FlatTable::new();
        de.insert(key("greeting"), "Hallo".to_string());
        let mut locales = BTreeMap::new();
        locales.insert(locale("fr"), FlatTable::new());
        locales.insert(locale("de"), de);
        locales.insert(locale("en"), reference.clone());

        let csv = export_table(&locale("en"), &reference, &locales);

        assert_eq!(
            csv,
            "key,en,de,fr\ngreeting,\"Hello, \"\"friend\"\"\",Hallo,\n"
        );
    }

    #[test]
    fn test_export_json_includes_status_and_findings() {
        let mut reference = FlatTable::new();
        reference.insert(key("auth.login"), "Login".to_string());
        let mut locales = BTreeMap::new();
        locales.insert(locale("fr"), FlatTable::new());
        let run = build_run(reference, locales, None);

        let json = export_json(&run).expect("Should serialize");
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["status"], "findings-present");
        assert_eq!(value["reference_locale"], "en");
        assert_eq!(value["findings"][0]["category"], "locale-gap");
        assert_eq!(value["findings"][0]["key_path"], "auth.login");
        assert!(value["generated_at"].is_string());
        assert_eq!(value["metrics"]["keys_defined"], 1);
    }

    #[test]
    fn test_finding_line_formats_values() {
        let finding = Finding::new(Category::LengthAnomaly, "too short")
            .with_key(key("a.b"))
            .with_reference_value("Long text")
            .with_locale_value("L")
            .with_files(vec![PathBuf::from("x.js")]);
        assert_eq!(
            finding_line(&finding),
            "a.b: too short (\"Long text\" -> \"L\") [x.js]"
        );
    }
}
