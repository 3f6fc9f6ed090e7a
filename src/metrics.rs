//! Run metrics.
//!
//! Counters are atomics so the parallel locale loaders can share one
//! instance through an `Arc`. A `RunMetrics` lives for exactly one run.

use crate::i18n::{Finding, Severity};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters collected while a run is in progress.
#[derive(Debug, Default)]
pub struct RunMetrics {
    /// Resource files found on disk
    files_seen: AtomicUsize,

    /// Files that parsed strictly
    files_clean: AtomicUsize,

    /// Files recovered by a repair strategy
    files_repaired: AtomicUsize,

    /// Files no strategy could recover
    files_exhausted: AtomicUsize,

    /// Files that could not be read at all
    files_unreadable: AtomicUsize,

    backups_written: AtomicUsize,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_file_seen(&self) {
        self.files_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_clean(&self) {
        self.files_clean.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_repaired(&self) {
        self.files_repaired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_exhausted(&self) {
        self.files_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unreadable(&self) {
        self.files_unreadable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backup(&self) {
        self.backups_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn files_seen(&self) -> usize {
        self.files_seen.load(Ordering::Relaxed)
    }

    pub fn files_repaired(&self) -> usize {
        self.files_repaired.load(Ordering::Relaxed)
    }

    pub fn files_exhausted(&self) -> usize {
        self.files_exhausted.load(Ordering::Relaxed)
    }

    pub fn backups_written(&self) -> usize {
        self.backups_written.load(Ordering::Relaxed)
    }

    /// Freeze the counters into a report, adding the figures only known once
    /// the run has finished.
    pub fn report(
        &self,
        source_files_scanned: usize,
        keys_defined: usize,
        keys_referenced: usize,
        findings: &[Finding],
    ) -> MetricsReport {
        let repaired = self.files_repaired();
        let exhausted = self.files_exhausted();
        let attempted = repaired + exhausted;
        let repair_success_rate = if attempted > 0 {
            (repaired as f64 / attempted as f64) * 100.0
        } else {
            100.0
        };

        let count = |severity: Severity| findings.iter().filter(|f| f.severity == severity).count();

        MetricsReport {
            files_seen: self.files_seen(),
            files_clean: self.files_clean.load(Ordering::Relaxed),
            files_repaired: repaired,
            files_exhausted: exhausted,
            files_unreadable: self.files_unreadable.load(Ordering::Relaxed),
            backups_written: self.backups_written(),
            repair_success_rate,
            source_files_scanned,
            keys_defined,
            keys_referenced,
            errors: count(Severity::Error),
            warnings: count(Severity::Warning),
            infos: count(Severity::Info),
        }
    }
}

/// Final figures for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub files_seen: usize,
    pub files_clean: usize,
    pub files_repaired: usize,
    pub files_exhausted: usize,
    pub files_unreadable: usize,
    pub backups_written: usize,

    /// Repaired files as a percentage (0-100) of files that needed repair
    pub repair_success_rate: f64,

    pub source_files_scanned: usize,

    /// Keys in the reference locale
    pub keys_defined: usize,

    /// Distinct keys referenced in source
    pub keys_referenced: usize,

    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}
