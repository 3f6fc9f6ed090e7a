//! Loading locale resource files from disk.
//!
//! Each locale is loaded independently: every group file is read, parsed,
//! repaired if needed, written back (behind a verified backup) and
//! flattened. Locales load in parallel on the blocking pool and are joined
//! before any cross-locale work starts.

use crate::config::Config;
use crate::error::{AuditError, RepairError};
use crate::i18n::{
    repair, unflatten, Category, Finding, FlatTable, LocaleCode, RepairExhausted, RepairStrategy,
    ResourceTree, StructuralConflict,
};
use crate::metrics::RunMetrics;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Where and how to load resource files.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub locales_dir: PathBuf,
    pub backup_dir: PathBuf,

    /// Group names, loaded as `<locale>/<group>.json` in this order
    pub groups: Vec<String>,

    /// Persist repaired files (otherwise repairs are used in memory only)
    pub write_repairs: bool,
}

impl LoadOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            locales_dir: config.locales_dir.clone(),
            backup_dir: config.backup_dir(),
            groups: config.resource_groups.clone(),
            write_repairs: config.write_repairs,
        }
    }

    /// Path of one group file
    pub fn group_path(&self, locale: &LocaleCode, group: &str) -> PathBuf {
        self.locales_dir
            .join(locale.code())
            .join(format!("{}.json", group))
    }
}

/// What happened to one resource file.
#[derive(Debug)]
pub enum FileStatus {
    /// Parsed strictly
    Clean,

    /// Recovered; `backup` is set when the repaired text was written back
    Repaired {
        strategy: RepairStrategy,
        backup: Option<PathBuf>,
    },

    /// Recovered in memory, but the file was left untouched
    NotWritten {
        strategy: RepairStrategy,
        error: RepairError,
    },

    /// No strategy recovered the file; it was left untouched
    Exhausted(RepairExhausted),

    Unreadable(io::Error),
}

impl FileStatus {
    /// Whether the file contributed data to the locale
    pub fn is_loaded(&self) -> bool {
        matches!(
            self,
            FileStatus::Clean | FileStatus::Repaired { .. } | FileStatus::NotWritten { .. }
        )
    }
}

/// One resource file after loading.
#[derive(Debug)]
pub struct FileLoad {
    pub path: PathBuf,
    pub group: String,
    pub status: FileStatus,
}

/// One locale after loading all of its group files.
#[derive(Debug)]
pub struct LocaleLoad {
    pub locale: LocaleCode,

    /// Group files that exist on disk, in group order
    pub files: Vec<FileLoad>,

    /// Union of every loaded group
    pub table: FlatTable,

    /// Leaf/branch collisions inside this locale's merged table
    pub conflicts: Vec<StructuralConflict>,
}

impl LocaleLoad {
    /// Whether at least one group file contributed data
    pub fn is_loaded(&self) -> bool {
        self.files.iter().any(|file| file.status.is_loaded())
    }

    /// Files that no strategy could recover
    pub fn exhausted_files(&self) -> impl Iterator<Item = &Path> {
        self.files
            .iter()
            .filter(|file| matches!(file.status, FileStatus::Exhausted(_)))
            .map(|file| file.path.as_path())
    }

    /// Load problems as findings
    pub fn findings(&self) -> Vec<Finding> {
        let mut findings = Vec::new();

        for file in &self.files {
            let finding = match &file.status {
                FileStatus::Clean | FileStatus::Repaired { .. } => continue,
                FileStatus::NotWritten { strategy, error } => Finding::new(
                    Category::BackupWriteFailed,
                    format!("Recovered by {} but not written: {}", strategy, error),
                ),
                FileStatus::Exhausted(exhausted) => {
                    Finding::new(Category::RepairExhausted, exhausted.to_string())
                }
                FileStatus::Unreadable(e) => {
                    Finding::new(Category::UnreadableFile, format!("Failed to read: {}", e))
                }
            };
            findings.push(
                finding
                    .with_locale(self.locale.clone())
                    .with_files(vec![file.path.clone()]),
            );
        }

        for conflict in &self.conflicts {
            findings.push(
                Finding::new(Category::StructuralConflict, conflict.to_string())
                    .with_key(conflict.leaf.clone())
                    .with_locale(self.locale.clone()),
            );
        }

        findings
    }
}

/// List locale directories under `locales_dir`, sorted.
///
/// The backup directory and directories that are not valid locale codes are
/// skipped.
pub fn discover_locales(
    locales_dir: &Path,
    backup_dir: &Path,
) -> Result<Vec<LocaleCode>, AuditError> {
    let entries = fs::read_dir(locales_dir).map_err(|source| AuditError::LocalesDir {
        path: locales_dir.to_path_buf(),
        source,
    })?;
    let backup = fs::canonicalize(backup_dir).ok();

    let mut locales = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if path == backup_dir || (backup.is_some() && fs::canonicalize(&path).ok() == backup) {
            debug!("Skipping backup directory {}", path.display());
            continue;
        }

        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        match LocaleCode::from_code(name) {
            Ok(locale) => locales.push(locale),
            Err(e) => debug!("Skipping {}: {}", path.display(), e),
        }
    }

    locales.sort();
    Ok(locales)
}

/// Deterministic backup location: `<backup_dir>/<locale>/<group>.json`.
///
/// Mirrors the layout under the locales directory, so two groups never
/// share a backup even when their file names match (`common`, `pages/common`).
pub fn backup_path(backup_dir: &Path, locale: &LocaleCode, group: &str) -> PathBuf {
    backup_dir
        .join(locale.code())
        .join(format!("{}.json", group))
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Replace `path` with `repaired`, after copying `original` to `backup`.
///
/// The backup is written, synced and read back before the source file is
/// touched. The source is then replaced through a temporary file and a
/// rename, so a failure at any point leaves it with its original bytes.
pub fn persist_repair(
    path: &Path,
    backup: &Path,
    original: &[u8],
    repaired: &str,
) -> Result<(), RepairError> {
    let backup_failed = |source: io::Error| RepairError::BackupWriteFailed {
        path: backup.to_path_buf(),
        source,
    };

    if let Some(parent) = backup.parent() {
        fs::create_dir_all(parent).map_err(backup_failed)?;
    }
    write_synced(backup, original).map_err(backup_failed)?;
    let written = fs::read(backup).map_err(backup_failed)?;
    if written != original {
        return Err(backup_failed(io::Error::new(
            io::ErrorKind::InvalidData,
            "backup content does not match the original",
        )));
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let write_failed = |source: io::Error| RepairError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };
    if let Err(e) = write_synced(&tmp, repaired.as_bytes()).and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(write_failed(e));
    }

    Ok(())
}

/// Load, repair and flatten one group file.
///
/// Returns `None` when the file does not exist.
fn load_file(
    path: &Path,
    locale: &LocaleCode,
    group: &str,
    options: &LoadOptions,
    metrics: &RunMetrics,
) -> Option<(FileStatus, Option<ResourceTree>)> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("{} not present", path.display());
            return None;
        }
        Err(e) => {
            metrics.record_file_seen();
            metrics.record_unreadable();
            warn!("Failed to read {}: {}", path.display(), e);
            return Some((FileStatus::Unreadable(e), None));
        }
    };
    metrics.record_file_seen();

    let outcome = repair(&bytes);
    let strategy = outcome.strategy_used;
    let repaired = match outcome.result {
        Ok(repaired) => repaired,
        Err(exhausted) => {
            metrics.record_exhausted();
            error!("{}: {}, file left untouched", path.display(), exhausted);
            return Some((FileStatus::Exhausted(exhausted), None));
        }
    };

    if strategy == RepairStrategy::None {
        metrics.record_clean();
        debug!("{}: {} keys", path.display(), repaired.tree.leaf_count());
        return Some((FileStatus::Clean, Some(repaired.tree)));
    }

    metrics.record_repaired();
    info!(
        "{}: recovered by {} (applied: {:?})",
        path.display(),
        strategy,
        outcome.applied.iter().map(RepairStrategy::name).collect::<Vec<_>>()
    );

    if !options.write_repairs {
        return Some((
            FileStatus::Repaired {
                strategy,
                backup: None,
            },
            Some(repaired.tree),
        ));
    }

    let backup = backup_path(&options.backup_dir, locale, group);
    let status = match persist_repair(path, &backup, &bytes, &repaired.text) {
        Ok(()) => {
            metrics.record_backup();
            info!("{}: repaired, original saved to {}", path.display(), backup.display());
            FileStatus::Repaired {
                strategy,
                backup: Some(backup),
            }
        }
        Err(e) => {
            warn!("{}: repair not written: {}", path.display(), e);
            FileStatus::NotWritten { strategy, error: e }
        }
    };
    Some((status, Some(repaired.tree)))
}

/// Load every group file of one locale and merge them into one table.
///
/// A key defined by two groups takes the value of the later group.
pub fn load_locale(locale: &LocaleCode, options: &LoadOptions, metrics: &RunMetrics) -> LocaleLoad {
    let mut files = Vec::new();
    let mut table = FlatTable::new();

    for group in &options.groups {
        let path = options.group_path(locale, group);
        let Some((status, tree)) = load_file(&path, locale, group, options, metrics) else {
            continue;
        };

        if let Some(tree) = tree {
            for (key, value) in tree.flatten() {
                if let Some(previous) = table.insert(key.clone(), value) {
                    warn!(
                        "{}: '{}' is defined in more than one group, '{}' wins (was \"{}\")",
                        locale, key, group, previous
                    );
                }
            }
        }

        files.push(FileLoad {
            path,
            group: group.clone(),
            status,
        });
    }

    let conflicts = unflatten(&table).conflicts;
    info!(
        "Loaded {}: {} file(s), {} keys",
        locale,
        files.len(),
        table.len()
    );

    LocaleLoad {
        locale: locale.clone(),
        files,
        table,
        conflicts,
    }
}

/// Load `locales` in parallel. Results are sorted by locale.
pub async fn load_all(
    locales: Vec<LocaleCode>,
    options: Arc<LoadOptions>,
    metrics: Arc<RunMetrics>,
) -> Result<Vec<LocaleLoad>, AuditError> {
    let mut tasks = JoinSet::new();
    for locale in locales {
        let options = Arc::clone(&options);
        let metrics = Arc::clone(&metrics);
        tasks.spawn_blocking(move || load_locale(&locale, &options, &metrics));
    }

    let mut loads = Vec::with_capacity(tasks.len());
    while let Some(result) = tasks.join_next().await {
        loads.push(result?);
    }
    loads.sort_by(|a, b| a.locale.cmp(&b.locale));
    Ok(loads)
}
