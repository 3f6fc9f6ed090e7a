//! Error taxonomy for loading, repairing and auditing resource files.
//!
//! `ParseError` and the repair errors are local: they are turned into
//! findings and the run continues. `AuditError` aborts the run.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Strict parse failure of a resource file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at byte {offset}: {message}")]
pub struct ParseError {
    /// Byte offset into the input where parsing stopped
    pub offset: usize,

    /// Parser message
    pub message: String,
}

/// Failure to persist a repaired file.
#[derive(Debug, Error)]
pub enum RepairError {
    #[error("backup write to {} failed: {source}", path.display())]
    BackupWriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("writing repaired content to {} failed: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors fatal to a whole audit run.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("reference locale '{locale}' has no loadable resource file under {}", dir.display())]
    MissingReferenceLocale { locale: String, dir: PathBuf },

    #[error("failed to read locales directory {}: {source}", path.display())]
    LocalesDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("locale loading task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
