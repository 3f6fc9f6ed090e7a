//! Repair binary: runs the repair chain over every locale file without
//! auditing anything.
//!
//! Usage:
//!   cargo run --bin repair
//!
//! Uses LOCALES_DIR, RESOURCE_GROUPS, BACKUP_DIR and WRITE_REPAIRS from the
//! environment (see `Config`).

use anyhow::{Context, Result};
use locale_integrity::config::Config;
use locale_integrity::loader::{discover_locales, load_all, FileStatus, LoadOptions};
use locale_integrity::metrics::RunMetrics;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("locale_integrity=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    let options = Arc::new(LoadOptions::from_config(&config));
    let locales = discover_locales(&options.locales_dir, &options.backup_dir)
        .context("Failed to list locales")?;
    info!(
        "Checking {} locale(s) in {}",
        locales.len(),
        options.locales_dir.display()
    );

    let metrics = Arc::new(RunMetrics::new());
    let loads = load_all(locales, options, Arc::clone(&metrics)).await?;

    for load in &loads {
        for file in &load.files {
            let line = match &file.status {
                FileStatus::Clean => "ok".to_string(),
                FileStatus::Repaired {
                    strategy,
                    backup: Some(backup),
                } => format!("repaired ({}), backup at {}", strategy, backup.display()),
                FileStatus::Repaired {
                    strategy,
                    backup: None,
                } => format!("repairable ({}), not written", strategy),
                FileStatus::NotWritten { strategy, error } => {
                    format!("repairable ({}), not written: {}", strategy, error)
                }
                FileStatus::Exhausted(exhausted) => format!("UNREPAIRABLE: {}", exhausted),
                FileStatus::Unreadable(e) => format!("UNREADABLE: {}", e),
            };
            println!("{}: {}", file.path.display(), line);
        }
    }

    let report = metrics.report(0, 0, 0, &[]);
    info!(
        "✓ {} file(s): {} clean, {} repaired, {} unrepairable, {} backups written",
        report.files_seen,
        report.files_clean,
        report.files_repaired,
        report.files_exhausted,
        report.backups_written
    );

    if report.files_exhausted > 0 {
        std::process::exit(2);
    }
    Ok(())
}
