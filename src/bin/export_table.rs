//! Export binary: writes the full key-by-locale table as CSV.
//!
//! Usage:
//!   cargo run --bin export                 # writes EXPORT_PATH or locales.csv
//!
//! Files are loaded through the same repair chain as the audit, with
//! writes forced off so exporting never modifies the locale files.

use anyhow::{Context, Result};
use locale_integrity::config::Config;
use locale_integrity::engine::run_audit;
use locale_integrity::i18n::CheckRules;
use locale_integrity::report::export_table;
use std::fs;
use std::path::PathBuf;
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

    let mut config = Config::from_env()?;
    config.write_repairs = false;

    let run = run_audit(&config, &CheckRules::default())
        .await
        .context("Failed to load locales")?;

    let output_path = config
        .export_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("locales.csv"));
    let table = export_table(&run.reference_locale, &run.reference, &run.locales);
    fs::write(&output_path, &table)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    info!(
        "✓ Exported {} keys across {} locale(s) to {}",
        run.reference.len(),
        run.locales.len() + 1,
        output_path.display()
    );
    Ok(())
}
