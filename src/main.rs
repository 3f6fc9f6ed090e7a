//! Audit binary: loads (and repairs) every locale, scans source, checks
//! consistency and prints the report.
//!
//! Exit codes: 0 clean, 1 findings present, 2 repair exhausted for some file.
//! Fatal errors (missing reference locale, unreadable locales directory)
//! surface as an `Err` from `main`.

use anyhow::{Context, Result};
use locale_integrity::config::Config;
use locale_integrity::engine::{run_audit, RunStatus};
use locale_integrity::i18n::CheckRules;
use locale_integrity::report;
use std::fs;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when not present)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("locale_integrity=info".parse()?),
        )
        .init();

    info!("Starting localization audit");

    // Load configuration from environment
    let config = Config::from_env()?;
    let rules = match &config.check_rules_file {
        Some(path) => CheckRules::from_file(path)?,
        None => CheckRules::default(),
    };

    let run = run_audit(&config, &rules)
        .await
        .context("Localization audit failed")?;

    println!("{}", report::render_text(&run, config.display_cap));

    if let Some(path) = &config.export_path {
        let table = report::export_table(&run.reference_locale, &run.reference, &run.locales);
        fs::write(path, table)
            .with_context(|| format!("Failed to write audit export to {}", path.display()))?;
        info!("Wrote audit export to {}", path.display());
    }

    if let Some(path) = &config.report_json_path {
        let json = report::export_json(&run)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write JSON report to {}", path.display()))?;
        info!("Wrote JSON report to {}", path.display());
    }

    let code = match run.status {
        RunStatus::Clean => 0,
        RunStatus::FindingsPresent => 1,
        RunStatus::RepairExhausted(_) => 2,
    };
    std::process::exit(code);
}
