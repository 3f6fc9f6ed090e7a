use anyhow::{Context, Result};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    // Resources
    pub locales_dir: PathBuf,
    pub reference_locale: String,
    pub resource_groups: Vec<String>,

    // Source scan
    pub source_dir: PathBuf,
    pub source_extensions: Vec<String>,

    // Repair
    pub backup_dir: Option<PathBuf>,
    pub write_repairs: bool,

    // Checks
    pub check_rules_file: Option<PathBuf>,

    // Output
    pub display_cap: usize,
    pub export_path: Option<PathBuf>,
    pub report_json_path: Option<PathBuf>,
}

/// Split a comma separated list, dropping empty items
fn list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn optional_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let write_repairs = match std::env::var("WRITE_REPAIRS") {
            Ok(value) => parse_bool(&value)
                .with_context(|| format!("WRITE_REPAIRS has an invalid value: '{}'", value))?,
            Err(_) => true,
        };

        let display_cap = match std::env::var("DISPLAY_CAP") {
            Ok(value) => value
                .trim()
                .parse()
                .with_context(|| format!("DISPLAY_CAP must be a number, got '{}'", value))?,
            Err(_) => 10,
        };

        Ok(Self {
            // Resources
            locales_dir: std::env::var("LOCALES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("public/locales")),
            reference_locale: std::env::var("REFERENCE_LOCALE").unwrap_or_else(|_| "en".to_string()),
            resource_groups: list(
                &std::env::var("RESOURCE_GROUPS")
                    .unwrap_or_else(|_| "common,translation".to_string()),
            ),

            // Source scan
            source_dir: std::env::var("SOURCE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("src")),
            source_extensions: list(
                &std::env::var("SOURCE_EXTENSIONS").unwrap_or_else(|_| "js,jsx,ts,tsx".to_string()),
            ),

            // Repair
            backup_dir: optional_path("BACKUP_DIR"),
            write_repairs,

            // Checks
            check_rules_file: optional_path("CHECK_RULES_FILE"),

            // Output
            display_cap,
            export_path: optional_path("EXPORT_PATH"),
            report_json_path: optional_path("REPORT_JSON_PATH"),
        })
    }

    /// Backup root, `<locales_dir>/backup` unless configured
    pub fn backup_dir(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| self.locales_dir.join("backup"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locales_dir: PathBuf::from("public/locales"),
            reference_locale: "en".to_string(),
            resource_groups: vec!["common".to_string(), "translation".to_string()],
            source_dir: PathBuf::from("src"),
            source_extensions: list("js,jsx,ts,tsx"),
            backup_dir: None,
            write_repairs: true,
            check_rules_file: None,
            display_cap: 10,
            export_path: None,
            report_json_path: None,
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected true or false, got '{}'", other),
    }
}
