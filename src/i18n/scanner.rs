//! Usage scanner: finds translation key references in application source.
//!
//! Extraction is purely lexical. Every pattern runs independently over the
//! whole text and the matches are unioned, so a key referenced through any
//! known idiom is picked up. False positives are acceptable here; the audit
//! only ever compares them against defined keys.

use crate::i18n::tree::KeyPath;
use anyhow::{bail, Result};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Directories never worth scanning
const SKIPPED_DIRS: &[&str] = &["node_modules", ".git", "dist", "build", "target", "coverage"];

// Regex patterns for extraction (cached for performance)
static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

/// A quoted literal, closed by the quote that opened it. Exactly one of the
/// three groups matches.
const QUOTED: &str = r#"(?:'([^'\n]+)'|"([^"\n]+)"|`([^`\n]+)`)"#;

/// Lexical reference idioms, in application order.
fn patterns() -> &'static [Regex] {
    PATTERNS.get_or_init(|| {
        [
            // t('key'), {t("key")}, i18n.t('key'), props.t(`key`), $t('key')
            format!(r#"(?:^|[^\w$])\$?t\(\s*{}"#, QUOTED),
            // something["t"]('key')
            format!(r#"\[\s*['"]t['"]\s*\]\(\s*{}"#, QUOTED),
            // <Trans i18nKey="key">, i18nKey={'key'}
            format!(r#"\bi18nKey\s*=\s*\{{?\s*{}"#, QUOTED),
            // 't:key' interpolation markers
            r#"'t:([^'\n]+)'|"t:([^"\n]+)"|`t:([^`\n]+)`"#.to_string(),
            // {{ 'key' | translate }}
            format!(r#"\{{\{{\s*{}\s*\|\s*(?:t|translate)\b"#, QUOTED),
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).unwrap())
        .collect()
    })
}

/// Turn one captured literal into a key path.
///
/// Template literals with interpolation are dynamic and dropped. A leading
/// `namespace:` is removed when the namespace is a plain identifier and the
/// key follows without a space, so `common:auth.login` becomes `auth.login`
/// while text keys such as `Note: saved` are kept whole.
fn candidate_key(raw: &str) -> Option<KeyPath> {
    if raw.contains("${") {
        return None;
    }
    let key = match raw.split_once(':') {
        Some((namespace, rest))
            if !namespace.is_empty()
                && namespace
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
                && !rest.starts_with(char::is_whitespace) =>
        {
            rest
        }
        _ => raw,
    };
    KeyPath::new(key)
}

/// Extract every candidate key referenced in `source`.
///
/// Keys may be identifiers (`auth.login`) or literal text (`t('Welcome
/// back')`). Candidates that cannot be a key path (empty segments, e.g.
/// `jobs.` from a concatenated prefix) are dropped.
pub fn scan(source: &str) -> BTreeSet<KeyPath> {
    let mut keys = BTreeSet::new();
    for regex in patterns() {
        for caps in regex.captures_iter(source) {
            let Some(raw) = caps.iter().skip(1).flatten().next().map(|m| m.as_str()) else {
                continue;
            };
            if let Some(key) = candidate_key(raw) {
                keys.insert(key);
            }
        }
    }
    keys
}

/// Every referenced key, with the files citing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageIndex {
    references: BTreeMap<KeyPath, BTreeSet<PathBuf>>,
    files_scanned: usize,
}

impl UsageIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the keys found in one source file
    pub fn record(&mut self, file: &Path, keys: BTreeSet<KeyPath>) {
        self.files_scanned += 1;
        for key in keys {
            self.references
                .entry(key)
                .or_default()
                .insert(file.to_path_buf());
        }
    }

    /// Scan one source text and record it under `file`
    pub fn record_source(&mut self, file: &Path, source: &str) {
        self.record(file, scan(source));
    }

    /// All referenced keys, sorted
    pub fn keys(&self) -> impl Iterator<Item = &KeyPath> {
        self.references.keys()
    }

    /// Whether `key` is referenced anywhere
    pub fn contains(&self, key: &KeyPath) -> bool {
        self.references.contains_key(key)
    }

    /// Files referencing `key`, sorted
    pub fn citing_files(&self, key: &KeyPath) -> Vec<PathBuf> {
        self.references
            .get(key)
            .map(|files| files.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of distinct referenced keys
    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// Number of source files recorded
    pub fn files_scanned(&self) -> usize {
        self.files_scanned
    }

    /// Distinct referenced keys per top-level section, most referenced first.
    pub fn section_counts(&self) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for key in self.references.keys() {
            *counts.entry(key.section()).or_default() += 1;
        }

        let mut sections: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(section, count)| (section.to_string(), count))
            .collect();
        sections.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        sections
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| SKIPPED_DIRS.contains(&name))
            .unwrap_or(false)
}

/// Walk `root` and scan every file whose extension is in `extensions`.
///
/// Files are visited in path order so the index is reproducible. Unreadable
/// files are logged and skipped; non-UTF-8 bytes are replaced.
pub fn scan_directory(root: &Path, extensions: &[String]) -> Result<UsageIndex> {
    if !root.is_dir() {
        bail!("Source directory {} does not exist", root.display());
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !is_skipped_dir(entry))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable source entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| extensions.iter().any(|wanted| wanted == ext))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    let mut index = UsageIndex::new();
    for path in files {
        match std::fs::read(&path) {
            Ok(bytes) => {
                let source = String::from_utf8_lossy(&bytes);
                let keys = scan(&source);
                debug!("{}: {} key references", path.display(), keys.len());
                index.record(&path, keys);
            }
            Err(e) => warn!("Failed to read source file {}: {}", path.display(), e),
        }
    }

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn keys(source: &str) -> Vec<String> {
        scan(source).into_iter().map(|k| k.to_string()).collect()
    }

    // ==================== Function Call Pattern Tests ====================

    #[test]
    fn test_scan_plain_call() {
        assert_eq!(keys("const label = t('auth.login');"), vec!["auth.login"]);
    }

    #[test]
    fn test_scan_call_quote_styles() {
        let source = r#"t("a.one"); t(`a.two`); t( 'a.three' )"#;
        assert_eq!(keys(source), vec!["a.one", "a.three", "a.two"]);
    }

    #[test]
    fn test_scan_call_with_options() {
        let source = "t('dashboard.greeting', { name: user.name })";
        assert_eq!(keys(source), vec!["dashboard.greeting"]);
    }

    #[test]
    fn test_scan_member_and_vue_calls() {
        let source = "i18n.t('common.save'); this.$t('common.cancel'); props.t(\"nav.home\")";
        assert_eq!(keys(source), vec!["common.cancel", "common.save", "nav.home"]);
    }

    #[test]
    fn test_scan_jsx_expression() {
        assert_eq!(keys("<h1>{t('pages.home.title')}</h1>"), vec!["pages.home.title"]);
    }

    #[test]
    fn test_scan_ignores_other_functions_ending_in_t() {
        assert!(keys("format('a.b'); split('x.y'); _t('c.d')").is_empty());
    }

    #[test]
    fn test_scan_bracket_call() {
        assert_eq!(keys(r#"ctx["t"]('jobs.apply')"#), vec!["jobs.apply"]);
    }

    // ==================== Attribute Pattern Tests ====================

    #[test]
    fn test_scan_trans_component() {
        let source = r#"<Trans i18nKey="legal.consent" components={{ b: <b /> }} />"#;
        assert_eq!(keys(source), vec!["legal.consent"]);
    }

    #[test]
    fn test_scan_attribute_expression() {
        assert_eq!(keys("<Trans i18nKey={'legal.terms'} />"), vec!["legal.terms"]);
    }

    // ==================== Interpolation Pattern Tests ====================

    #[test]
    fn test_scan_interpolation_marker() {
        assert_eq!(keys("const title = 't:pricing.title';"), vec!["pricing.title"]);
    }

    #[test]
    fn test_scan_template_pipe() {
        assert_eq!(keys("{{ 'header.logout' | translate }}"), vec!["header.logout"]);
    }

    // ==================== Normalization Tests ====================

    #[test]
    fn test_scan_strips_namespace() {
        assert_eq!(keys("t('common:auth.login')"), vec!["auth.login"]);
    }

    #[test]
    fn test_scan_skips_dynamic_template_keys() {
        assert!(keys("t(`jobs.${status}`)").is_empty());
        assert!(keys("t('jobs.' + status)").is_empty());
    }

    #[test]
    fn test_scan_text_keys() {
        let source = r#"t('Welcome back'); t("Don't have an account?"); t('Note: saved')"#;
        assert_eq!(
            keys(source),
            vec!["Don't have an account?", "Note: saved", "Welcome back"]
        );
    }

    #[test]
    fn test_scan_quote_must_match_opening() {
        assert_eq!(keys(r#"t("it's fine"); t('say "hi"')"#), vec!["it's fine", "say \"hi\""]);
    }

    #[test]
    fn test_scan_collapses_duplicates() {
        assert_eq!(keys("t('a.b'); t('a.b'); i18n.t('a.b')"), vec!["a.b"]);
    }

    // ==================== UsageIndex Tests ====================

    #[test]
    fn test_index_records_citing_files() {
        let mut index = UsageIndex::new();
        index.record_source(Path::new("src/A.tsx"), "t('auth.login')");
        index.record_source(Path::new("src/B.tsx"), "t('auth.login'); t('nav.home')");

        let key = KeyPath::new("auth.login").unwrap();
        assert_eq!(
            index.citing_files(&key),
            vec![PathBuf::from("src/A.tsx"), PathBuf::from("src/B.tsx")]
        );
        assert_eq!(index.len(), 2);
        assert_eq!(index.files_scanned(), 2);
    }

    #[test]
    fn test_index_section_counts() {
        let mut index = UsageIndex::new();
        index.record_source(
            Path::new("a.js"),
            "t('auth.login'); t('auth.logout'); t('nav.home'); t('title')",
        );
        assert_eq!(
            index.section_counts(),
            vec![
                ("auth".to_string(), 2),
                ("nav".to_string(), 1),
                ("title".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_scan_directory_filters_extensions_and_skipped_dirs() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("components")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/lib")).unwrap();
        std::fs::write(root.join("components/Header.jsx"), "t('nav.home')").unwrap();
        std::fs::write(root.join("App.tsx"), "t('app.title')").unwrap();
        std::fs::write(root.join("notes.md"), "t('docs.only')").unwrap();
        std::fs::write(root.join("node_modules/lib/index.js"), "t('vendor.key')").unwrap();

        let extensions = vec!["js".to_string(), "jsx".to_string(), "tsx".to_string()];
        let index = scan_directory(root, &extensions).expect("Should scan");

        let found: Vec<_> = index.keys().map(|k| k.to_string()).collect();
        assert_eq!(found, vec!["app.title", "nav.home"]);
        assert_eq!(index.files_scanned(), 2);
    }

    #[test]
    fn test_scan_directory_missing_root() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let result = scan_directory(&temp_dir.path().join("nope"), &["js".to_string()]);
        assert!(result.is_err());
    }
}
