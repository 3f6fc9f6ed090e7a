//! Filling locale gaps through an external translation service.
//!
//! The service itself is a collaborator behind the `Translator` trait; no
//! network client ships with this crate. Every call is bounded by a timeout
//! and retried with backoff, and results are checked before they are
//! accepted. A key that cannot be translated is reported as failed and left
//! missing. Nothing is ever filled with a placeholder value.

use crate::i18n::{ConsistencyChecker, FlatTable, KeyPath, LocaleCode};
use crate::retry::{with_retry_if, RetryConfig};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// External machine translation collaborator.
pub trait Translator {
    /// Translate reference text into `target`.
    fn translate(
        &self,
        text: &str,
        target: &LocaleCode,
    ) -> impl Future<Output = anyhow::Result<String>> + Send;
}

/// Why a single translation was not accepted.
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("translation timed out after {0:?}")]
    Timeout(Duration),

    #[error("translation service error: {0}")]
    Service(anyhow::Error),

    #[error("translation came back empty")]
    Empty,

    #[error("placeholders changed: expected {expected:?}, got {actual:?}")]
    PlaceholderMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },
}

impl TranslationError {
    /// Transient failures are retried, rejected output is not
    pub fn is_retryable(&self) -> bool {
        matches!(self, TranslationError::Timeout(_) | TranslationError::Service(_))
    }
}

/// Bounds on gap filling.
#[derive(Debug, Clone)]
pub struct GapFillOptions {
    /// Per-call timeout
    pub timeout: Duration,

    /// Maximum translations in flight at once
    pub concurrency: usize,

    pub retry: RetryConfig,
}

impl Default for GapFillOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            concurrency: 4,
            retry: RetryConfig::translation(),
        }
    }
}

/// Result of filling one locale's gaps.
#[derive(Debug, Default)]
pub struct GapFill {
    /// Accepted translations
    pub translated: FlatTable,

    /// Keys that could not be translated, with the reason
    pub failed: BTreeMap<KeyPath, String>,
}

impl GapFill {
    /// Insert accepted translations into `table`. Existing values are never
    /// overwritten. Returns the number of keys added.
    pub fn apply_to(&self, table: &mut FlatTable) -> usize {
        let mut added = 0;
        for (key, value) in &self.translated {
            if !table.contains_key(key) {
                table.insert(key.clone(), value.clone());
                added += 1;
            }
        }
        added
    }
}

async fn translate_one<T: Translator + Sync>(
    translator: &T,
    text: &str,
    target: &LocaleCode,
    options: &GapFillOptions,
) -> Result<String, TranslationError> {
    let expected = ConsistencyChecker::extract_placeholders(text);

    with_retry_if(
        &options.retry,
        &format!("Translation to {}", target),
        || async {
            let translated = tokio::time::timeout(options.timeout, translator.translate(text, target))
                .await
                .map_err(|_| TranslationError::Timeout(options.timeout))?
                .map_err(TranslationError::Service)?;

            if translated.trim().is_empty() {
                return Err(TranslationError::Empty);
            }

            let actual = ConsistencyChecker::extract_placeholders(&translated);
            if actual != expected {
                return Err(TranslationError::PlaceholderMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }

            Ok::<_, TranslationError>(translated)
        },
        TranslationError::is_retryable,
    )
    .await
}

/// Request translations for `gaps` from the reference values.
///
/// Keys without a reference value are reported as failed.
pub async fn fill_gaps<T: Translator + Sync>(
    translator: &T,
    reference: &FlatTable,
    target: &LocaleCode,
    gaps: &BTreeSet<KeyPath>,
    options: &GapFillOptions,
) -> GapFill {
    let concurrency = options.concurrency.max(1);
    info!(
        "Filling {} gap(s) for {} ({} concurrent)",
        gaps.len(),
        target,
        concurrency
    );

    let results: Vec<(KeyPath, Result<String, String>)> = stream::iter(gaps.iter())
        .map(|key| async move {
            let result = match reference.get(key) {
                Some(text) => translate_one(translator, text, target, options)
                    .await
                    .map_err(|e| e.to_string()),
                None => Err("no reference value".to_string()),
            };
            (key.clone(), result)
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut fill = GapFill::default();
    for (key, result) in results {
        match result {
            Ok(value) => {
                fill.translated.insert(key, value);
            }
            Err(reason) => {
                warn!("Could not translate {} for {}: {}", key, target, reason);
                fill.failed.insert(key, reason);
            }
        }
    }

    info!(
        "Translated {}/{} gap(s) for {}",
        fill.translated.len(),
        gaps.len(),
        target
    );
    fill
}
