//! Locale type: validated locale code.
//!
//! A locale is identified by the name of its directory under the locales
//! root (e.g. `en`, `fr`, `pt-BR`). This module provides the `LocaleCode`
//! type, which guarantees the code has a sane shape before it is used to
//! build paths or report rows.

use anyhow::{bail, Result};
use serde::Serialize;
use std::fmt;

/// A validated locale code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct LocaleCode(String);

impl LocaleCode {
    /// Create a LocaleCode from a code string.
    ///
    /// Accepts a 2-3 letter language subtag optionally followed by
    /// `-`/`_` separated alphanumeric subtags (`en`, `pt-BR`, `zh_Hant`).
    ///
    /// # Returns
    /// * `Ok(LocaleCode)` if the code is well formed
    /// * `Err` if the code is empty or malformed
    pub fn from_code(code: &str) -> Result<LocaleCode> {
        let code = code.trim();
        if code.is_empty() {
            bail!("Locale code is empty");
        }

        let mut parts = code.split(['-', '_']);
        let language = parts.next().unwrap_or_default();
        if !(2..=3).contains(&language.len()) || !language.chars().all(|c| c.is_ascii_alphabetic())
        {
            bail!("Invalid locale code: '{}'", code);
        }
        for part in parts {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_alphanumeric()) {
                bail!("Invalid locale code: '{}'", code);
            }
        }

        Ok(LocaleCode(code.to_string()))
    }

    /// Get the locale code as a string slice.
    pub fn code(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocaleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
