//! Two-level configuration store (`section -> key -> raw value`).
//!
//! The store is loaded once, before any action runs, and is never written to by the
//! interpreter. It parses the familiar INI layout:
//!
//! ```text
//! [General]
//! implicitly_wait = 4
//!
//! [Actions]
//! login = [["get", "https://example.com/"],
//!     ["click", "//input[@name=\"login\"]"]]
//! ```
//!
//! - `key = value` and `key: value` are both accepted.
//! - Lines starting with `#` or `;` are comments.
//! - Indented lines continue the previous value (joined with `\n`).
//! - Keys are case-insensitive; section names are not.
//! - `[DEFAULT]` supplies fallback values for every other section.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, trace};

/// Name of the section whose keys act as fallbacks for every other section.
pub const DEFAULT_SECTION: &str = "DEFAULT";

/// Errors raised while parsing store text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("line {line}: entry appears before any [section] header")]
    MissingSectionHeader { line: usize },

    #[error("line {line}: section [{section}] is defined more than once")]
    DuplicateSection { line: usize, section: String },

    #[error("line {line}: key '{key}' is defined more than once in [{section}]")]
    DuplicateKey {
        line: usize,
        section: String,
        key: String,
    },

    #[error("line {line}: expected `key = value`, found '{content}'")]
    Malformed { line: usize, content: String },
}

/// Immutable section/key/value mapping consumed by the variable resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigStore {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a value. Intended for building stores in code.
    pub fn insert(
        &mut self,
        section: impl Into<String>,
        key: impl AsRef<str>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.sections
            .entry(section.into())
            .or_default()
            .insert(normalize_key(key.as_ref()), value.into());
        self
    }

    /// Look up `section`/`key`, falling back to `[DEFAULT]` when the section exists
    /// but lacks the key.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        let entries = self.sections.get(section)?;
        let key = normalize_key(key);
        entries
            .get(&key)
            .or_else(|| {
                self.sections
                    .get(DEFAULT_SECTION)
                    .and_then(|defaults| defaults.get(&key))
            })
            .map(String::as_str)
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    /// Section names in sorted order.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Keys defined directly in `section` (defaults excluded), sorted.
    pub fn keys(&self, section: &str) -> Vec<&str> {
        self.sections
            .get(section)
            .map(|entries| entries.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Parse INI-formatted text.
    pub fn from_ini_str(text: &str) -> Result<Self, StoreError> {
        let mut store = ConfigStore::new();
        let mut current_section: Option<String> = None;
        let mut current_key: Option<String> = None;

        for (idx, raw_line) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw_line.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            // Continuation of the previous value
            if raw_line.starts_with(char::is_whitespace)
                && let (Some(section), Some(key)) = (&current_section, &current_key)
            {
                if let Some(value) = store
                    .sections
                    .get_mut(section)
                    .and_then(|entries| entries.get_mut(key))
                {
                    if !value.is_empty() {
                        value.push('\n');
                    }
                    value.push_str(trimmed);
                }
                continue;
            }

            if let Some(name) = trimmed
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
            {
                let name = name.trim().to_string();
                if store.sections.contains_key(&name) {
                    return Err(StoreError::DuplicateSection {
                        line,
                        section: name,
                    });
                }
                trace!(target: "brokerscript::store", section = %name, line, "Section header");
                store.sections.insert(name.clone(), BTreeMap::new());
                current_section = Some(name);
                current_key = None;
                continue;
            }

            let Some(section) = &current_section else {
                return Err(StoreError::MissingSectionHeader { line });
            };

            let Some(split_at) = trimmed.find(['=', ':']) else {
                return Err(StoreError::Malformed {
                    line,
                    content: trimmed.to_string(),
                });
            };
            let key = normalize_key(&trimmed[..split_at]);
            if key.is_empty() {
                return Err(StoreError::Malformed {
                    line,
                    content: trimmed.to_string(),
                });
            }
            let value = trimmed[split_at + 1..].trim().to_string();

            let entries = store.sections.entry(section.clone()).or_default();
            if entries.contains_key(&key) {
                return Err(StoreError::DuplicateKey {
                    line,
                    section: section.clone(),
                    key,
                });
            }
            entries.insert(key.clone(), value);
            current_key = Some(key);
        }

        Ok(store)
    }

    /// Read and parse an INI file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        use anyhow::Context;

        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read store file {}", path.display()))?;
        let store = Self::from_ini_str(&text)
            .with_context(|| format!("Failed to parse store file {}", path.display()))?;
        debug!(
            target: "brokerscript::store",
            path = %path.display(),
            sections = store.sections.len(),
            "Loaded store"
        );
        Ok(store)
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_sections_and_both_separators() {
        let store = ConfigStore::from_ini_str(
            "[General]\nheadless = True\nimplicitly_wait: 4\n\n[Paths]\nroot=/tmp\n",
        )
        .unwrap();
        assert_eq!(store.get("General", "headless"), Some("True"));
        assert_eq!(store.get("General", "implicitly_wait"), Some("4"));
        assert_eq!(store.get("Paths", "root"), Some("/tmp"));
        assert_eq!(store.sections().collect::<Vec<_>>(), vec!["General", "Paths"]);
    }

    #[test]
    fn test_keys_are_case_insensitive_sections_are_not() {
        let store = ConfigStore::from_ini_str("[Quotes]\nSymbols = 7203, 9984\n").unwrap();
        assert_eq!(store.get("Quotes", "symbols"), Some("7203, 9984"));
        assert_eq!(store.get("Quotes", "SYMBOLS"), Some("7203, 9984"));
        assert_eq!(store.get("quotes", "symbols"), None);
    }

    #[test]
    fn test_continuation_lines_are_joined() {
        let text = "[Actions]\nlogin = [[\"get\", \"https://x\"],\n    [\"refresh\"]]\n# trailing comment\n";
        let store = ConfigStore::from_ini_str(text).unwrap();
        assert_eq!(
            store.get("Actions", "login"),
            Some("[[\"get\", \"https://x\"],\n[\"refresh\"]]")
        );
    }

    #[test]
    fn test_default_section_supplies_fallbacks() {
        let store =
            ConfigStore::from_ini_str("[DEFAULT]\ndelay = 0.8\n[Site]\nurl = https://x\n").unwrap();
        assert_eq!(store.get("Site", "delay"), Some("0.8"));
        assert_eq!(store.get("Missing", "delay"), None);
        assert_eq!(store.keys("Site"), vec!["url"]);
    }

    #[test]
    fn test_reports_structural_errors_with_line_numbers() {
        assert_eq!(
            ConfigStore::from_ini_str("key = value\n"),
            Err(StoreError::MissingSectionHeader { line: 1 })
        );
        assert_eq!(
            ConfigStore::from_ini_str("[A]\nx = 1\nX = 2\n"),
            Err(StoreError::DuplicateKey {
                line: 3,
                section: "A".into(),
                key: "x".into()
            })
        );
        assert_eq!(
            ConfigStore::from_ini_str("[A]\n[A]\n"),
            Err(StoreError::DuplicateSection {
                line: 2,
                section: "A".into()
            })
        );
        assert!(matches!(
            ConfigStore::from_ini_str("[A]\njust words\n"),
            Err(StoreError::Malformed { line: 2, .. })
        ));
    }

    #[test]
    fn test_insert_normalizes_keys() {
        let mut store = ConfigStore::new();
        store.insert("A", "Key", "v");
        assert_eq!(store.get("A", "key"), Some("v"));
        assert!(store.has_section("A"));
    }
}
