//! Journal abbreviation table.
//!
//! The table is a flat JSON object mapping an all-caps abbreviation
//! (`"J ATMOS SCI"`) to the full journal name
//! (`"JOURNAL OF THE ATMOSPHERIC SCIENCES"`). It is loaded once and only read
//! afterwards.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use thiserror::Error;

/// Words kept lowercase when a full journal name is re-cased.
const LOWERCASE_WORDS: &[&str] = &["for", "of", "in", "the", "and"];
/// Words kept uppercase when a full journal name is re-cased.
const UPPERCASE_WORDS: &[&str] = &["IEEE"];

/// Errors that can occur when loading the journal table.
#[derive(Error, Debug)]
pub enum JournalError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Read-only abbreviation -> full name mapping.
#[derive(Debug, Clone, Default)]
pub struct JournalAbbreviationMap {
    names: BTreeMap<String, String>,
    full_names: HashSet<String>,
}

impl JournalAbbreviationMap {
    pub fn new(names: BTreeMap<String, String>) -> Self {
        let full_names = names
            .values()
            .flat_map(|full| [full.clone(), cased_journal_name(full)])
            .collect();
        Self { names, full_names }
    }

    /// Loads the table from a JSON object of string to string.
    pub fn load(path: &Path) -> Result<Self, JournalError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, JournalError> {
        let names: BTreeMap<String, String> = serde_json::from_str(json)?;
        Ok(Self::new(names))
    }

    /// Full (upper-case) name for an exact, case-sensitive abbreviation.
    pub fn full_name(&self, abbreviation: &str) -> Option<&str> {
        self.names.get(abbreviation).map(String::as_str)
    }

    /// Re-cased full name for an abbreviation, ready to replace it.
    pub fn expand(&self, abbreviation: &str) -> Option<String> {
        self.full_name(abbreviation).map(cased_journal_name)
    }

    /// `true` if `journal` is a known abbreviation or a known full name,
    /// either as stored or as produced by [`expand`](Self::expand).
    pub fn recognizes(&self, journal: &str) -> bool {
        self.names.contains_key(journal) || self.full_names.contains(journal)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Title-cases a journal name word by word.
///
/// `for`, `of`, `in`, `the` and `and` are always lowercase and `IEEE` always
/// uppercase.
pub fn cased_journal_name(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            if LOWERCASE_WORDS.contains(&lower.as_str()) {
                lower
            } else if UPPERCASE_WORDS.iter().any(|u| u.eq_ignore_ascii_case(word)) {
                word.to_uppercase()
            } else {
                capitalize(&lower)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// First character uppercase, the rest lowercase.
pub(crate) fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TABLE: &str = r#"{
        "J ATMOS SCI": "JOURNAL OF THE ATMOSPHERIC SCIENCES",
        "IEEE T GEOSCI REMOTE": "IEEE TRANSACTIONS ON GEOSCIENCE AND REMOTE SENSING",
        "Q J ROY METEOR SOC": "QUARTERLY JOURNAL OF THE ROYAL METEOROLOGICAL SOCIETY"
    }"#;

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(TABLE.as_bytes()).unwrap();
        file.flush().unwrap();

        let map = JournalAbbreviationMap::load(file.path()).unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(
            map.full_name("J ATMOS SCI"),
            Some("JOURNAL OF THE ATMOSPHERIC SCIENCES")
        );
    }

    #[test]
    fn test_load_rejects_non_object() {
        let result = JournalAbbreviationMap::from_json(r#"["J ATMOS SCI"]"#);
        assert!(matches!(result, Err(JournalError::JsonError(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = JournalAbbreviationMap::load(Path::new("/nonexistent/journals.json"));
        assert!(matches!(result, Err(JournalError::IoError(_))));
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let map = JournalAbbreviationMap::from_json(TABLE).unwrap();
        assert!(map.full_name("J Atmos Sci").is_none());
        assert!(map.expand("j atmos sci").is_none());
    }

    #[test]
    fn test_expand_applies_word_casing() {
        let map = JournalAbbreviationMap::from_json(TABLE).unwrap();

        assert_eq!(
            map.expand("J ATMOS SCI").as_deref(),
            Some("Journal of the Atmospheric Sciences")
        );
        assert_eq!(
            map.expand("IEEE T GEOSCI REMOTE").as_deref(),
            Some("IEEE Transactions On Geoscience and Remote Sensing")
        );
    }

    #[test]
    fn test_recognizes_abbreviations_and_full_names() {
        let map = JournalAbbreviationMap::from_json(TABLE).unwrap();

        assert!(map.recognizes("Q J ROY METEOR SOC"));
        assert!(map.recognizes("QUARTERLY JOURNAL OF THE ROYAL METEOROLOGICAL SOCIETY"));
        assert!(map.recognizes("Quarterly Journal of the Royal Meteorological Society"));
        assert!(!map.recognizes("Nature"));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("hELLO"), "Hello");
        assert_eq!(capitalize(""), "");
    }
}
