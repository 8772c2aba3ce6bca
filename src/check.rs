//! Consistency checks over a bibliography.
//!
//! Nothing here modifies the document. Every problem is returned as a
//! [`Finding`] and logged as a warning.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::bib::{self, BibliographicRecord, BibliographyDocument, Person};
use crate::journals::JournalAbbreviationMap;

/// A single problem found by [`check_bibliography`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Finding {
    /// A given name written entirely in capitals (`JOHN`).
    AllCapsName { key: String, person: String, token: String },
    /// A given name ending in `.` or `,`.
    TrailingPunctuation { key: String, person: String, token: String },
    /// An `and others` placeholder in the person list.
    PlaceholderAuthor { key: String },
    /// Two spellings of what is probably the same person.
    NameMismatch { surname: String, first: String, second: String },
    /// A journal that is neither a known abbreviation nor a known full name.
    UnrecognizedJournal { key: String, journal: String },
    MissingDoi { key: String },
    /// A year field that is not a number.
    InvalidYear { key: String, value: String },
    /// The year field disagrees with the year in the citation key.
    YearMismatch { key: String, field_year: i32, key_year: i32 },
}

impl Finding {
    /// Short machine-readable name of the finding kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Finding::AllCapsName { .. } => "all_caps_name",
            Finding::TrailingPunctuation { .. } => "trailing_punctuation",
            Finding::PlaceholderAuthor { .. } => "placeholder_author",
            Finding::NameMismatch { .. } => "name_mismatch",
            Finding::UnrecognizedJournal { .. } => "unrecognized_journal",
            Finding::MissingDoi { .. } => "missing_doi",
            Finding::InvalidYear { .. } => "invalid_year",
            Finding::YearMismatch { .. } => "year_mismatch",
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::AllCapsName { key, person, token } => {
                write!(f, "{}: '{}' has all-caps name '{}'", key, person, token)
            }
            Finding::TrailingPunctuation { key, person, token } => {
                write!(f, "{}: '{}' has punctuation in name '{}'", key, person, token)
            }
            Finding::PlaceholderAuthor { key } => {
                write!(f, "{}: author list contains 'others'", key)
            }
            Finding::NameMismatch { surname, first, second } => {
                write!(f, "{}: '{}' vs '{}'", surname, first, second)
            }
            Finding::UnrecognizedJournal { key, journal } => {
                write!(f, "{}: journal not recognized: '{}'", key, journal)
            }
            Finding::MissingDoi { key } => write!(f, "{}: no DOI", key),
            Finding::InvalidYear { key, value } => {
                write!(f, "{}: invalid year '{}'", key, value)
            }
            Finding::YearMismatch { key, field_year, key_year } => {
                write!(f, "{}: year {} does not match key year {}", key, field_year, key_year)
            }
        }
    }
}

/// Runs every check over `doc`.
///
/// Record-level findings come first, in key order, followed by name
/// mismatches across the whole document. Journal checks are skipped when no
/// table is given.
pub fn check_bibliography(
    doc: &BibliographyDocument,
    journals: Option<&JournalAbbreviationMap>,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    for record in doc.records() {
        check_persons(record, &mut findings);
        check_fields(record, journals, &mut findings);
    }
    findings.extend(name_mismatches(doc));

    for finding in &findings {
        tracing::warn!(kind = finding.kind(), "{}", finding);
    }
    findings
}

fn check_persons(record: &BibliographicRecord, findings: &mut Vec<Finding>) {
    for person in record.authors() {
        if person.is_placeholder() {
            findings.push(Finding::PlaceholderAuthor {
                key: record.key.clone(),
            });
            continue;
        }
        for token in &person.given {
            if is_all_caps(token) {
                findings.push(Finding::AllCapsName {
                    key: record.key.clone(),
                    person: person.to_string(),
                    token: token.clone(),
                });
            }
            if token.ends_with('.') || token.ends_with(',') {
                findings.push(Finding::TrailingPunctuation {
                    key: record.key.clone(),
                    person: person.to_string(),
                    token: token.clone(),
                });
            }
        }
    }
}

/// At least two letters, all of them uppercase, and no hyphen.
fn is_all_caps(token: &str) -> bool {
    let letters: Vec<char> = token.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 2 && !token.contains('-') && letters.iter().all(|c| c.is_uppercase())
}

fn check_fields(
    record: &BibliographicRecord,
    journals: Option<&JournalAbbreviationMap>,
    findings: &mut Vec<Finding>,
) {
    let key = &record.key;

    if let (Some(map), Some(journal)) = (journals, record.text("journal")) {
        if !map.recognizes(&journal) {
            findings.push(Finding::UnrecognizedJournal {
                key: key.clone(),
                journal,
            });
        }
    }

    if record.doi().map_or(true, |d| d.trim().is_empty()) {
        findings.push(Finding::MissingDoi { key: key.clone() });
    }

    if let Some(value) = record.field("year") {
        match record.year() {
            None => findings.push(Finding::InvalidYear {
                key: key.clone(),
                value: value.to_string(),
            }),
            Some(field_year) => {
                if let Some(key_year) = bib::year_from_key(key) {
                    if key_year != field_year {
                        findings.push(Finding::YearMismatch {
                            key: key.clone(),
                            field_year,
                            key_year,
                        });
                    }
                }
            }
        }
    }
}

/// Groups persons by surname and reports every pair of distinct given-name
/// spellings that share a first initial. Each pair is reported once, however
/// many records it occurs in.
fn name_mismatches(doc: &BibliographyDocument) -> Vec<Finding> {
    let mut by_surname: BTreeMap<String, BTreeSet<&Person>> = BTreeMap::new();
    for person in doc.records().flat_map(|r| r.authors()) {
        if person.is_placeholder() {
            continue;
        }
        by_surname
            .entry(person.surname_key())
            .or_default()
            .insert(person);
    }

    let mut findings = Vec::new();
    for (surname, persons) in &by_surname {
        let mut spellings: BTreeMap<&[String], &Person> = BTreeMap::new();
        for person in persons {
            spellings.entry(person.given.as_slice()).or_insert(*person);
        }
        let spellings: Vec<&Person> = spellings.into_values().collect();

        for (i, a) in spellings.iter().enumerate() {
            for b in &spellings[i + 1..] {
                if a.first_initial() != b.first_initial() {
                    continue;
                }
                findings.push(Finding::NameMismatch {
                    surname: surname.clone(),
                    first: a.to_string(),
                    second: b.to_string(),
                });
            }
        }
    }
    findings
}
