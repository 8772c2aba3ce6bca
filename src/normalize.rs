//! Heuristic clean-up of assembled bibliographies.
//!
//! Two independent rewrites, each switched on separately:
//!
//! - title casing, wrapping the result in braces so BibTeX styles leave it
//!   alone
//! - expansion of abbreviated journal names through a
//!   [`JournalAbbreviationMap`]
//!
//! Only the `title` and `journal` fields are ever touched.

use std::collections::HashSet;

use crate::bib::{BibliographicRecord, BibliographyDocument};
use crate::journals::{capitalize, JournalAbbreviationMap};

/// Words lowercased inside titles.
pub const SMALL_WORDS: &[&str] = &[
    "a", "an", "the", "and", "but", "or", "nor", "for", "of", "in", "on", "at", "to", "by",
    "with", "as", "from", "into", "onto", "between", "above", "below", "over", "under", "via",
];

/// What [`Normalizer::apply`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub titles_cased: Vec<String>,
    pub journals_expanded: Vec<String>,
}

/// Configured title/journal rewriter.
#[derive(Debug, Clone, Default)]
pub struct Normalizer<'a> {
    case_titles: bool,
    title_exceptions: HashSet<String>,
    journals: Option<&'a JournalAbbreviationMap>,
}

impl<'a> Normalizer<'a> {
    /// A normalizer with both rewrites off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns on title casing, skipping the given keys.
    pub fn with_title_case<I, S>(mut self, exceptions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.case_titles = true;
        self.title_exceptions = exceptions.into_iter().map(Into::into).collect();
        self
    }

    /// Turns on journal expansion through `map`.
    pub fn with_journals(mut self, map: &'a JournalAbbreviationMap) -> Self {
        self.journals = Some(map);
        self
    }

    /// Rewrites every record of `doc` in place.
    pub fn apply(&self, doc: &mut BibliographyDocument) -> NormalizeReport {
        let mut report = NormalizeReport::default();

        for record in doc.records_mut() {
            if self.case_titles && self.case_record_title(record) {
                report.titles_cased.push(record.key.clone());
            }
            if let Some(map) = self.journals {
                if expand_journal(record, map) {
                    report.journals_expanded.push(record.key.clone());
                }
            }
        }

        report
    }

    fn case_record_title(&self, record: &mut BibliographicRecord) -> bool {
        if self.title_exceptions.contains(&record.key) {
            tracing::debug!("{}: title casing skipped", record.key);
            return false;
        }
        let Some(title) = record.title() else {
            return false;
        };
        let cased = title_case(title);
        if cased == title {
            return false;
        }
        tracing::debug!("{}: title '{}' -> '{}'", record.key, title, cased);
        record.set_field("title", cased);
        true
    }
}

/// Replaces an abbreviated journal with its full name. Returns `true` if the
/// field changed.
pub fn expand_journal(record: &mut BibliographicRecord, map: &JournalAbbreviationMap) -> bool {
    let Some(full) = record.text("journal").and_then(|j| map.expand(&j)) else {
        return false;
    };
    tracing::info!("{}: journal expanded to '{}'", record.key, full);
    record.set_text("journal", &full);
    true
}

/// Title-cases a raw title and wraps it in protecting braces.
///
/// Small words are lowercased, words with two or more capitals are kept as
/// acronyms, everything else is capitalized. Words inside braces or starting
/// with a TeX command are left as written. The first character is always
/// uppercase. A title that is already wrapped is returned unchanged.
///
/// # Examples
///
/// ```
/// use litman::normalize::title_case;
///
/// assert_eq!(
///     title_case("the role of CAPE in tropical convection"),
///     "{The Role of CAPE in Tropical Convection}"
/// );
/// ```
pub fn title_case(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() || is_brace_protected(raw) {
        return raw.to_string();
    }

    let mut depth = 0usize;
    let words: Vec<String> = raw
        .split_whitespace()
        .map(|token| {
            let protected = depth > 0
                || token.starts_with('\\')
                || token.contains(|c: char| c == '{' || c == '}');
            depth = depth_after(token, depth);
            let lower = token.to_lowercase();
            if protected {
                token.to_string()
            } else if SMALL_WORDS.contains(&lower.as_str()) {
                lower
            } else if token.chars().filter(|c| c.is_uppercase()).count() >= 2 {
                token.to_string()
            } else {
                capitalize(token)
            }
        })
        .collect();

    let joined = words.join(" ");
    let mut chars = joined.chars();
    let first_upper: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    format!("{{{}}}", first_upper)
}

/// Brace nesting depth after `token`, skipping escaped characters.
fn depth_after(token: &str, mut depth: usize) -> usize {
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depth
}

/// `true` when the whole string sits inside one outer brace pair.
fn is_brace_protected(s: &str) -> bool {
    if !s.starts_with('{') || !s.ends_with('}') {
        return false;
    }
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == s.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}
