//! Regex search over extracted PDF text.

use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::store::{ItemStore, StoreError};

/// Default number of characters shown either side of a match.
pub const DEFAULT_CONTEXT: usize = 30;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One hit inside an item's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    /// Byte offsets of the match in the extracted text.
    pub start: usize,
    pub end: usize,
    pub matched: String,
    /// The match with up to `context` characters either side, newlines removed.
    pub context: String,
}

/// All hits for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemMatches {
    pub name: String,
    pub matches: Vec<SearchMatch>,
}

/// Searches the extracted text of every item that has some.
///
/// The pattern is compiled in multi-line mode with `.` matching newlines.
/// Items without matches are left out; the result is in item name order.
pub fn search(
    store: &ItemStore,
    pattern: &str,
    ignore_case: bool,
    context: usize,
) -> Result<Vec<ItemMatches>, SearchError> {
    let re = RegexBuilder::new(pattern)
        .multi_line(true)
        .dot_matches_new_line(true)
        .case_insensitive(ignore_case)
        .build()?;

    let mut results = Vec::new();
    for item in store.iter() {
        let Some(text) = item.extracted_text()? else {
            continue;
        };
        let matches = find_matches(&re, &text, context);
        if matches.is_empty() {
            continue;
        }
        tracing::debug!("found {} matches for {}", matches.len(), item.name());
        results.push(ItemMatches {
            name: item.name().to_string(),
            matches,
        });
    }
    Ok(results)
}

fn find_matches(re: &Regex, text: &str, context: usize) -> Vec<SearchMatch> {
    re.find_iter(text)
        .map(|m| SearchMatch {
            start: m.start(),
            end: m.end(),
            matched: m.as_str().to_string(),
            context: context_window(text, m.start(), m.end(), context)
                .chars()
                .filter(|c| *c != '\n' && *c != '\r')
                .collect(),
        })
        .collect()
}

/// Slice of `text` covering `start..end` widened by `context` characters.
fn context_window(text: &str, start: usize, end: usize, context: usize) -> &str {
    let from = text[..start]
        .char_indices()
        .rev()
        .take(context)
        .last()
        .map_or(start, |(i, _)| i);
    let to = text[end..]
        .char_indices()
        .nth(context)
        .map_or(text.len(), |(i, _)| end + i);
    &text[from..to]
}
