//! Citation key extraction from LaTeX sources.
//!
//! Recognises `\cite{a,b}`-style commands, optionally followed by a star and
//! bracketed modifiers (`\citep[see][p.~4]{key}`). Only the first braced
//! argument is read as the key list.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use walkdir::WalkDir;

/// The citation commands recognised when none are configured.
pub const DEFAULT_CITE_COMMANDS: &[&str] = &["cite", "citet", "citep", "citeaffixed", "citeasnoun"];

/// Any `\name` command with optional star and bracketed modifiers, followed by
/// its first braced argument. The modifier group only admits `*` and `[...]`,
/// so the captured name is always the whole command (`citet`, never `cite`).
static CITE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\([A-Za-z]+)\*?(?:\s*\[[^\]\n]*\])*\s*\{([^{}\n]*?)\}")
        .expect("valid citation command regex")
});

/// Errors that can occur while extracting citations.
#[derive(Error, Debug)]
pub enum CiteError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid citation command name '{0}'")]
    InvalidCommand(String),

    #[error("'{0}' is not a file or directory")]
    NotFound(PathBuf),
}

/// Keys found in one or more documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedCitations {
    /// Every distinct key, whichever command cited it.
    pub keys: BTreeSet<String>,
    /// Distinct keys per command name. Commands with no hits are absent.
    pub by_command: BTreeMap<String, BTreeSet<String>>,
}

impl ExtractedCitations {
    /// Folds another extraction into this one.
    pub fn merge(&mut self, other: ExtractedCitations) {
        self.keys.extend(other.keys);
        for (command, keys) in other.by_command {
            self.by_command.entry(command).or_default().extend(keys);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Scans text for a configurable set of citation commands.
#[derive(Debug, Clone)]
pub struct CitationExtractor {
    commands: Vec<String>,
}

impl Default for CitationExtractor {
    fn default() -> Self {
        Self {
            commands: DEFAULT_CITE_COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl CitationExtractor {
    /// Builds an extractor for the given command names (without backslash).
    ///
    /// # Errors
    ///
    /// Returns [`CiteError::InvalidCommand`] for an empty name or one that
    /// contains anything but ASCII letters.
    pub fn new<S: AsRef<str>>(commands: &[S]) -> Result<Self, CiteError> {
        let mut names = Vec::with_capacity(commands.len());

        for command in commands {
            let command = command.as_ref();
            if command.is_empty() || !command.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(CiteError::InvalidCommand(command.to_string()));
            }
            if !names.iter().any(|name| name == command) {
                names.push(command.to_string());
            }
        }

        Ok(Self { commands: names })
    }

    /// Names of the recognised commands, in configuration order.
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(String::as_str)
    }

    /// Extracts citation keys from a document's text.
    ///
    /// Malformed invocations (unbalanced braces) are skipped silently.
    ///
    /// # Examples
    ///
    /// ```
    /// use litman::CitationExtractor;
    ///
    /// let found = CitationExtractor::default().extract("\\citet{Smith2020, Jones2019}");
    /// assert_eq!(found.keys.len(), 2);
    /// ```
    pub fn extract(&self, text: &str) -> ExtractedCitations {
        let mut found = ExtractedCitations::default();

        for line in text.lines() {
            for cap in CITE_RE.captures_iter(line) {
                let (Some(command), Some(list)) = (cap.get(1), cap.get(2)) else {
                    continue;
                };
                let command = command.as_str();
                if !self.commands.iter().any(|c| c == command) {
                    continue;
                }
                for key in list.as_str().split(',') {
                    let key = key.trim();
                    if key.is_empty() {
                        continue;
                    }
                    found.keys.insert(key.to_string());
                    found
                        .by_command
                        .entry(command.to_string())
                        .or_default()
                        .insert(key.to_string());
                }
            }
        }

        found
    }

    /// Reads a file (lossily, so stray non-UTF-8 bytes are tolerated) and
    /// extracts its citations.
    pub fn extract_file(&self, path: &Path) -> Result<ExtractedCitations, CiteError> {
        let bytes = fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes);
        let found = self.extract(&text);
        tracing::debug!("{}: {} citation key(s)", path.display(), found.keys.len());
        Ok(found)
    }

    /// Extracts citations from a single file or from every file with the
    /// given extension below a directory.
    pub fn extract_input(
        &self,
        input: &Path,
        extension: &str,
    ) -> Result<ExtractedCitations, CiteError> {
        let sources = if input.is_file() {
            vec![input.to_path_buf()]
        } else if input.is_dir() {
            scan_sources(input, extension)
        } else {
            return Err(CiteError::NotFound(input.to_path_buf()));
        };

        let mut all = ExtractedCitations::default();
        for source in &sources {
            all.merge(self.extract_file(source)?);
        }
        Ok(all)
    }
}

/// Lists files below `root` whose extension matches, sorted by path.
pub fn scan_sources(root: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| {
            entry.file_type().is_file()
                && entry.path().extension().map_or(false, |ext| ext == extension)
        })
        .map(|entry| entry.path().to_path_buf())
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(keys: &[&str]) -> BTreeSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_empty_text() {
        let found = CitationExtractor::default().extract("");
        assert!(found.is_empty());
        assert!(found.by_command.is_empty());
    }

    #[test]
    fn test_per_command_breakdown() {
        // Given: two lines citing overlapping keys with different commands
        let text = "As shown by \\citet{Smith2020,Jones2019},\nconvection \\citep{Smith2020}.";

        // When: we extract citations
        let found = CitationExtractor::default().extract(text);

        // Then: the combined set is deduplicated and the breakdown is per command
        assert_eq!(found.keys, set(&["Smith2020", "Jones2019"]));
        assert_eq!(found.by_command["citet"], set(&["Smith2020", "Jones2019"]));
        assert_eq!(found.by_command["citep"], set(&["Smith2020"]));
        assert!(!found.by_command.contains_key("cite"));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let text = "\\cite{B}\\cite{A}\n\\cite{B, A}\n\\citeasnoun{C}";
        let extractor = CitationExtractor::default();

        let first = extractor.extract(text);
        let second = extractor.extract(text);

        assert_eq!(first, second);
        assert_eq!(first.keys, set(&["A", "B", "C"]));
    }

    #[test]
    fn test_whitespace_around_keys_is_trimmed() {
        let found = CitationExtractor::default().extract("\\cite{ a_1 ,  b2 }");
        assert_eq!(found.keys, set(&["a_1", "b2"]));
    }

    #[test]
    fn test_modifiers_are_skipped() {
        // Given: starred and optional-argument forms
        let text = "\\citep[see][p.~4]{Held2005} and \\cite*{Emanuel1994}";

        // When: we extract citations
        let found = CitationExtractor::default().extract(text);

        // Then: keys come from the braced argument only
        assert_eq!(found.keys, set(&["Held2005", "Emanuel1994"]));
    }

    #[test]
    fn test_citeaffixed_reads_first_argument() {
        let found = CitationExtractor::default().extract("\\citeaffixed{Arakawa1974}{e.g.}");
        assert_eq!(found.keys, set(&["Arakawa1974"]));
        assert_eq!(found.by_command["citeaffixed"], set(&["Arakawa1974"]));
    }

    #[test]
    fn test_cite_does_not_match_longer_commands() {
        let found = CitationExtractor::new(&["cite"]).unwrap().extract("\\citet{A} \\citep{B}");
        assert!(found.is_empty());
    }

    #[test]
    fn test_unbalanced_braces_yield_nothing() {
        let found = CitationExtractor::default().extract("\\cite{Smith2020\nmore text}");
        assert!(found.is_empty());
    }

    #[test]
    fn test_empty_key_list_yields_nothing() {
        let found = CitationExtractor::default().extract("\\cite{} and \\citep{ , }");
        assert!(found.is_empty());
    }

    #[test]
    fn test_custom_command_set() {
        let extractor = CitationExtractor::new(&["parencite"]).unwrap();
        let found = extractor.extract("\\parencite{A} \\cite{B}");
        assert_eq!(found.keys, set(&["A"]));
        assert_eq!(extractor.commands().collect::<Vec<_>>(), vec!["parencite"]);
    }

    #[test]
    fn test_default_recognises_default_commands_only() {
        // Given: the default extractor and text mixing other commands
        let extractor = CitationExtractor::default();
        let text = "\\emph{x} \\footnote{see \\cite{A}} \\parencite{B} \\citep{C}";

        // When: we extract citations
        let found = extractor.extract(text);

        // Then: only configured commands contribute keys
        assert_eq!(extractor.commands().collect::<Vec<_>>(), DEFAULT_CITE_COMMANDS);
        assert_eq!(found.keys, set(&["A", "C"]));
    }

    #[test]
    fn test_invalid_command_name() {
        let result = CitationExtractor::new(&["cite{"]);
        assert!(matches!(result, Err(CiteError::InvalidCommand(_))));
    }

    #[test]
    fn test_merge_accumulates() {
        let extractor = CitationExtractor::default();
        let mut all = extractor.extract("\\cite{A}");
        all.merge(extractor.extract("\\citet{A,B}"));

        assert_eq!(all.keys, set(&["A", "B"]));
        assert_eq!(all.by_command["cite"], set(&["A"]));
        assert_eq!(all.by_command["citet"], set(&["A", "B"]));
    }

    #[test]
    fn test_extract_input_walks_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("chapters")).unwrap();
        fs::write(dir.path().join("main.tex"), "\\cite{A}").unwrap();
        fs::write(dir.path().join("chapters/one.tex"), "\\citep{B}").unwrap();
        fs::write(dir.path().join("notes.txt"), "\\cite{C}").unwrap();

        let found = CitationExtractor::default()
            .extract_input(dir.path(), "tex")
            .unwrap();

        assert_eq!(found.keys, set(&["A", "B"]));
    }

    #[test]
    fn test_extract_file_tolerates_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.tex");
        let mut bytes = b"caf\xe9 \\cite{Smith2020}".to_vec();
        bytes.push(b'\n');
        fs::write(&path, bytes).unwrap();

        let found = CitationExtractor::default().extract_file(&path).unwrap();
        assert_eq!(found.keys, set(&["Smith2020"]));
    }

    #[test]
    fn test_extract_input_missing_path() {
        let result =
            CitationExtractor::default().extract_input(Path::new("/nonexistent/paper"), "tex");
        assert!(matches!(result, Err(CiteError::NotFound(_))));
    }
}
