//! Bibliographic records and BibTeX reading/writing.
//!
//! Parsing is delegated to `biblatex`. Each field keeps its BibTeX text as
//! written in the source (brace protection, escapes, bare month macros), so a
//! record written back out matches the `ref.bib` it came from. Use
//! [`BibliographicRecord::text`] for the plain reading of a field. Writing is
//! done here, one entry per block, persons first and then fields in name order.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;

use biblatex::{Bibliography, Chunk, ChunksExt, Entry, Pair, RawBibliography, RawChunk, Spanned};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Name-list fields that are parsed into [`Person`]s instead of plain fields.
const PERSON_ROLES: &[&str] = &["author"];

/// Fields whose values are URLs or paths, escaped less aggressively.
const VERBATIM_FIELDS: &[&str] = &[
    "doi", "eprint", "file", "pdf", "uri", "url", "urlraw", "verba", "verbb", "verbc",
];

/// Month macros BibTeX styles predefine.
const MONTH_MACROS: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

static KEY_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\D*(\d*)").expect("Invalid key year regex pattern"));

/// Year embedded in a citation key (`Smith2020a` -> 2020).
///
/// Only a four-digit run directly after the leading non-digits counts.
pub fn year_from_key(key: &str) -> Option<i32> {
    let digits = KEY_YEAR_RE.captures(key)?.get(1)?.as_str();
    if digits.len() != 4 {
        return None;
    }
    digits.parse().ok()
}

/// Errors that can occur when reading or writing BibTeX.
#[derive(Error, Debug)]
pub enum BibError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid BibTeX: {0}")]
    ParseError(String),

    #[error("No entries found")]
    NoEntries,
}

/// Name components of one author.
///
/// `given` holds first and middle name tokens in order, `surname` holds the
/// particle ("van", "de") and last-name tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Person {
    pub given: Vec<String>,
    pub surname: Vec<String>,
    pub suffix: Vec<String>,
}

impl Person {
    /// Builds a person from whitespace-separated given names and surname.
    pub fn new(given: &str, surname: &str) -> Self {
        Self {
            given: split_tokens(given),
            surname: split_tokens(surname),
            suffix: Vec::new(),
        }
    }

    fn from_biblatex(person: &biblatex::Person) -> Self {
        let mut surname = split_tokens(&person.prefix);
        surname.extend(split_tokens(&person.name));
        Self {
            given: split_tokens(&person.given_name),
            surname,
            suffix: split_tokens(&person.suffix),
        }
    }

    /// Surname tokens joined by a space, used to group people.
    pub fn surname_key(&self) -> String {
        self.surname.join(" ")
    }

    /// First character of the first given name, if any.
    pub fn first_initial(&self) -> Option<char> {
        self.given.first().and_then(|g| g.chars().next())
    }

    /// `true` for the "and others" placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.surname.len() == 1 && self.surname[0] == "others"
    }

    /// BibTeX name form: `von Last, Jr, First Middle`.
    pub fn to_bibtex(&self) -> String {
        let mut out = self.surname.join(" ");
        if !self.suffix.is_empty() {
            out.push_str(", ");
            out.push_str(&self.suffix.join(" "));
        }
        if !self.given.is_empty() {
            out.push_str(", ");
            out.push_str(&self.given.join(" "));
        }
        out
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<&str> = self.given.iter().map(String::as_str).collect();
        parts.extend(self.surname.iter().map(String::as_str));
        parts.extend(self.suffix.iter().map(String::as_str));
        write!(f, "{}", parts.join(" "))
    }
}

fn split_tokens(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

/// A field value as it appeared in the source.
enum SourceValue {
    /// Text between the braces or quotes.
    Delimited(String),
    /// A number or month macro, written without braces.
    Bare(String),
}

fn source_value(src: &str, pair: &Pair<'_>, macros: &[Pair<'_>]) -> Option<SourceValue> {
    let [chunk] = pair.value.v.as_slice() else {
        return None;
    };
    match chunk.v {
        RawChunk::Normal(text) => {
            let delimited = src
                .get(..chunk.span.start)
                .map_or(false, |before| before.ends_with(|c: char| c == '{' || c == '"'));
            if delimited {
                Some(SourceValue::Delimited(text.to_string()))
            } else {
                Some(SourceValue::Bare(text.to_string()))
            }
        }
        RawChunk::Abbreviation(name) => {
            let month = MONTH_MACROS.contains(&name.to_ascii_lowercase().as_str());
            let redefined = macros.iter().any(|m| m.key.v == name);
            (month && !redefined).then(|| SourceValue::Bare(name.to_string()))
        }
    }
}

/// BibTeX text for resolved chunks, without the outer braces.
fn chunks_to_text(name: &str, chunks: &[Spanned<Chunk>]) -> String {
    let braced = chunks.to_biblatex_string(VERBATIM_FIELDS.contains(&name));
    braced
        .strip_prefix('{')
        .and_then(|inner| inner.strip_suffix('}'))
        .unwrap_or(braced.as_str())
        .to_string()
}

/// Plain reading of BibTeX text: grouping braces dropped, escapes resolved.
fn plain_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next) if "&%$#_{}".contains(next) => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            '{' | '}' => {}
            _ => out.push(c),
        }
    }
    out
}

/// A single structured citation entry.
#[derive(Debug, Clone, PartialEq)]
pub struct BibliographicRecord {
    /// Citation key the record is filed under.
    pub key: String,
    /// Entry type, e.g. `article`.
    pub entry_type: String,
    /// BibTeX text of each field, without the outer braces, keyed by
    /// lowercase field name.
    pub fields: BTreeMap<String, String>,
    /// Ordered person lists keyed by role (`author`).
    pub persons: BTreeMap<String, Vec<Person>>,
    /// Fields written without braces, with the text they were read as.
    bare: BTreeMap<String, String>,
    /// Name lists as written, reused while the persons are unchanged.
    written_names: BTreeMap<String, (Vec<Person>, String)>,
}

impl BibliographicRecord {
    pub fn new(key: impl Into<String>, entry_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            entry_type: entry_type.into(),
            fields: BTreeMap::new(),
            persons: BTreeMap::new(),
            bare: BTreeMap::new(),
            written_names: BTreeMap::new(),
        }
    }

    fn from_entry(entry: &Entry, mut written: BTreeMap<String, SourceValue>) -> Self {
        let mut record = Self::new(entry.key.clone(), entry.entry_type.to_string());

        for (name, chunks) in &entry.fields {
            let name = name.to_lowercase();
            if PERSON_ROLES.contains(&name.as_str()) {
                continue;
            }
            let text = match written.remove(&name) {
                Some(SourceValue::Delimited(text)) => text,
                Some(SourceValue::Bare(text)) => {
                    record.bare.insert(name.clone(), text.clone());
                    text
                }
                None => chunks_to_text(&name, chunks),
            };
            record.fields.insert(name, text);
        }

        if let Ok(authors) = entry.author() {
            let authors: Vec<Person> = authors.iter().map(Person::from_biblatex).collect();
            if !authors.is_empty() {
                if let Some(SourceValue::Delimited(text)) = written.remove("author") {
                    record
                        .written_names
                        .insert("author".to_string(), (authors.clone(), text));
                }
                record.persons.insert("author".to_string(), authors);
            }
        }

        record
    }

    /// BibTeX text of a field, looked up by name ignoring case.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Plain text of a field: `{GATE} \& {CO2}` reads as `GATE & CO2`.
    pub fn text(&self, name: &str) -> Option<String> {
        self.field(name).map(plain_text)
    }

    /// Sets a field to BibTeX text, written back as is inside braces.
    pub fn set_field(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_lowercase();
        self.bare.remove(&name);
        self.fields.insert(name, value.into());
    }

    /// Sets a field from plain text, escaping BibTeX special characters.
    pub fn set_text(&mut self, name: &str, plain: &str) {
        let verbatim = VERBATIM_FIELDS.contains(&name.to_lowercase().as_str());
        let text = Chunk::Normal(plain.to_string()).to_biblatex_string(verbatim);
        self.set_field(name, text);
    }

    pub fn with_field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_field(name, value);
        self
    }

    pub fn with_author(mut self, person: Person) -> Self {
        self.persons
            .entry("author".to_string())
            .or_default()
            .push(person);
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.field("title")
    }

    pub fn journal(&self) -> Option<&str> {
        self.field("journal")
    }

    pub fn doi(&self) -> Option<&str> {
        self.field("doi")
    }

    pub fn authors(&self) -> &[Person] {
        self.persons.get("author").map(Vec::as_slice).unwrap_or(&[])
    }

    /// The `year` field parsed as an integer.
    ///
    /// Returns `None` when the field is absent or not a number.
    pub fn year(&self) -> Option<i32> {
        self.text("year").and_then(|y| y.trim().parse().ok())
    }

    /// Serializes this record as one BibTeX entry.
    pub fn to_bibtex(&self) -> String {
        let mut out = format!("@{}{{{},\n", self.entry_type, self.key);
        for (role, persons) in &self.persons {
            let names = match self.written_names.get(role) {
                Some((read, text)) if read == persons => text.clone(),
                _ => persons
                    .iter()
                    .map(Person::to_bibtex)
                    .collect::<Vec<_>>()
                    .join(" and "),
            };
            out.push_str(&format!("    {} = {{{}}},\n", role, names));
        }
        for (name, value) in &self.fields {
            match self.bare.get(name) {
                Some(read) if read == value => {
                    out.push_str(&format!("    {} = {},\n", name, value));
                }
                _ => out.push_str(&format!("    {} = {{{}}},\n", name, value)),
            }
        }
        out.push_str("}\n");
        out
    }
}

/// Parses every entry in a BibTeX source, in source order.
pub fn parse_records(src: &str) -> Result<Vec<BibliographicRecord>, BibError> {
    let raw = RawBibliography::parse(src).map_err(|e| BibError::ParseError(e.to_string()))?;
    let mut written: HashMap<String, BTreeMap<String, SourceValue>> = raw
        .entries
        .iter()
        .map(|entry| {
            let values = entry
                .v
                .fields
                .iter()
                .filter_map(|pair| {
                    let value = source_value(src, pair, &raw.abbreviations)?;
                    Some((pair.key.v.to_ascii_lowercase(), value))
                })
                .collect();
            (entry.v.key.v.to_string(), values)
        })
        .collect();

    let bibliography =
        Bibliography::from_raw(raw).map_err(|e| BibError::ParseError(e.to_string()))?;
    Ok(bibliography
        .iter()
        .map(|entry| {
            let values = written.remove(&entry.key).unwrap_or_default();
            BibliographicRecord::from_entry(entry, values)
        })
        .collect())
}

/// Reads every entry of a `.bib` file.
pub fn read_records(path: &Path) -> Result<Vec<BibliographicRecord>, BibError> {
    let content = fs::read_to_string(path)?;
    parse_records(&content)
}

/// Reads a `.bib` file expected to hold exactly one entry.
///
/// Extra entries are ignored with a warning.
pub fn read_single_record(path: &Path) -> Result<BibliographicRecord, BibError> {
    let mut records = read_records(path)?;
    if records.len() > 1 {
        tracing::warn!(
            "{}: {} entries found, using the first",
            path.display(),
            records.len()
        );
    }
    if records.is_empty() {
        return Err(BibError::NoEntries);
    }
    Ok(records.swap_remove(0))
}

/// A set of records, unique by key and iterated in key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BibliographyDocument {
    entries: BTreeMap<String, BibliographicRecord>,
}

impl BibliographyDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a BibTeX source. Later entries with a duplicate key replace
    /// earlier ones.
    pub fn parse(src: &str) -> Result<Self, BibError> {
        let mut doc = Self::new();
        for record in parse_records(src)? {
            doc.insert(record);
        }
        Ok(doc)
    }

    pub fn from_file(path: &Path) -> Result<Self, BibError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Inserts a record under its own key, returning any record it replaced.
    pub fn insert(&mut self, record: BibliographicRecord) -> Option<BibliographicRecord> {
        self.entries.insert(record.key.clone(), record)
    }

    pub fn get(&self, key: &str) -> Option<&BibliographicRecord> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut BibliographicRecord> {
        self.entries.get_mut(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn records(&self) -> impl Iterator<Item = &BibliographicRecord> {
        self.entries.values()
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut BibliographicRecord> {
        self.entries.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes all records, separated by blank lines.
    pub fn to_bibtex(&self) -> String {
        self.entries
            .values()
            .map(BibliographicRecord::to_bibtex)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Writes the whole document to `path`, replacing any existing file.
    pub fn write_to(&self, path: &Path) -> Result<(), BibError> {
        fs::write(path, self.to_bibtex())?;
        Ok(())
    }
}
