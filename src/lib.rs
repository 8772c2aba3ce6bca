//! litman: a personal literature manager.
//!
//! This library provides functionality to:
//! - Extract citation keys from LaTeX-style document sources
//! - Keep papers in a directory-per-item store with bib data, PDFs and tags
//! - Assemble a BibTeX bibliography for the cited keys
//! - Normalize titles and journal names, and check bibliographies for
//!   inconsistent author names and fields

pub mod assemble;
pub mod bib;
pub mod check;
pub mod cite;
pub mod config;
pub mod import;
pub mod journals;
pub mod logging;
pub mod normalize;
pub mod search;
pub mod stats;
pub mod store;

pub use assemble::{assemble_bibliography, Assembly};
pub use bib::{BibError, BibliographicRecord, BibliographyDocument, Person};
pub use check::{check_bibliography, Finding};
pub use cite::{CitationExtractor, CiteError, ExtractedCitations};
pub use config::{Config, ConfigError};
pub use import::{import_bib, import_pdf, ImportSummary, Pdftotext, TextExtractor};
pub use journals::{JournalAbbreviationMap, JournalError};
pub use normalize::{NormalizeReport, Normalizer};
pub use search::{search, ItemMatches, SearchError, SearchMatch};
pub use stats::{stats, StoreStats};
pub use store::{ItemFilter, ItemStore, LiteratureItem, LookupError, StoreError};
