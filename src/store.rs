//! Directory-per-item literature store.
//!
//! Each item lives in `<root>/<name>/`. The files present in that directory
//! decide which facets the item has:
//!
//! - `ref.bib`: bibliographic record (one entry)
//! - `tags.txt`: comma-separated tags
//! - `extracted_text.txt`: text extracted from the PDF
//! - `title.txt`: manual title override
//! - `notes.txt`: free-form notes
//! - `<name>.pdf`: the PDF itself (usually a symlink)
//!
//! The store scans the root once when opened and keeps every item in memory.
//! Items created afterwards are added to that cache directly.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::bib::{self, BibError, BibliographicRecord};

pub const BIB_FILE: &str = "ref.bib";
pub const TAGS_FILE: &str = "tags.txt";
pub const TEXT_FILE: &str = "extracted_text.txt";
pub const TITLE_FILE: &str = "title.txt";
pub const NOTES_FILE: &str = "notes.txt";

/// Errors raised by store I/O.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Item '{name}': {source}")]
    BibError {
        name: String,
        #[source]
        source: BibError,
    },

    #[error("Item '{0}' already exists")]
    AlreadyExists(String),

    #[error("Invalid item name '{0}'")]
    InvalidName(String),
}

/// Why a key did not resolve to exactly one item.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Item '{0}' not found")]
    NotFound(String),

    #[error("Item '{key}' is ambiguous, candidates: {}", .candidates.join(", "))]
    Ambiguous { key: String, candidates: Vec<String> },
}

impl LookupError {
    /// The key that failed to resolve.
    pub fn key(&self) -> &str {
        match self {
            LookupError::NotFound(key) => key,
            LookupError::Ambiguous { key, .. } => key,
        }
    }
}

/// One managed literature reference.
#[derive(Debug, Clone)]
pub struct LiteratureItem {
    name: String,
    dir: PathBuf,
    bib: Option<BibliographicRecord>,
    tags: BTreeSet<String>,
    pdf: Option<PathBuf>,
    extracted_text: Option<PathBuf>,
    title_override: Option<String>,
}

impl LiteratureItem {
    /// Loads an item from its directory.
    pub fn load(dir: &Path) -> Result<Self, StoreError> {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| StoreError::InvalidName(dir.display().to_string()))?;

        let bib_path = dir.join(BIB_FILE);
        let bib = if bib_path.exists() {
            match bib::read_single_record(&bib_path) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(
                        "{}: unreadable {}, treating as missing: {}",
                        name,
                        BIB_FILE,
                        e
                    );
                    None
                }
            }
        } else {
            None
        };

        let tags_path = dir.join(TAGS_FILE);
        let tags = if tags_path.exists() {
            parse_tags(&fs::read_to_string(&tags_path)?)
        } else {
            BTreeSet::new()
        };

        let title_path = dir.join(TITLE_FILE);
        let title_override = if title_path.exists() {
            Some(fs::read_to_string(&title_path)?.trim().to_string())
        } else {
            None
        };

        let pdf_path = dir.join(format!("{}.pdf", name));
        let text_path = dir.join(TEXT_FILE);

        Ok(Self {
            pdf: pdf_path.exists().then_some(pdf_path),
            extracted_text: text_path.exists().then_some(text_path),
            name,
            dir: dir.to_path_buf(),
            bib,
            tags,
            title_override,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn bib(&self) -> Option<&BibliographicRecord> {
        self.bib.as_ref()
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn has_pdf(&self) -> bool {
        self.pdf.is_some()
    }

    pub fn has_bib(&self) -> bool {
        self.bib.is_some()
    }

    pub fn has_extracted_text(&self) -> bool {
        self.extracted_text.is_some()
    }

    pub fn has_title_override(&self) -> bool {
        self.title_override.is_some()
    }

    /// Location of the item's PDF, whether or not it exists yet.
    pub fn pdf_path(&self) -> PathBuf {
        self.dir.join(format!("{}.pdf", self.name))
    }

    pub fn text_path(&self) -> PathBuf {
        self.dir.join(TEXT_FILE)
    }

    pub fn bib_path(&self) -> PathBuf {
        self.dir.join(BIB_FILE)
    }

    pub fn tags_path(&self) -> PathBuf {
        self.dir.join(TAGS_FILE)
    }

    pub fn title_path(&self) -> PathBuf {
        self.dir.join(TITLE_FILE)
    }

    /// Free-form notes, only ever written by the user's editor.
    pub fn notes_path(&self) -> PathBuf {
        self.dir.join(NOTES_FILE)
    }

    /// Reads the extracted PDF text, if there is any.
    pub fn extracted_text(&self) -> Result<Option<String>, StoreError> {
        match &self.extracted_text {
            Some(path) => {
                let bytes = fs::read(path)?;
                Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
            }
            None => Ok(None),
        }
    }

    /// Title override if set, otherwise the plain bibliographic title.
    pub fn title(&self) -> String {
        if let Some(title) = &self.title_override {
            return title.clone();
        }
        self.bib
            .as_ref()
            .and_then(|b| b.text("title"))
            .unwrap_or_default()
    }

    /// Author surnames, comma separated.
    pub fn authors(&self) -> String {
        self.bib
            .as_ref()
            .map(|b| {
                b.authors()
                    .iter()
                    .map(|p| p.surname_key())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default()
    }

    /// Year embedded in the item name, see [`bib::year_from_key`].
    pub fn key_year(&self) -> Option<i32> {
        bib::year_from_key(&self.name)
    }

    /// Publication year, preferring the bibliographic field.
    ///
    /// Falls back to the year in the item name. A disagreement between the two
    /// is logged, never resolved.
    pub fn year(&self) -> Option<i32> {
        let bib_year = self.bib.as_ref().and_then(|b| b.year());
        let key_year = self.key_year();
        if let (Some(b), Some(k)) = (bib_year, key_year) {
            if b != k {
                tracing::warn!("{}: bib year {} differs from name year {}", self.name, b, k);
            }
        }
        bib_year.or(key_year)
    }

    pub fn doi_url(&self) -> Option<String> {
        self.bib
            .as_ref()
            .and_then(|b| b.doi())
            .map(|doi| format!("https://doi.org/{}", doi))
    }

    /// Adds a tag and rewrites `tags.txt`.
    pub fn append_tag(&mut self, tag: &str) -> Result<(), StoreError> {
        let tag = tag.trim();
        if tag.is_empty() || !self.tags.insert(tag.to_string()) {
            return Ok(());
        }
        tracing::debug!("{}: tags now {:?}", self.name, self.tags);
        let joined: Vec<&str> = self.tags.iter().map(String::as_str).collect();
        fs::write(self.dir.join(TAGS_FILE), joined.join(",") + "\n")?;
        Ok(())
    }

    /// Stores a manual title override.
    pub fn set_title(&mut self, title: &str) -> Result<(), StoreError> {
        fs::write(self.dir.join(TITLE_FILE), format!("{}\n", title.trim()))?;
        self.title_override = Some(title.trim().to_string());
        Ok(())
    }

    /// Writes `record` as the item's `ref.bib`, replacing any previous one.
    pub fn attach_bib(&mut self, record: BibliographicRecord) -> Result<(), StoreError> {
        fs::write(self.dir.join(BIB_FILE), record.to_bibtex())?;
        self.bib = Some(record);
        Ok(())
    }

    /// Links `source` into the item directory as `<name>.pdf`.
    ///
    /// On non-unix targets the file is copied instead.
    pub fn attach_pdf(&mut self, source: &Path) -> Result<(), StoreError> {
        link_file(source, &self.pdf_path())?;
        self.refresh_files();
        Ok(())
    }

    /// Re-checks which of the PDF and text files exist on disk.
    fn refresh_files(&mut self) {
        let pdf = self.pdf_path();
        let text = self.text_path();
        self.pdf = pdf.exists().then_some(pdf);
        self.extracted_text = text.exists().then_some(text);
    }
}

#[cfg(unix)]
fn link_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(not(unix))]
fn link_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::copy(src, dst).map(|_| ())
}

fn parse_tags(content: &str) -> BTreeSet<String> {
    content
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Criteria for [`ItemStore::items`]. `None` means "don't care".
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub tag: Option<String>,
    pub has_pdf: Option<bool>,
    pub has_bib: Option<bool>,
    pub has_extracted_text: Option<bool>,
}

impl ItemFilter {
    pub fn matches(&self, item: &LiteratureItem) -> bool {
        if let Some(tag) = &self.tag {
            if !item.has_tag(tag) {
                return false;
            }
        }
        self.has_pdf.map_or(true, |v| item.has_pdf() == v)
            && self.has_bib.map_or(true, |v| item.has_bib() == v)
            && self
                .has_extracted_text
                .map_or(true, |v| item.has_extracted_text() == v)
    }
}

/// In-memory view of every item under a root directory.
#[derive(Debug)]
pub struct ItemStore {
    root: PathBuf,
    items: BTreeMap<String, LiteratureItem>,
}

impl ItemStore {
    /// Opens (creating if needed) the store at `root` and scans it.
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(root)?;
        let mut store = Self {
            root: root.to_path_buf(),
            items: BTreeMap::new(),
        };
        store.scan()?;
        Ok(store)
    }

    fn scan(&mut self) -> Result<(), StoreError> {
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let file_name = entry.file_name();
            if file_name.to_string_lossy().starts_with('.') || !entry.path().is_dir() {
                continue;
            }
            tracing::debug!("adding item dir {}", file_name.to_string_lossy());
            let item = LiteratureItem::load(&entry.path())?;
            self.items.insert(item.name().to_string(), item);
        }
        tracing::debug!("scanned {} item(s) in {}", self.items.len(), self.root.display());
        Ok(())
    }

    /// Drops the cache and scans the root again.
    pub fn rescan(&mut self) -> Result<(), StoreError> {
        self.items.clear();
        self.scan()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&LiteratureItem> {
        self.items.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut LiteratureItem> {
        self.items.get_mut(name)
    }

    /// Resolves a citation key to an item.
    ///
    /// An exact match always wins. With `allow_prefix_match`, a key that is
    /// the prefix of exactly one item name resolves to that item; several
    /// candidates give [`LookupError::Ambiguous`].
    ///
    /// # Examples
    ///
    /// ```
    /// use litman::{ItemStore, LookupError};
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let mut store = ItemStore::open(dir.path()).unwrap();
    /// store.create("Smith2020a").unwrap();
    /// store.create("Smith2020b").unwrap();
    ///
    /// assert!(store.resolve("Smith2020a", true).is_ok());
    /// assert!(matches!(
    ///     store.resolve("Smith2020", true),
    ///     Err(LookupError::Ambiguous { .. })
    /// ));
    /// ```
    pub fn resolve(
        &self,
        key: &str,
        allow_prefix_match: bool,
    ) -> Result<&LiteratureItem, LookupError> {
        if let Some(item) = self.items.get(key) {
            return Ok(item);
        }
        if !allow_prefix_match {
            return Err(LookupError::NotFound(key.to_string()));
        }

        let candidates: Vec<&LiteratureItem> = self
            .items
            .range(key.to_string()..)
            .take_while(|(name, _)| name.starts_with(key))
            .map(|(_, item)| item)
            .collect();

        match candidates.as_slice() {
            [] => Err(LookupError::NotFound(key.to_string())),
            [item] => {
                tracing::debug!("prefix '{}' resolved to {}", key, item.name());
                Ok(item)
            }
            many => Err(LookupError::Ambiguous {
                key: key.to_string(),
                candidates: many.iter().map(|i| i.name().to_string()).collect(),
            }),
        }
    }

    /// Creates a new, empty item and adds it to the cache.
    ///
    /// # Errors
    ///
    /// Fails if a directory of that name already exists on disk or the name
    /// cannot be used as a directory name.
    pub fn create(&mut self, name: &str) -> Result<&mut LiteratureItem, StoreError> {
        if name.is_empty()
            || name.starts_with('.')
            || name.contains('/')
            || name.contains('\\')
            || name.trim() != name
        {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        let dir = self.root.join(name);
        if dir.exists() {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        fs::create_dir_all(&dir)?;
        tracing::info!("Creating item {}", name);
        let item = LiteratureItem::load(&dir)?;
        Ok(self.insert(item))
    }

    /// Adds an already-loaded item to the cache, replacing one of the same name.
    pub fn insert(&mut self, item: LiteratureItem) -> &mut LiteratureItem {
        match self.items.entry(item.name().to_string()) {
            Entry::Occupied(mut slot) => {
                slot.insert(item);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(item),
        }
    }

    /// Items matching `filter`, in name order.
    pub fn items(&self, filter: &ItemFilter) -> Vec<&LiteratureItem> {
        self.items.values().filter(|i| filter.matches(i)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LiteratureItem> {
        self.items.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with(names: &[&str]) -> (TempDir, ItemStore) {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ItemStore::open(dir.path()).unwrap();
        for name in names {
            store.create(name).unwrap();
        }
        (dir, store)
    }

    // ===========================================
    // Scanning
    // ===========================================

    #[test]
    fn test_scan_reads_facets_from_files() {
        // Given: an item directory with a bib file, tags and extracted text
        let dir = tempfile::tempdir().unwrap();
        let item_dir = dir.path().join("Smith2020");
        fs::create_dir(&item_dir).unwrap();
        fs::write(
            item_dir.join(BIB_FILE),
            "@article{Smith2020, title = {Rain}, year = {2020}}",
        )
        .unwrap();
        fs::write(item_dir.join(TAGS_FILE), "convection, rain\n").unwrap();
        fs::write(item_dir.join(TEXT_FILE), "some text").unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("README"), "not an item").unwrap();

        // When: we open the store
        let store = ItemStore::open(dir.path()).unwrap();

        // Then: only the item directory is loaded, with its facets
        assert_eq!(store.len(), 1);
        let item = store.get("Smith2020").unwrap();
        assert!(item.has_bib());
        assert!(item.has_extracted_text());
        assert!(!item.has_pdf());
        assert!(!item.has_title_override());
        assert_eq!(item.title(), "Rain");
        assert_eq!(
            item.tags().iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["convection", "rain"]
        );
    }

    #[test]
    fn test_scan_keeps_item_with_unreadable_bib() {
        // Given: one item whose ref.bib is empty and one without a bib
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Broken2005")).unwrap();
        fs::write(dir.path().join("Broken2005").join(BIB_FILE), "").unwrap();
        fs::create_dir(dir.path().join("Fine")).unwrap();

        // When: the store is opened
        let store = ItemStore::open(dir.path()).unwrap();

        // Then: the broken item is present and resolvable, just without bib data
        let broken = store.resolve("Broken2005", false).unwrap();
        assert!(!broken.has_bib());
        assert_eq!(broken.year(), Some(2005));
        assert!(store.get("Fine").is_some());
    }

    #[test]
    fn test_rescan_picks_up_external_changes() {
        let (dir, mut store) = store_with(&["A2000"]);
        fs::create_dir(dir.path().join("B2001")).unwrap();
        assert!(store.get("B2001").is_none());

        store.rescan().unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.get("B2001").is_some());
    }

    // ===========================================
    // Lookup
    // ===========================================

    #[test]
    fn test_resolve_exact() {
        let (_dir, store) = store_with(&["Smith2020a", "Smith2020b"]);
        let item = store.resolve("Smith2020a", false).unwrap();
        assert_eq!(item.name(), "Smith2020a");
    }

    #[test]
    fn test_resolve_exact_wins_over_prefix() {
        // Given: an exact name that is also a prefix of another
        let (_dir, store) = store_with(&["Smith2020", "Smith2020b"]);

        // When: we resolve with prefix matching on
        let item = store.resolve("Smith2020", true).unwrap();

        // Then: the exact item is returned, not an ambiguity
        assert_eq!(item.name(), "Smith2020");
    }

    #[test]
    fn test_resolve_missing_without_prefix() {
        let (_dir, store) = store_with(&["Smith2020a"]);
        let err = store.resolve("Smith2020", false).unwrap_err();
        assert_eq!(err, LookupError::NotFound("Smith2020".to_string()));
    }

    #[test]
    fn test_resolve_unique_prefix() {
        let (_dir, store) = store_with(&["Smith2020a", "Jones2019"]);
        let item = store.resolve("Smith", true).unwrap();
        assert_eq!(item.name(), "Smith2020a");
    }

    #[test]
    fn test_resolve_ambiguous_prefix_lists_candidates() {
        let (_dir, store) = store_with(&["Smith2020a", "Smith2020b", "Smithson2001"]);

        let err = store.resolve("Smith2020", true).unwrap_err();

        assert_eq!(
            err,
            LookupError::Ambiguous {
                key: "Smith2020".to_string(),
                candidates: vec!["Smith2020a".to_string(), "Smith2020b".to_string()],
            }
        );
        assert_eq!(err.key(), "Smith2020");
    }

    #[test]
    fn test_resolve_prefix_with_no_candidates() {
        let (_dir, store) = store_with(&["Smith2020a"]);
        let err = store.resolve("Jones", true).unwrap_err();
        assert!(matches!(err, LookupError::NotFound(_)));
    }

    // ===========================================
    // Creation
    // ===========================================

    #[test]
    fn test_create_is_visible_without_rescan() {
        let (dir, mut store) = store_with(&[]);

        store.create("New2024").unwrap();

        assert!(dir.path().join("New2024").is_dir());
        assert!(store.resolve("New2024", false).is_ok());
    }

    #[test]
    fn test_create_existing_fails() {
        let (dir, mut store) = store_with(&["A2000"]);
        fs::create_dir(dir.path().join("Disk2001")).unwrap();

        assert!(matches!(
            store.create("A2000"),
            Err(StoreError::AlreadyExists(_))
        ));
        // Present on disk but not yet in the cache still counts
        assert!(matches!(
            store.create("Disk2001"),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_create_rejects_path_like_names() {
        let (_dir, mut store) = store_with(&[]);
        assert!(matches!(store.create("../x"), Err(StoreError::InvalidName(_))));
        assert!(matches!(store.create(".hidden"), Err(StoreError::InvalidName(_))));
        assert!(matches!(store.create(""), Err(StoreError::InvalidName(_))));
    }

    // ===========================================
    // Facets
    // ===========================================

    #[test]
    fn test_append_tag_persists() {
        let (dir, mut store) = store_with(&["A2000"]);
        let item = store.get_mut("A2000").unwrap();

        item.append_tag("rain").unwrap();
        item.append_tag("clouds").unwrap();
        item.append_tag("rain").unwrap();

        let content = fs::read_to_string(dir.path().join("A2000").join(TAGS_FILE)).unwrap();
        assert_eq!(content, "clouds,rain\n");

        store.rescan().unwrap();
        assert_eq!(store.get("A2000").unwrap().tags().len(), 2);
    }

    #[test]
    fn test_attach_bib_and_title_override() {
        let (_dir, mut store) = store_with(&["A2000"]);
        let item = store.get_mut("A2000").unwrap();

        item.attach_bib(BibliographicRecord::new("A2000", "article").with_field("title", "Bib title"))
            .unwrap();
        assert_eq!(item.title(), "Bib title");

        item.set_title("Better title").unwrap();
        assert!(item.has_title_override());
        assert_eq!(item.title(), "Better title");

        store.rescan().unwrap();
        let item = store.get("A2000").unwrap();
        assert!(item.has_bib());
        assert_eq!(item.title(), "Better title");
    }

    #[test]
    fn test_attach_pdf_links_into_item_dir() {
        let (dir, mut store) = store_with(&["A2000"]);
        let source = dir.path().join(".incoming.pdf");
        fs::write(&source, b"%PDF-1.4").unwrap();
        let item = store.get_mut("A2000").unwrap();
        assert!(!item.has_pdf());

        item.attach_pdf(&source).unwrap();

        assert!(item.has_pdf());
        assert_eq!(fs::read(item.pdf_path()).unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn test_year_prefers_bib_field() {
        let (_dir, mut store) = store_with(&["Smith2020", "Jones"]);
        assert_eq!(store.get("Smith2020").unwrap().year(), Some(2020));
        assert_eq!(store.get("Jones").unwrap().year(), None);

        let item = store.get_mut("Smith2020").unwrap();
        item.attach_bib(BibliographicRecord::new("Smith2020", "article").with_field("year", "2021"))
            .unwrap();
        assert_eq!(item.key_year(), Some(2020));
        assert_eq!(item.year(), Some(2021));
    }

    #[test]
    fn test_key_year_requires_four_digits() {
        let (_dir, store) = store_with(&["Smith20a", "Held2005b"]);
        assert_eq!(store.get("Smith20a").unwrap().key_year(), None);
        assert_eq!(store.get("Held2005b").unwrap().key_year(), Some(2005));
    }

    #[test]
    fn test_filter_by_tag_and_facet() {
        let (_dir, mut store) = store_with(&["A2000", "B2001", "C2002"]);
        store.get_mut("A2000").unwrap().append_tag("rain").unwrap();
        store
            .get_mut("B2001")
            .unwrap()
            .attach_bib(BibliographicRecord::new("B2001", "misc").with_field("title", "B"))
            .unwrap();

        let tagged = store.items(&ItemFilter {
            tag: Some("rain".to_string()),
            ..Default::default()
        });
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].name(), "A2000");

        let without_bib = store.items(&ItemFilter {
            has_bib: Some(false),
            ..Default::default()
        });
        let names: Vec<&str> = without_bib.iter().map(|i| i.name()).collect();
        assert_eq!(names, vec!["A2000", "C2002"]);
    }

    #[test]
    fn test_doi_url() {
        let (_dir, mut store) = store_with(&["A2000"]);
        let item = store.get_mut("A2000").unwrap();
        assert_eq!(item.doi_url(), None);
        item.attach_bib(BibliographicRecord::new("A2000", "article").with_field("doi", "10.1/x"))
            .unwrap();
        assert_eq!(item.doi_url().as_deref(), Some("https://doi.org/10.1/x"));
    }
}
