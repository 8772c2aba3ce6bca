//! Bulk import of `.bib` and `.pdf` files into the item store.
//!
//! Both importers walk a directory tree. New items are tagged with the name of
//! the directory the source file sat in plus `import_bib` / `import_pdf`.
//! Existing items only get the facet they are still missing.

use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;

use crate::bib;
use crate::cite::scan_sources;
use crate::store::{ItemStore, LiteratureItem, StoreError};

/// Tag added to items created from a `.bib` file.
pub const IMPORT_BIB_TAG: &str = "import_bib";
/// Tag added to items created from a `.pdf` file.
pub const IMPORT_PDF_TAG: &str = "import_pdf";

/// Counts of what an import did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    pub attached: usize,
    pub skipped: usize,
}

/// Converts a PDF into plain text.
pub trait TextExtractor {
    fn extract(&self, pdf: &Path, output: &Path) -> io::Result<()>;
}

/// Runs the external `pdftotext` binary.
#[derive(Debug, Clone, Default)]
pub struct Pdftotext;

impl TextExtractor for Pdftotext {
    fn extract(&self, pdf: &Path, output: &Path) -> io::Result<()> {
        tracing::debug!("extract text: {} -> {}", pdf.display(), output.display());
        let status = Command::new("pdftotext").arg(pdf).arg(output).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                format!("pdftotext exited with {}", status),
            ))
        }
    }
}

fn parent_dir_tag(path: &Path) -> Option<String> {
    path.parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
}

fn get_or_create<'a>(
    store: &'a mut ItemStore,
    name: &str,
    source: &Path,
    import_tag: &str,
    summary: &mut ImportSummary,
) -> Result<&'a mut LiteratureItem, StoreError> {
    if store.get(name).is_some() {
        tracing::info!("Item {} already exists", name);
    } else {
        let item = store.create(name)?;
        if let Some(tag) = parent_dir_tag(source) {
            item.append_tag(&tag)?;
        }
        item.append_tag(import_tag)?;
        summary.created += 1;
    }
    store
        .get_mut(name)
        .ok_or_else(|| StoreError::InvalidName(name.to_string()))
}

/// Imports every entry of every `.bib` file below `dir`.
pub fn import_bib(store: &mut ItemStore, dir: &Path) -> Result<ImportSummary, StoreError> {
    let dir = fs::canonicalize(dir)?;
    let mut summary = ImportSummary::default();

    for bib_path in scan_sources(&dir, "bib") {
        tracing::info!("Importing: {}", bib_path.display());
        let records = bib::read_records(&bib_path).map_err(|source| StoreError::BibError {
            name: bib_path.display().to_string(),
            source,
        })?;

        for record in records {
            let name = record.key.clone();
            let item = get_or_create(store, &name, &bib_path, IMPORT_BIB_TAG, &mut summary)?;
            if item.has_bib() {
                summary.skipped += 1;
            } else {
                item.attach_bib(record)?;
                summary.attached += 1;
            }
        }
    }

    Ok(summary)
}

/// Imports every `.pdf` below `dir`, naming items after the file stem.
///
/// The PDF is linked (not copied) into the item directory. Text extraction
/// failures are logged and do not stop the import.
pub fn import_pdf(
    store: &mut ItemStore,
    dir: &Path,
    extractor: &dyn TextExtractor,
) -> Result<ImportSummary, StoreError> {
    let dir = fs::canonicalize(dir)?;
    let mut summary = ImportSummary::default();

    for pdf_path in scan_sources(&dir, "pdf") {
        tracing::info!("Importing: {}", pdf_path.display());
        let Some(name) = pdf_path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };

        let item = get_or_create(store, &name, &pdf_path, IMPORT_PDF_TAG, &mut summary)?;
        if item.has_pdf() {
            summary.skipped += 1;
            continue;
        }

        if let Err(e) = extractor.extract(&pdf_path, &item.text_path()) {
            tracing::warn!("{}: text extraction failed: {}", name, e);
        }
        item.attach_pdf(&pdf_path)?;
        summary.attached += 1;
    }

    Ok(summary)
}
