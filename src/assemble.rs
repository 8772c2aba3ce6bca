//! Bibliography assembly from citation keys.
//!
//! Each key is resolved exactly (no prefix matching) against the item store.
//! Keys that do not resolve, and items without a bibliographic record, are
//! reported as diagnostics and skipped; assembly itself never fails.

use std::collections::BTreeSet;

use crate::bib::BibliographyDocument;
use crate::store::ItemStore;

/// Result of [`assemble_bibliography`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assembly {
    /// Records of every resolvable, bib-bearing key, in key order.
    pub document: BibliographyDocument,
    /// Keys that matched no item.
    pub missing: BTreeSet<String>,
    /// Keys whose item has no bibliographic record.
    pub without_bib: BTreeSet<String>,
}

impl Assembly {
    /// `true` when every key made it into the document.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.without_bib.is_empty()
    }
}

/// Collects the bibliographic records for a set of citation keys.
///
/// Keys are deduplicated before lookup, so duplicates in `keys` are harmless.
/// Records are filed under their own key, which normally equals the citation
/// key; a mismatch is logged and kept as is.
///
/// # Arguments
///
/// * `keys` - Citation keys, in any order
/// * `store` - The item store to resolve them against
///
/// # Returns
///
/// The assembled document plus the `missing` and `without_bib` diagnostics.
pub fn assemble_bibliography<I, S>(keys: I, store: &ItemStore) -> Assembly
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let keys: BTreeSet<String> = keys.into_iter().map(|k| k.as_ref().to_string()).collect();
    let mut assembly = Assembly::default();

    for key in keys {
        let item = match store.resolve(&key, false) {
            Ok(item) => item,
            Err(e) => {
                tracing::error!("Cannot find {}: {}", key, e);
                assembly.missing.insert(key);
                continue;
            }
        };

        let Some(record) = item.bib() else {
            tracing::error!("No bib for {}", item.name());
            assembly.without_bib.insert(key);
            continue;
        };

        if record.key != key {
            tracing::warn!("{}: bib entry is filed as '{}'", key, record.key);
        }
        tracing::info!("Creating bib entry: {}", record.key);
        if let Some(previous) = assembly.document.insert(record.clone()) {
            tracing::warn!("{}: duplicate bib key, replaced earlier entry", previous.key);
        }
    }

    assembly
}
