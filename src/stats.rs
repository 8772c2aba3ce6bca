//! Counters over the whole item store.

use std::collections::{BTreeMap, HashMap};

use crate::store::ItemStore;

/// Bibliographic fields whose values are counted.
pub const BIB_COUNTER_FIELDS: &[&str] = &["year", "publisher", "journal"];

/// Tag and field value counts, most common first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub items: usize,
    pub tags: Vec<(String, usize)>,
    /// Field name -> lowercased value counts.
    pub fields: BTreeMap<String, Vec<(String, usize)>>,
}

pub fn stats(store: &ItemStore) -> StoreStats {
    let mut tags: HashMap<String, usize> = HashMap::new();
    let mut fields: BTreeMap<String, HashMap<String, usize>> = BTreeMap::new();

    for item in store.iter() {
        for tag in item.tags() {
            *tags.entry(tag.clone()).or_default() += 1;
        }
        let Some(record) = item.bib() else {
            continue;
        };
        for field in BIB_COUNTER_FIELDS {
            if let Some(value) = record.text(field) {
                *fields
                    .entry(field.to_string())
                    .or_default()
                    .entry(value.trim().to_lowercase())
                    .or_default() += 1;
            }
        }
    }

    StoreStats {
        items: store.len(),
        tags: most_common(tags),
        fields: fields
            .into_iter()
            .map(|(field, counts)| (field, most_common(counts)))
            .collect(),
    }
}

/// Sorts by descending count, ties broken by value.
fn most_common(counts: HashMap<String, usize>) -> Vec<(String, usize)> {
    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bib::BibliographicRecord;

    #[test]
    fn test_stats_counts_tags_and_fields() {
        // Given: three items with overlapping tags and journals
        let dir = tempfile::tempdir().unwrap();
        let mut store = ItemStore::open(dir.path()).unwrap();
        for (name, journal, tags) in [
            ("A2000", "Nature", vec!["rain", "clouds"]),
            ("B2000", "NATURE", vec!["rain"]),
            ("C2001", "Science", vec![]),
        ] {
            let item = store.create(name).unwrap();
            for tag in tags {
                item.append_tag(tag).unwrap();
            }
            let year = &name[1..];
            item.attach_bib(
                BibliographicRecord::new(name, "article")
                    .with_field("journal", journal)
                    .with_field("year", year),
            )
            .unwrap();
        }

        // When: we collect stats
        let stats = stats(&store);

        // Then: values are lowercased and sorted most common first
        assert_eq!(stats.items, 3);
        assert_eq!(
            stats.tags,
            vec![("rain".to_string(), 2), ("clouds".to_string(), 1)]
        );
        assert_eq!(
            stats.fields["journal"],
            vec![("nature".to_string(), 2), ("science".to_string(), 1)]
        );
        assert_eq!(
            stats.fields["year"],
            vec![("2000".to_string(), 2), ("2001".to_string(), 1)]
        );
        assert!(!stats.fields.contains_key("publisher"));
    }

    #[test]
    fn test_stats_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = ItemStore::open(dir.path()).unwrap();
        assert_eq!(stats(&store), StoreStats::default());
    }
}
