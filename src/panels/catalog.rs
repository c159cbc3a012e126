//! Process-wide cache of spawnable items.
//!
//! Populated once on first use (or by the start-up warm-up task) and read-only
//! afterwards. An empty source leaves the cache unpopulated so the next use
//! tries again.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::host::CatalogSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    populated: bool,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_populated(&self) -> bool {
        self.populated
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Populate unless already done. Returns true if this call populated it.
    pub fn ensure_populated(&mut self, source: &dyn CatalogSource) -> bool {
        if self.populated {
            return false;
        }
        self.refresh(source);
        self.populated
    }

    /// Re-read the source unconditionally. Returns the entry count.
    pub fn refresh(&mut self, source: &dyn CatalogSource) -> usize {
        let raw = source.list_catalog_entries();
        let offered = raw.len();

        // First occurrence of an id wins
        let mut seen = HashSet::new();
        let mut entries: Vec<CatalogEntry> = raw
            .into_iter()
            .filter_map(|(id, label)| {
                let id = id.trim().to_string();
                if id.is_empty() || !seen.insert(id.clone()) {
                    return None;
                }
                let label = label.trim();
                let label = if label.is_empty() {
                    id.clone()
                } else {
                    label.to_string()
                };
                Some(CatalogEntry { id, label })
            })
            .collect();
        entries.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.id.cmp(&b.id)));

        if entries.is_empty() {
            warn!("Item catalog source returned no usable entries ({} offered)", offered);
            self.entries.clear();
            self.populated = false;
            return 0;
        }

        if entries.len() != offered {
            debug!("Skipped {} unusable catalog entries", offered - entries.len());
        }
        info!("Item catalog populated with {} entries", entries.len());
        self.entries = entries;
        self.populated = true;
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::sim::SimCatalog;

    #[test]
    fn test_population_skips_blank_ids_and_sorts_by_label() {
        let source = SimCatalog::new([
            ("wood", "Wood"),
            ("", "Ghost"),
            ("iron", ""),
            ("axe", "Axe"),
        ]);
        let mut catalog = Catalog::new();

        assert!(catalog.ensure_populated(&source));
        let labels: Vec<&str> = catalog.entries().iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Axe", "Wood", "iron"]);
        assert_eq!(catalog.get("iron").unwrap().label, "iron");
    }

    #[test]
    fn test_populate_happens_once() {
        let mut catalog = Catalog::new();
        assert!(catalog.ensure_populated(&SimCatalog::new([("a", "A")])));
        assert!(!catalog.ensure_populated(&SimCatalog::new([("b", "B")])));
        assert_eq!(catalog.len(), 1);

        // Explicit refresh is the only way to pick up new entries
        assert_eq!(catalog.refresh(&SimCatalog::new([("b", "B"), ("c", "C")])), 2);
        assert!(catalog.get("a").is_none());
    }

    #[test]
    fn test_empty_source_stays_unpopulated() {
        let mut catalog = Catalog::new();
        assert!(!catalog.ensure_populated(&SimCatalog::default()));
        assert!(!catalog.is_populated());

        assert!(catalog.ensure_populated(&SimCatalog::new([("a", "A")])));
    }

    #[test]
    fn test_duplicate_ids_collapse() {
        let mut catalog = Catalog::new();
        catalog.refresh(&SimCatalog::new([("a", "Apple"), ("a", "Apple")]));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_duplicate_ids_with_different_labels_keep_first() {
        let mut catalog = Catalog::new();
        let count = catalog.refresh(&SimCatalog::new([
            ("a", "Apple"),
            ("b", "Banana"),
            ("a", "Zebra"),
        ]));

        assert_eq!(count, 2);
        let ids: Vec<&str> = catalog.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(catalog.get("a").unwrap().label, "Apple");
    }
}
