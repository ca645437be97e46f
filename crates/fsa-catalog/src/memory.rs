use dashmap::DashMap;

use crate::{AssetMetadata, CatalogEntry, CatalogResult, ContentHash, MetadataCatalog};

/// `DashMap`-backed catalog for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    entries: DashMap<String, CatalogEntry>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataCatalog for InMemoryCatalog {
    fn get(&self, id: &str) -> CatalogResult<Option<CatalogEntry>> {
        Ok(self.entries.get(id).map(|entry| entry.value().clone()))
    }

    fn store(&self, metadata: &AssetMetadata, hash: &ContentHash) -> CatalogResult<bool> {
        self.entries.insert(
            metadata.id.clone(),
            CatalogEntry {
                metadata: metadata.clone(),
                hash: *hash,
            },
        );
        Ok(true)
    }

    fn exists(&self, ids: &[String]) -> CatalogResult<Vec<bool>> {
        Ok(ids.iter().map(|id| self.entries.contains_key(id)).collect())
    }

    fn delete(&self, id: &str) -> CatalogResult<bool> {
        Ok(self.entries.remove(id).is_some())
    }

    fn count(&self) -> CatalogResult<u64> {
        Ok(self.entries.len() as u64)
    }
}
