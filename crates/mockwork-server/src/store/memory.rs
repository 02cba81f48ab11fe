use super::{Catalog, DefinitionStore, StoreError};
use crate::definition::{Collection, Definition};
use parking_lot::RwLock;

/// Volatile store, used when no dataset directory is configured.
#[derive(Debug, Default)]
pub struct InMemoryDefinitionStore {
    catalog: RwLock<Catalog>,
}

impl InMemoryDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_definitions(definitions: impl IntoIterator<Item = Definition>) -> Self {
        let store = Self::new();
        {
            let mut catalog = store.catalog.write();
            for definition in definitions {
                catalog.upsert(definition);
            }
        }
        store
    }
}

impl DefinitionStore for InMemoryDefinitionStore {
    fn list(&self) -> Result<Vec<Definition>, StoreError> {
        Ok(self.catalog.read().definitions.clone())
    }

    fn get(&self, id: &str) -> Result<Option<Definition>, StoreError> {
        Ok(self.catalog.read().get(id).cloned())
    }

    fn save(&self, definition: Definition) -> Result<(), StoreError> {
        self.catalog.write().upsert(definition);
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.catalog.write().remove(id))
    }

    fn collections(&self) -> Result<Vec<Collection>, StoreError> {
        Ok(self.catalog.read().collections.clone())
    }

    fn save_collection(&self, collection: Collection) -> Result<(), StoreError> {
        self.catalog.write().upsert_collection(collection);
        Ok(())
    }

    fn remove_collection(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.catalog.write().remove_collection(id))
    }
}
