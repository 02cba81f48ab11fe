//! Persistence of definitions and collections.
//!
//! The route table never reads a store directly: the workspace primes the
//! table from [`DefinitionStore::list`] at startup and then mirrors every
//! acknowledged write into it.

mod file;
mod memory;

pub use file::JsonFileDefinitionStore;
pub use memory::InMemoryDefinitionStore;

use crate::definition::{Collection, Definition};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode dataset: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Storage for one workspace's definitions and collections.
pub trait DefinitionStore: Send + Sync {
    /// All definitions, in insertion order.
    fn list(&self) -> Result<Vec<Definition>, StoreError>;

    fn get(&self, id: &str) -> Result<Option<Definition>, StoreError>;

    /// Insert or replace by id.
    fn save(&self, definition: Definition) -> Result<(), StoreError>;

    /// Returns whether the id existed.
    fn remove(&self, id: &str) -> Result<bool, StoreError>;

    /// Collections with empty `paths`; see [`crate::definition::group_by_collection`].
    fn collections(&self) -> Result<Vec<Collection>, StoreError>;

    fn save_collection(&self, collection: Collection) -> Result<(), StoreError>;

    fn remove_collection(&self, id: &str) -> Result<bool, StoreError>;
}

/// Serialized form of a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct Catalog {
    #[serde(default)]
    pub collections: Vec<Collection>,
    #[serde(default)]
    pub definitions: Vec<Definition>,
}

impl Catalog {
    pub fn get(&self, id: &str) -> Option<&Definition> {
        self.definitions.iter().find(|d| d.id == id)
    }

    pub fn upsert(&mut self, definition: Definition) {
        match self.definitions.iter_mut().find(|d| d.id == definition.id) {
            Some(existing) => *existing = definition,
            None => self.definitions.push(definition),
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.definitions.len();
        self.definitions.retain(|d| d.id != id);
        self.definitions.len() != before
    }

    pub fn upsert_collection(&mut self, mut collection: Collection) {
        collection.paths.clear();
        match self.collections.iter_mut().find(|c| c.id == collection.id) {
            Some(existing) => *existing = collection,
            None => self.collections.push(collection),
        }
    }

    pub fn remove_collection(&mut self, id: &str) -> bool {
        let before = self.collections.len();
        self.collections.retain(|c| c.id != id);
        self.collections.len() != before
    }
}
