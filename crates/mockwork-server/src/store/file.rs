use super::{Catalog, DefinitionStore, StoreError};
use crate::definition::{Collection, Definition};
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Store persisted as one pretty-printed JSON document.
///
/// The document is loaded once on open and rewritten after every mutation.
/// A mutation that fails to persist is rolled back in memory.
#[derive(Debug)]
pub struct JsonFileDefinitionStore {
    path: PathBuf,
    catalog: RwLock<Catalog>,
}

impl JsonFileDefinitionStore {
    /// Open `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let catalog = if path.exists() {
            let json = fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            let catalog: Catalog =
                serde_json::from_str(&json).map_err(|source| StoreError::Decode {
                    path: path.clone(),
                    source,
                })?;
            info!(
                "Loaded {} definitions from {:?}",
                catalog.definitions.len(),
                path
            );
            catalog
        } else {
            debug!("Dataset {:?} does not exist, starting fresh", path);
            Catalog::default()
        };
        Ok(Self {
            path,
            catalog: RwLock::new(catalog),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` and persist; the in-memory copy is restored if writing fails.
    fn mutate<T>(&self, change: impl FnOnce(&mut Catalog) -> T) -> Result<T, StoreError> {
        let mut catalog = self.catalog.write();
        let previous = catalog.clone();
        let result = change(&mut catalog);
        if let Err(e) = self.persist(&catalog) {
            *catalog = previous;
            return Err(e);
        }
        Ok(result)
    }

    fn persist(&self, catalog: &Catalog) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(catalog)?;
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        debug!(
            "Saved {} definitions to {:?}",
            catalog.definitions.len(),
            self.path
        );
        Ok(())
    }
}

impl DefinitionStore for JsonFileDefinitionStore {
    fn list(&self) -> Result<Vec<Definition>, StoreError> {
        Ok(self.catalog.read().definitions.clone())
    }

    fn get(&self, id: &str) -> Result<Option<Definition>, StoreError> {
        Ok(self.catalog.read().get(id).cloned())
    }

    fn save(&self, definition: Definition) -> Result<(), StoreError> {
        self.mutate(|c| c.upsert(definition))
    }

    fn remove(&self, id: &str) -> Result<bool, StoreError> {
        self.mutate(|c| c.remove(id))
    }

    fn collections(&self) -> Result<Vec<Collection>, StoreError> {
        Ok(self.catalog.read().collections.clone())
    }

    fn save_collection(&self, collection: Collection) -> Result<(), StoreError> {
        self.mutate(|c| c.upsert_collection(collection))
    }

    fn remove_collection(&self, id: &str) -> Result<bool, StoreError> {
        self.mutate(|c| c.remove_collection(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::MockBody;

    #[test]
    fn test_round_trip_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.definitions.json");

        let mut def = Definition::new("a", "GET", "/users/{id}");
        def.collect_id = "c1".to_string();
        def.mock_body = Some(MockBody::raw("json", r#"{"id": "{{path "id"}}"}"#));
        def.mock_status = [("statusCode", "201")].into_iter().collect();

        {
            let store = JsonFileDefinitionStore::open(&path).unwrap();
            assert!(store.list().unwrap().is_empty());
            store.save(def.clone()).unwrap();
            store.save(Definition::new("b", "DELETE", "/b")).unwrap();
            store
                .save_collection(Collection {
                    id: "c1".to_string(),
                    name: "Users".to_string(),
                    paths: Vec::new(),
                })
                .unwrap();
            assert!(store.remove("b").unwrap());
        }

        let reopened = JsonFileDefinitionStore::open(&path).unwrap();
        assert_eq!(reopened.list().unwrap(), vec![def]);
        assert_eq!(reopened.collections().unwrap()[0].name, "Users");
    }

    #[test]
    fn test_reads_persisted_wire_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ws.definitions.json");
        std::fs::write(
            &path,
            r#"{
                "definitions": [{
                    "collectId": "c1",
                    "id": "d1",
                    "method": "GET",
                    "path": "/ping",
                    "mock_body": {"dataType": "raw", "rawType": "text", "rawValue": "pong"}
                }]
            }"#,
        )
        .unwrap();

        let store = JsonFileDefinitionStore::open(&path).unwrap();
        let def = store.get("d1").unwrap().unwrap();
        assert_eq!(def.collect_id, "c1");
        assert_eq!(def.mock_body.unwrap().raw_value, "pong");
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonFileDefinitionStore::open(&path),
            Err(StoreError::Decode { .. })
        ));
    }

    #[test]
    fn test_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/data/ws.definitions.json");
        let store = JsonFileDefinitionStore::open(&path).unwrap();
        store.save(Definition::new("a", "GET", "/a")).unwrap();
        assert!(path.exists());
    }
}
