//! Workspace: one store, one route table and one listener address.
//!
//! Every mutation goes to the store first and is mirrored into the route table
//! before the call returns, so routing never lags an acknowledged write. A
//! workspace-wide write guard spans both steps so concurrent writers of the
//! same id cannot leave the store and the table disagreeing.

use crate::config::WorkspaceConfig;
use crate::definition::{group_by_collection, Collection, Definition};
use crate::dispatch::{self, Dispatcher};
use crate::route::{RouteError, RouteTable};
use crate::store::{DefinitionStore, StoreError};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// Persisted, but the route could not be compiled; the previous route stays live.
    #[error("definition {id} saved but not routable: {source}")]
    Structural {
        id: String,
        #[source]
        source: RouteError,
    },
    #[error("definition {0} not found")]
    NotFound(String),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

pub struct Workspace {
    config: WorkspaceConfig,
    store: Arc<dyn DefinitionStore>,
    routes: Arc<RouteTable>,
    /// Held across a store mutation and the matching route update
    writes: Mutex<()>,
}

impl Workspace {
    pub fn new(config: WorkspaceConfig, store: Arc<dyn DefinitionStore>) -> Self {
        Self {
            config,
            store,
            routes: Arc::new(RouteTable::new()),
            writes: Mutex::new(()),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    /// Prime the route table from the store; returns the number of routes.
    pub fn load(&self) -> Result<usize, WorkspaceError> {
        let _guard = self.writes.lock();
        let definitions = self.store.list()?;
        let total = definitions.len();
        let loaded = self.routes.load(definitions);
        info!(
            workspace = %self.config.id,
            "Loaded {}/{} routes",
            loaded,
            total
        );
        Ok(loaded)
    }

    /// Persist `definition` and rebuild its route; returns its id.
    ///
    /// An empty id is replaced with a fresh v4 UUID.
    pub fn save_definition(&self, mut definition: Definition) -> Result<String, WorkspaceError> {
        if definition.id.is_empty() {
            definition.id = uuid::Uuid::new_v4().to_string();
        }
        let id = definition.id.clone();
        let _guard = self.writes.lock();
        self.store.save(definition.clone())?;
        self.routes
            .rebuild(definition)
            .map_err(|source| WorkspaceError::Structural {
                id: id.clone(),
                source,
            })?;
        Ok(id)
    }

    /// Delete a definition and its route.
    ///
    /// The route is dropped even when the store has no record of the id.
    pub fn remove_definition(&self, id: &str) -> Result<(), WorkspaceError> {
        let _guard = self.writes.lock();
        let existed = self.store.remove(id)?;
        self.routes.remove(id);
        if existed {
            Ok(())
        } else {
            Err(WorkspaceError::NotFound(id.to_string()))
        }
    }

    pub fn definition(&self, id: &str) -> Result<Option<Definition>, WorkspaceError> {
        Ok(self.store.get(id)?)
    }

    pub fn definitions(&self) -> Result<Vec<Definition>, WorkspaceError> {
        Ok(self.store.list()?)
    }

    /// Collections with their member definitions attached.
    pub fn collections(&self) -> Result<Vec<Collection>, WorkspaceError> {
        Ok(group_by_collection(
            self.store.collections()?,
            self.store.list()?,
        ))
    }

    /// Persist a collection; an empty id is replaced with a fresh v4 UUID.
    pub fn save_collection(&self, mut collection: Collection) -> Result<String, WorkspaceError> {
        if collection.id.is_empty() {
            collection.id = uuid::Uuid::new_v4().to_string();
        }
        let id = collection.id.clone();
        self.store.save_collection(collection)?;
        Ok(id)
    }

    pub fn remove_collection(&self, id: &str) -> Result<(), WorkspaceError> {
        if self.store.remove_collection(id)? {
            Ok(())
        } else {
            Err(WorkspaceError::NotFound(id.to_string()))
        }
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.config.id.clone(), Arc::clone(&self.routes))
    }

    /// Bind the configured host; returns the listener and its local address.
    pub async fn bind(&self) -> Result<(TcpListener, SocketAddr), WorkspaceError> {
        let addr = self.config.host;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| WorkspaceError::Bind { addr, source })?;
        let local = listener
            .local_addr()
            .map_err(|source| WorkspaceError::Bind { addr, source })?;
        Ok((listener, local))
    }

    /// Serve mock requests on `listener` until `shutdown` fires.
    pub async fn serve(&self, listener: TcpListener, shutdown: broadcast::Receiver<()>) {
        info!(
            workspace = %self.config.id,
            endpoint = %self.config.endpoint,
            "Mock server listening on {}",
            self.config.host
        );
        dispatch::serve(listener, Arc::new(self.dispatcher()), shutdown).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::MockBody;
    use crate::request::MockRequest;
    use crate::store::InMemoryDefinitionStore;
    use hyper::Method;

    fn workspace(store: InMemoryDefinitionStore) -> Workspace {
        Workspace::new(WorkspaceConfig::default(), Arc::new(store))
    }

    #[test]
    fn test_load_primes_routes_and_skips_invalid() {
        let ws = workspace(InMemoryDefinitionStore::with_definitions([
            Definition::new("a", "GET", "/a"),
            Definition::new("b", "GET", "missing-slash"),
        ]));
        assert_eq!(ws.load().unwrap(), 1);
        assert!(ws.routes().get("a").is_some());
        assert!(ws.routes().get("b").is_none());
    }

    #[test]
    fn test_save_assigns_id_and_routes_immediately() {
        let ws = workspace(InMemoryDefinitionStore::new());
        let mut def = Definition::new("", "GET", "/fresh");
        def.mock_body = Some(MockBody::raw("text", "hi"));

        let id = ws.save_definition(def).unwrap();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        assert_eq!(ws.definition(&id).unwrap().unwrap().id, id);
        let matched = ws
            .routes()
            .find(&MockRequest::get(Method::GET, "/fresh"))
            .unwrap();
        assert_eq!(matched.id, id);
    }

    #[test]
    fn test_structural_error_keeps_previous_route() {
        let ws = workspace(InMemoryDefinitionStore::new());
        ws.save_definition(Definition::new("d", "GET", "/ok")).unwrap();

        let err = ws
            .save_definition(Definition::new("d", "GET", "/bad/{x"))
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::Structural { ref id, .. } if id == "d"));
        assert_eq!(ws.definition("d").unwrap().unwrap().path, "/bad/{x");
        assert!(ws
            .routes()
            .find(&MockRequest::get(Method::GET, "/ok"))
            .is_some());
    }

    #[test]
    fn test_remove_definition() {
        let ws = workspace(InMemoryDefinitionStore::new());
        ws.save_definition(Definition::new("d", "GET", "/x")).unwrap();
        ws.remove_definition("d").unwrap();
        assert!(ws.routes().is_empty());
        assert!(ws.definition("d").unwrap().is_none());
        assert!(matches!(
            ws.remove_definition("d"),
            Err(WorkspaceError::NotFound(_))
        ));
    }

    #[test]
    fn test_concurrent_writes_keep_store_and_routes_in_step() {
        let ws = Arc::new(workspace(InMemoryDefinitionStore::new()));
        let writers: Vec<_> = (0..8)
            .map(|t| {
                let ws = Arc::clone(&ws);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        if (t + i) % 3 == 0 {
                            let _ = ws.remove_definition("d");
                        } else {
                            ws.save_definition(Definition::new("d", "GET", format!("/v/{t}/{i}")))
                                .unwrap();
                        }
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let stored = ws.definition("d").unwrap().map(|d| d.path);
        let routed = ws.routes().get("d").map(|d| d.path.clone());
        assert_eq!(stored, routed);
    }

    #[test]
    fn test_collections_group_definitions() {
        let ws = workspace(InMemoryDefinitionStore::new());
        let cid = ws
            .save_collection(Collection {
                name: "Users".to_string(),
                ..Default::default()
            })
            .unwrap();
        let mut def = Definition::new("d", "GET", "/users");
        def.collect_id = cid.clone();
        ws.save_definition(def).unwrap();
        ws.save_definition(Definition::new("loose", "GET", "/loose"))
            .unwrap();

        let collections = ws.collections().unwrap();
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].id, cid);
        assert_eq!(collections[0].paths.len(), 1);
        assert_eq!(collections[0].paths[0].id, "d");

        ws.remove_collection(&cid).unwrap();
        assert!(ws.collections().unwrap().is_empty());
        assert!(matches!(
            ws.remove_collection(&cid),
            Err(WorkspaceError::NotFound(_))
        ));
    }
}
