//! Per-workspace route table.
//!
//! The table publishes an immutable snapshot behind an `Arc`. Readers clone the
//! `Arc` and match without holding any lock; writers serialize on a mutex,
//! compile outside the snapshot lock and swap the pointer in one step. A failed
//! compile never touches the published snapshot.

use super::matcher::RouteMatcher;
use super::types::RouteError;
use crate::definition::Definition;
use crate::request::MockRequest;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Compiled route for one definition. Replaced wholesale on rebuild.
#[derive(Debug)]
pub struct RouteEntry {
    definition: Arc<Definition>,
    matcher: RouteMatcher,
    /// Registration order; kept across rebuilds of the same id
    seq: u64,
}

impl RouteEntry {
    pub fn definition(&self) -> &Arc<Definition> {
        &self.definition
    }

    pub fn matcher(&self) -> &RouteMatcher {
        &self.matcher
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Immutable view of the table; entries sorted in match order.
#[derive(Debug, Default)]
struct RouteSnapshot {
    entries: Vec<Arc<RouteEntry>>,
}

impl RouteSnapshot {
    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.definition.id == id)
    }

    /// Most specific first, then registration order.
    fn sorted(mut entries: Vec<Arc<RouteEntry>>) -> Self {
        entries.sort_by(|a, b| {
            b.matcher
                .specificity()
                .cmp(&a.matcher.specificity())
                .then(a.seq.cmp(&b.seq))
        });
        Self { entries }
    }
}

/// Maps definition id to compiled matcher for one workspace.
#[derive(Debug)]
pub struct RouteTable {
    snapshot: RwLock<Arc<RouteSnapshot>>,
    /// Serializes writers; holds the next registration sequence
    writer: Mutex<u64>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(RouteSnapshot::default())),
            writer: Mutex::new(0),
        }
    }

    fn current(&self) -> Arc<RouteSnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// Compile `definition` and replace any entry with the same id.
    ///
    /// On error the previous entry, if any, keeps serving requests.
    pub fn rebuild(&self, definition: Definition) -> Result<(), RouteError> {
        let matcher = match RouteMatcher::compile(&definition) {
            Ok(m) => m,
            Err(e) => {
                warn!(
                    "Rejected route {} {} {}: {}",
                    definition.id, definition.method, definition.path, e
                );
                return Err(e);
            }
        };

        let mut next_seq = self.writer.lock();
        let current = self.current();
        let seq = match current.position(&definition.id) {
            Some(i) => current.entries[i].seq,
            None => {
                let seq = *next_seq;
                *next_seq += 1;
                seq
            }
        };

        debug!(
            "Rebuilt route {} {} {}",
            definition.id, definition.method, definition.path
        );
        let entry = Arc::new(RouteEntry {
            definition: Arc::new(definition),
            matcher,
            seq,
        });
        let mut entries: Vec<_> = current
            .entries
            .iter()
            .filter(|e| e.definition.id != entry.definition.id)
            .cloned()
            .collect();
        entries.push(entry);
        *self.snapshot.write() = Arc::new(RouteSnapshot::sorted(entries));
        Ok(())
    }

    /// Drop the entry for `id`. Removing an absent id is a no-op.
    ///
    /// Returns whether an entry was removed.
    pub fn remove(&self, id: &str) -> bool {
        let _guard = self.writer.lock();
        let current = self.current();
        if current.position(id).is_none() {
            return false;
        }
        let entries = current
            .entries
            .iter()
            .filter(|e| e.definition.id != id)
            .cloned()
            .collect();
        *self.snapshot.write() = Arc::new(RouteSnapshot { entries });
        debug!("Removed route {}", id);
        true
    }

    /// Bulk rebuild at startup. Invalid definitions are logged and skipped.
    ///
    /// Returns the number of definitions loaded.
    pub fn load(&self, definitions: impl IntoIterator<Item = Definition>) -> usize {
        let mut loaded = 0;
        for definition in definitions {
            info!(
                "Load route {} {}: {} {}",
                definition.id, definition.name, definition.method, definition.path
            );
            if self.rebuild(definition).is_ok() {
                loaded += 1;
            }
        }
        loaded
    }

    /// The single definition accepting `request`, if any.
    pub fn find(&self, request: &MockRequest) -> Option<Arc<Definition>> {
        self.current()
            .entries
            .iter()
            .find(|e| e.matcher.matches(request))
            .map(|e| Arc::clone(&e.definition))
    }

    /// Current entry for `id`.
    pub fn entry(&self, id: &str) -> Option<Arc<RouteEntry>> {
        let current = self.current();
        current.position(id).map(|i| Arc::clone(&current.entries[i]))
    }

    pub fn get(&self, id: &str) -> Option<Arc<Definition>> {
        self.entry(id).map(|e| Arc::clone(&e.definition))
    }

    /// Re-match the current entry for `id` against `request`.
    ///
    /// `None` when the id is absent or its path no longer matches.
    pub fn variables(&self, id: &str, request: &MockRequest) -> Option<HashMap<String, String>> {
        self.entry(id)?.matcher.variables(request)
    }

    /// Ids in match order.
    pub fn ids(&self) -> Vec<String> {
        self.current()
            .entries
            .iter()
            .map(|e| e.definition.id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.current().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
