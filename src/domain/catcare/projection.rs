use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use crate::event_sourcing::core::{DomainEvent, Projection};
use super::events::CatCareEvent;

// ============================================================================
// Registered Cats - Read Model
// ============================================================================
//
// The index is an immutable value behind an `Arc`. A fold clones it (only
// when a reader still holds the old one), applies the event and swaps the
// new value in under the write lock. Readers clone the `Arc` and release the
// lock at once, so a long-lived reader never holds up a writer.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredCat {
    pub entity_id: String,
    pub name: String,
    pub birth_date: String,
}

#[derive(Debug, Clone, Default)]
struct Index {
    cats_by_id: BTreeMap<String, RegisteredCat>,
    last_stream_version: HashMap<String, i64>,
}

impl Index {
    fn fold(&mut self, stream_id: &str, version: i64, event: &CatCareEvent) -> bool {
        let last_version = self.last_stream_version.get(stream_id).copied().unwrap_or(0);
        if version <= last_version {
            return false;
        }

        match event {
            CatCareEvent::Registered(e) => {
                self.cats_by_id.insert(
                    e.entity_id.clone(),
                    RegisteredCat {
                        entity_id: e.entity_id.clone(),
                        name: e.name.clone(),
                        birth_date: e.birth_date.clone(),
                    },
                );
            }
            CatCareEvent::WeightLogged(_) => {}
        }

        self.last_stream_version.insert(stream_id.to_string(), version);
        true
    }
}

#[derive(Debug, Default)]
pub struct RegisteredCats {
    index: RwLock<Arc<Index>>,
}

impl RegisteredCats {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Arc<Index> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every registered cat, ordered by entity id.
    pub fn list(&self) -> Vec<RegisteredCat> {
        self.snapshot().cats_by_id.values().cloned().collect()
    }

    /// Highest version folded for `stream_id`, 0 if none.
    pub fn last_version(&self, stream_id: &str) -> i64 {
        self.snapshot()
            .last_stream_version
            .get(stream_id)
            .copied()
            .unwrap_or(0)
    }
}

impl Projection<CatCareEvent> for RegisteredCats {
    fn apply(&self, stream_id: &str, version: i64, event: &CatCareEvent) {
        let mut guard = self.index.write().unwrap_or_else(PoisonError::into_inner);
        if Arc::make_mut(&mut *guard).fold(stream_id, version, event) {
            tracing::debug!(stream_id, version, kind = event.kind(), "Projected event");
        }
    }
}
