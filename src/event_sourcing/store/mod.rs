// ============================================================================
// Event Sourcing Store - Generic Persistence Layer
// ============================================================================
//
// This module contains GENERIC persistence infrastructure for event sourcing.
// All components work with ANY event type implementing `DomainEvent`.
//
// - `EventStore`: the load / append / replay contract
// - `InMemoryEventStore`: tests and local tooling
// - `SqliteEventStore`: durable store backed by sqlx + SQLite
//
// ============================================================================

pub mod event_store;
pub mod in_memory;
pub mod sqlite;

pub use event_store::{EventStore, EventStoreError, LoadedStream};
pub use in_memory::InMemoryEventStore;
pub use sqlite::SqliteEventStore;
