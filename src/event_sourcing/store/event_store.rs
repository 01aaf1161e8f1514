use async_trait::async_trait;

use crate::event_sourcing::core::{DomainEvent, EventCodecError, Projection};

// ============================================================================
// Generic Event Store - Repository for Events
// ============================================================================
//
// This is a GENERIC event store contract that works with ANY event type.
//
// Responsibilities:
// 1. Load one stream in version order, together with its version
// 2. Append a batch atomically, guarded by optimistic concurrency
// 3. Replay every persisted event, ordered by stream id then version
//
// A stream's version is the count of its committed events. It starts at 0
// and doubles as the concurrency token passed to `append`.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    #[error("concurrency conflict on stream `{stream_id}`: expected version {expected}, but current is {actual}")]
    ConcurrencyConflict {
        stream_id: String,
        expected: i64,
        actual: i64,
    },

    #[error(transparent)]
    Codec(#[from] EventCodecError),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("invalid stored version {version} on stream `{stream_id}`")]
    InvalidVersion { stream_id: String, version: i64 },
}

impl EventStoreError {
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, EventStoreError::ConcurrencyConflict { .. })
    }
}

/// Events of one stream in commit order, plus the stream's current version.
#[derive(Debug, Clone)]
pub struct LoadedStream<E> {
    pub events: Vec<E>,
    pub version: i64,
}

impl<E> LoadedStream<E> {
    pub fn empty() -> Self {
        Self {
            events: Vec::new(),
            version: 0,
        }
    }
}

#[async_trait]
pub trait EventStore<E: DomainEvent>: Send + Sync {
    /// Load a stream. An unknown stream is empty at version 0.
    async fn load(&self, stream_id: &str) -> Result<LoadedStream<E>, EventStoreError>;

    /// Append `events` if the stream is still at `expected_version`.
    ///
    /// The check and the write are one atomic unit. On success the events
    /// occupy versions `expected_version + 1 ..= expected_version + len` and
    /// the new version is returned. On mismatch nothing is written.
    async fn append(
        &self,
        stream_id: &str,
        expected_version: i64,
        events: &[E],
    ) -> Result<i64, EventStoreError>;

    /// Feed every stored event to `projection`, ordered by stream id then
    /// version. Aborts on the first undecodable record. Returns the number
    /// of events delivered.
    async fn replay(&self, projection: &dyn Projection<E>) -> Result<u64, EventStoreError>;
}
