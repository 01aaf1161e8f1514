use async_trait::async_trait;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::event_store::{EventStore, EventStoreError, LoadedStream};
use crate::event_sourcing::core::{DomainEvent, Projection};

// ============================================================================
// In-Memory Event Store
// ============================================================================
//
// Keeps encoded records per stream, exactly as a durable store would, so the
// same codec path runs in tests and local tooling.
//
// Locking:
// - the outer RwLock only guards the stream map (lookups and inserts)
// - each stream has its own Mutex, held for the whole check-and-write
//
// Appends to different streams therefore never wait on each other.
//
// ============================================================================

#[derive(Debug, Clone)]
struct StoredRecord {
    kind: &'static str,
    payload: String,
}

#[derive(Debug, Default)]
struct StreamLog {
    records: Vec<StoredRecord>,
}

impl StreamLog {
    fn version(&self) -> i64 {
        self.records.len() as i64
    }
}

pub struct InMemoryEventStore<E: DomainEvent> {
    streams: RwLock<BTreeMap<String, Arc<Mutex<StreamLog>>>>,
    _phantom: PhantomData<E>,
}

impl<E: DomainEvent> InMemoryEventStore<E> {
    pub fn new() -> Self {
        Self {
            streams: RwLock::new(BTreeMap::new()),
            _phantom: PhantomData,
        }
    }

    fn existing_stream(&self, stream_id: &str) -> Option<Arc<Mutex<StreamLog>>> {
        self.streams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(stream_id)
            .cloned()
    }

    fn stream_or_insert(&self, stream_id: &str) -> Arc<Mutex<StreamLog>> {
        if let Some(stream) = self.existing_stream(stream_id) {
            return stream;
        }
        self.streams
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(stream_id.to_string())
            .or_default()
            .clone()
    }
}

impl<E: DomainEvent> Default for InMemoryEventStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_all<E: DomainEvent>(records: &[StoredRecord]) -> Result<Vec<E>, EventStoreError> {
    records
        .iter()
        .map(|record| E::decode(record.kind, &record.payload).map_err(EventStoreError::from))
        .collect()
}

#[async_trait]
impl<E: DomainEvent> EventStore<E> for InMemoryEventStore<E> {
    async fn load(&self, stream_id: &str) -> Result<LoadedStream<E>, EventStoreError> {
        let Some(stream) = self.existing_stream(stream_id) else {
            return Ok(LoadedStream::empty());
        };

        let (records, version) = {
            let log = stream.lock().unwrap_or_else(PoisonError::into_inner);
            (log.records.clone(), log.version())
        };

        let events = decode_all(&records)?;
        tracing::debug!(stream_id, version, "Loaded stream from memory");
        Ok(LoadedStream { events, version })
    }

    async fn append(
        &self,
        stream_id: &str,
        expected_version: i64,
        events: &[E],
    ) -> Result<i64, EventStoreError> {
        // Encode before taking the lock so a codec failure writes nothing.
        let staged = events
            .iter()
            .map(|event| {
                Ok(StoredRecord {
                    kind: event.kind(),
                    payload: event.encode()?,
                })
            })
            .collect::<Result<Vec<_>, EventStoreError>>()?;

        let stream = self.stream_or_insert(stream_id);
        let mut log = stream.lock().unwrap_or_else(PoisonError::into_inner);

        let current_version = log.version();
        if current_version != expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                stream_id: stream_id.to_string(),
                expected: expected_version,
                actual: current_version,
            });
        }

        log.records.extend(staged);
        let new_version = log.version();

        tracing::info!(
            stream_id,
            new_version,
            event_count = events.len(),
            "Appended events to in-memory store"
        );

        Ok(new_version)
    }

    async fn replay(&self, projection: &dyn Projection<E>) -> Result<u64, EventStoreError> {
        let streams: Vec<(String, Arc<Mutex<StreamLog>>)> = self
            .streams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, stream)| (id.clone(), stream.clone()))
            .collect();

        let mut delivered = 0u64;
        for (stream_id, stream) in streams {
            let records = stream
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .records
                .clone();

            for (index, record) in records.iter().enumerate() {
                let event = E::decode(record.kind, &record.payload)?;
                projection.apply(&stream_id, index as i64 + 1, &event);
                delivered += 1;
            }
        }

        tracing::info!(events = delivered, "Replayed in-memory store");
        Ok(delivered)
    }
}
