use async_trait::async_trait;
use chrono::Utc;
use futures_util::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::marker::PhantomData;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use super::event_store::{EventStore, EventStoreError, LoadedStream};
use crate::event_sourcing::core::{DomainEvent, Projection};

// ============================================================================
// SQLite Event Store
// ============================================================================
//
// Tables:
// - streams: one row per stream holding its committed version
// - events:  append-only, primary key (stream_id, version)
//
// Append opens its transaction with BEGIN IMMEDIATE, so the write lock is held
// before the stream version is read. Competing writers, in this pool or in
// another process, wait on the busy timeout and then see the advanced version,
// which surfaces as a concurrency conflict. Inside the transaction every event
// is inserted and the stream row bumped; a dropped transaction rolls back, so
// a batch is either fully committed or absent.
//
// ============================================================================

/// How long a writer waits for another writer's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS streams (
    stream_id TEXT PRIMARY KEY,
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS events (
    stream_id TEXT NOT NULL,
    version INTEGER NOT NULL,
    event_type TEXT NOT NULL,
    payload TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    PRIMARY KEY (stream_id, version)
);
";

pub struct SqliteEventStore<E: DomainEvent> {
    pool: SqlitePool,
    _phantom: PhantomData<E>,
}

impl<E: DomainEvent> SqliteEventStore<E> {
    /// Open (creating if needed) the database at `database_url` and ensure
    /// the schema exists.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, EventStoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);

        if let Some(parent) = database_file(database_url).and_then(Path::parent) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
            }
        }

        // Every connection to `:memory:` is a separate database.
        let max_connections = if is_in_memory(database_url) {
            1
        } else {
            max_connections.max(1)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA).execute(&pool).await?;

        tracing::info!(database_url, max_connections, "Opened SQLite event store");

        Ok(Self {
            pool,
            _phantom: PhantomData,
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn current_version<'c, X>(executor: X, stream_id: &str) -> Result<i64, EventStoreError>
    where
        X: sqlx::SqliteExecutor<'c>,
    {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM streams WHERE stream_id = ?")
                .bind(stream_id)
                .fetch_optional(executor)
                .await?;
        Ok(version.unwrap_or(0))
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

fn database_file(database_url: &str) -> Option<&Path> {
    if is_in_memory(database_url) {
        return None;
    }
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    let path = path.split('?').next().unwrap_or(path);
    Some(Path::new(path))
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl<E: DomainEvent> EventStore<E> for SqliteEventStore<E> {
    async fn load(&self, stream_id: &str) -> Result<LoadedStream<E>, EventStoreError> {
        let mut tx = self.pool.begin().await?;

        let version = Self::current_version(&mut *tx, stream_id).await?;
        let rows: Vec<(i64, String, String)> = sqlx::query_as(
            "SELECT version, event_type, payload
             FROM events
             WHERE stream_id = ?
             ORDER BY version ASC",
        )
        .bind(stream_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut events = Vec::with_capacity(rows.len());
        for (row_version, event_type, payload) in rows {
            tracing::debug!(stream_id, version = row_version, event_type = %event_type, "Loaded event");
            events.push(E::decode(&event_type, &payload)?);
        }

        if events.len() as i64 != version {
            return Err(EventStoreError::InvalidVersion {
                stream_id: stream_id.to_string(),
                version,
            });
        }

        Ok(LoadedStream { events, version })
    }

    async fn append(
        &self,
        stream_id: &str,
        expected_version: i64,
        events: &[E],
    ) -> Result<i64, EventStoreError> {
        let mut staged = Vec::with_capacity(events.len());
        for event in events {
            staged.push((event.kind(), event.encode()?));
        }

        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let current_version = Self::current_version(&mut *tx, stream_id).await?;
        if current_version != expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                stream_id: stream_id.to_string(),
                expected: expected_version,
                actual: current_version,
            });
        }

        if staged.is_empty() {
            tx.commit().await?;
            return Ok(current_version);
        }

        let recorded_at = Utc::now();
        let mut new_version = current_version;

        for (kind, payload) in &staged {
            new_version += 1;
            let inserted = sqlx::query(
                "INSERT INTO events (stream_id, version, event_type, payload, recorded_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(stream_id)
            .bind(new_version)
            .bind(*kind)
            .bind(payload)
            .bind(recorded_at)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(_) => {}
                Err(err) if is_unique_violation(&err) => {
                    return Err(EventStoreError::ConcurrencyConflict {
                        stream_id: stream_id.to_string(),
                        expected: expected_version,
                        actual: new_version,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }

        sqlx::query(
            "INSERT INTO streams (stream_id, version) VALUES (?, ?)
             ON CONFLICT(stream_id) DO UPDATE SET version = excluded.version",
        )
        .bind(stream_id)
        .bind(new_version)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            stream_id,
            new_version,
            event_count = staged.len(),
            "Appended events to SQLite store"
        );

        Ok(new_version)
    }

    async fn replay(&self, projection: &dyn Projection<E>) -> Result<u64, EventStoreError> {
        let mut rows = sqlx::query_as::<_, (String, i64, String, String)>(
            "SELECT stream_id, version, event_type, payload
             FROM events
             ORDER BY stream_id ASC, version ASC",
        )
        .fetch(&self.pool);

        let mut delivered = 0u64;
        while let Some((stream_id, version, event_type, payload)) = rows.try_next().await? {
            let event = E::decode(&event_type, &payload)?;
            projection.apply(&stream_id, version, &event);
            delivered += 1;
        }

        tracing::info!(events = delivered, "Replayed SQLite event store");
        Ok(delivered)
    }
}
