use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::event_sourcing::core::{Aggregate, DomainEvent, Projection};
use crate::event_sourcing::store::EventStore;
use crate::metrics::Metrics;
use crate::utils::retry::{retry_on_transient, IsTransient, RetryConfig};

use super::aggregate::CatCareAggregate;
use super::commands::CatCareCommand;
use super::errors::{CommandError, Rejection};
use super::events::CatCareEvent;

/// One initial attempt plus exactly one retry for unpinned calls.
pub const MAX_ATTEMPTS: u32 = 2;

// ============================================================================
// CatCare Command Handler
// ============================================================================
//
// Orchestrates: Envelope → Load → Aggregate → Decide → Append → Result
//
// Conflict handling:
// - unpinned (no expected_version): decide against the latest state and
//   retry once from a fresh load on contention
// - pinned: strict compare-and-swap, a conflict surfaces immediately
//
// Rejections are a normal outcome carried in `CommandResult`. Only
// infrastructure failures come back as `CommandError`.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub aggregate_id: String,
    pub command: Option<CatCareCommand>,
    pub expected_version: Option<i64>,
}

impl CommandEnvelope {
    pub fn new(aggregate_id: impl Into<String>, command: CatCareCommand) -> Self {
        Self {
            aggregate_id: aggregate_id.into(),
            command: Some(command),
            expected_version: None,
        }
    }

    /// Pin the version the caller observed. The append must match it exactly.
    pub fn with_expected_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub ok: bool,
    pub new_version: i64,
    pub events: Vec<CatCareEvent>,
    pub rejection: Option<Rejection>,
}

impl CommandResult {
    fn accepted(new_version: i64, events: Vec<CatCareEvent>) -> Self {
        Self {
            ok: true,
            new_version,
            events,
            rejection: None,
        }
    }

    fn rejected(current_version: i64, rejection: Rejection) -> Self {
        Self {
            ok: false,
            new_version: current_version,
            events: Vec::new(),
            rejection: Some(rejection),
        }
    }
}

impl IsTransient for CommandError {
    fn is_transient(&self) -> bool {
        self.is_concurrency_conflict()
    }
}

pub struct CatCareCommandHandler<S: EventStore<CatCareEvent>> {
    store: Arc<S>,
    metrics: Arc<Metrics>,
    projection: Option<Arc<dyn Projection<CatCareEvent>>>,
}

impl<S: EventStore<CatCareEvent>> CatCareCommandHandler<S> {
    pub fn new(store: Arc<S>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            metrics,
            projection: None,
        }
    }

    /// Fold every committed event into `projection` right after append.
    pub fn with_projection(mut self, projection: Arc<dyn Projection<CatCareEvent>>) -> Self {
        self.projection = Some(projection);
        self
    }

    pub async fn handle_command(&self, envelope: CommandEnvelope) -> Result<CommandResult, CommandError> {
        if envelope.aggregate_id.is_empty() {
            return Err(CommandError::MissingAggregateId);
        }

        let correlation_id = Uuid::now_v7();
        let span = tracing::info_span!(
            "handle_command",
            aggregate_id = %envelope.aggregate_id,
            %correlation_id,
        );

        self.handle_in_span(&envelope).instrument(span).await
    }

    async fn handle_in_span(&self, envelope: &CommandEnvelope) -> Result<CommandResult, CommandError> {
        let started = Instant::now();
        let command_name = envelope
            .command
            .as_ref()
            .map(CatCareCommand::name)
            .unwrap_or("Missing");

        // A pinned caller already committed to a version, so it gets a single attempt.
        let config = match envelope.expected_version {
            Some(_) => RetryConfig::with_max_attempts(1),
            None => RetryConfig::with_max_attempts(MAX_ATTEMPTS),
        };

        let outcome = retry_on_transient(config, move |attempt| {
            if attempt > 1 {
                self.metrics.record_retry_attempt("handle_command", attempt);
            }
            self.attempt(envelope)
        })
        .await
        .into_result();

        let duration = started.elapsed().as_secs_f64();
        match &outcome {
            Ok(result) if result.ok => {
                self.metrics.record_command(command_name, "ok", duration);
                tracing::info!(
                    command = command_name,
                    new_version = result.new_version,
                    event_count = result.events.len(),
                    "Command accepted"
                );
            }
            Ok(result) => {
                self.metrics.record_command(command_name, "rejected", duration);
                if let Some(rejection) = &result.rejection {
                    tracing::info!(command = command_name, rejection = %rejection, "Command rejected");
                }
            }
            Err(error) => {
                let outcome = if error.is_concurrency_conflict() { "conflict" } else { "error" };
                self.metrics.record_command(command_name, outcome, duration);
                tracing::error!(command = command_name, error = %error, "Command failed");
            }
        }

        outcome
    }

    async fn attempt(&self, envelope: &CommandEnvelope) -> Result<CommandResult, CommandError> {
        let stream_id = envelope.aggregate_id.as_str();

        let loaded = self.store.load(stream_id).await?;
        let aggregate = CatCareAggregate::load_from(&loaded.events);

        let events = match aggregate.decide(envelope.command.as_ref()) {
            Ok(events) => events,
            Err(error) => return Ok(CommandResult::rejected(loaded.version, error.into())),
        };

        let expected_version = envelope.expected_version.unwrap_or(loaded.version);

        let new_version = match self.store.append(stream_id, expected_version, &events).await {
            Ok(version) => version,
            Err(error) => {
                if error.is_concurrency_conflict() {
                    self.metrics.record_conflict(envelope.expected_version.is_some());
                }
                return Err(error.into());
            }
        };

        for (offset, event) in events.iter().enumerate() {
            self.metrics.record_appended(event.kind());
            if let Some(projection) = &self.projection {
                projection.apply(stream_id, expected_version + offset as i64 + 1, event);
            }
        }

        Ok(CommandResult::accepted(new_version, events))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catcare::{RegisteredCats, RejectionCode};
    use crate::event_sourcing::core::EventCodecError;
    use crate::event_sourcing::store::{EventStoreError, InMemoryEventStore, LoadedStream};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn register(command_id: &str, name: &str) -> CatCareCommand {
        CatCareCommand::Register {
            command_id: command_id.to_string(),
            name: name.to_string(),
            birth_date: "2023-01-01".to_string(),
        }
    }

    fn log_weight(command_id: &str, grams: i32) -> CatCareCommand {
        CatCareCommand::LogWeight {
            command_id: command_id.to_string(),
            at: "2026-02-14T10:00:00Z".to_string(),
            grams,
            notes: "after breakfast".to_string(),
        }
    }

    fn handler() -> (
        Arc<InMemoryEventStore<CatCareEvent>>,
        CatCareCommandHandler<InMemoryEventStore<CatCareEvent>>,
    ) {
        let store = Arc::new(InMemoryEventStore::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        (store.clone(), CatCareCommandHandler::new(store, metrics))
    }

    /// Lets another writer slip in one event before each of the first
    /// `conflicts` appends, as a racing process would.
    struct RacingStore {
        inner: InMemoryEventStore<CatCareEvent>,
        conflicts: AtomicU32,
        appends: AtomicU32,
    }

    impl RacingStore {
        fn new(conflicts: u32) -> Self {
            Self {
                inner: InMemoryEventStore::new(),
                conflicts: AtomicU32::new(conflicts),
                appends: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl EventStore<CatCareEvent> for RacingStore {
        async fn load(&self, stream_id: &str) -> Result<LoadedStream<CatCareEvent>, EventStoreError> {
            self.inner.load(stream_id).await
        }

        async fn append(
            &self,
            stream_id: &str,
            expected_version: i64,
            events: &[CatCareEvent],
        ) -> Result<i64, EventStoreError> {
            let call = self.appends.fetch_add(1, Ordering::SeqCst);
            if self.conflicts.load(Ordering::SeqCst) > 0 {
                self.conflicts.fetch_sub(1, Ordering::SeqCst);
                let current = self.inner.load(stream_id).await?.version;
                let racer = format!("racer-{call}");
                let racing = CatCareAggregate::load_from(&self.inner.load(stream_id).await?.events)
                    .decide(Some(&log_weight(&racer, 4000)))
                    .unwrap();
                self.inner.append(stream_id, current, &racing).await?;
            }
            self.inner.append(stream_id, expected_version, events).await
        }

        async fn replay(&self, projection: &dyn Projection<CatCareEvent>) -> Result<u64, EventStoreError> {
            self.inner.replay(projection).await
        }
    }

    /// Every load fails the way a stream holding an unknown event kind does.
    #[derive(Default)]
    struct UndecodableStore {
        loads: AtomicU32,
        appends: AtomicU32,
    }

    #[async_trait]
    impl EventStore<CatCareEvent> for UndecodableStore {
        async fn load(&self, _stream_id: &str) -> Result<LoadedStream<CatCareEvent>, EventStoreError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Err(EventCodecError::UnknownKind("CatAdopted".to_string()).into())
        }

        async fn append(
            &self,
            _stream_id: &str,
            _expected_version: i64,
            _events: &[CatCareEvent],
        ) -> Result<i64, EventStoreError> {
            self.appends.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }

        async fn replay(&self, _projection: &dyn Projection<CatCareEvent>) -> Result<u64, EventStoreError> {
            Ok(0)
        }
    }

    async fn registered_racing_store(conflicts: u32) -> (Arc<RacingStore>, CatCareCommandHandler<RacingStore>, Arc<Metrics>) {
        let store = Arc::new(RacingStore::new(0));
        let metrics = Arc::new(Metrics::new().unwrap());
        let handler = CatCareCommandHandler::new(store.clone(), metrics.clone());
        handler
            .handle_command(CommandEnvelope::new("cat-1", register("cmd-1", "Miso")))
            .await
            .unwrap();
        store.conflicts.store(conflicts, Ordering::SeqCst);
        (store, handler, metrics)
    }

    #[tokio::test]
    async fn test_register_then_log_weight() {
        let (_store, handler) = handler();

        let result = handler
            .handle_command(CommandEnvelope::new("cat-1", register("cmd-1", "Miso")))
            .await
            .unwrap();
        assert!(result.ok);
        assert_eq!(result.new_version, 1);
        match &result.events[..] {
            [CatCareEvent::Registered(e)] => assert_eq!(e.entity_id, "entity-cmd-1"),
            other => panic!("unexpected events {other:?}"),
        }

        let result = handler
            .handle_command(CommandEnvelope::new("cat-1", log_weight("cmd-2", 4200)))
            .await
            .unwrap();
        assert!(result.ok);
        assert_eq!(result.new_version, 2);
        match &result.events[..] {
            [CatCareEvent::WeightLogged(e)] => {
                assert_eq!(e.entry_id, "entry-cmd-2");
                assert_eq!(e.grams, 4200);
            }
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_log_weight_before_register_is_rejected() {
        let (store, handler) = handler();

        let result = handler
            .handle_command(CommandEnvelope::new("cat-1", log_weight("cmd-1", 4200)))
            .await
            .unwrap();
        assert!(!result.ok);
        assert_eq!(result.new_version, 0);
        assert!(result.events.is_empty());
        assert_eq!(result.rejection.unwrap().code, RejectionCode::NotRegistered);
        assert_eq!(store.load("cat-1").await.unwrap().version, 0);
    }

    #[tokio::test]
    async fn test_second_register_reports_current_version() {
        let (_store, handler) = handler();
        handler
            .handle_command(CommandEnvelope::new("cat-1", register("cmd-1", "Miso")))
            .await
            .unwrap();

        let result = handler
            .handle_command(CommandEnvelope::new("cat-1", register("cmd-2", "Taro")))
            .await
            .unwrap();
        assert!(!result.ok);
        assert_eq!(result.new_version, 1);
        assert_eq!(result.rejection.unwrap().code, RejectionCode::AlreadyRegistered);
    }

    #[tokio::test]
    async fn test_duplicate_command_id_is_rejected() {
        let (store, handler) = handler();
        handler
            .handle_command(CommandEnvelope::new("cat-1", register("cmd-1", "Miso")))
            .await
            .unwrap();
        handler
            .handle_command(CommandEnvelope::new("cat-1", log_weight("cmd-2", 4200)))
            .await
            .unwrap();

        let result = handler
            .handle_command(CommandEnvelope::new("cat-1", log_weight("cmd-2", 4300)))
            .await
            .unwrap();
        let rejection = result.rejection.unwrap();
        assert_eq!(rejection.code, RejectionCode::DuplicateCommand);
        assert_eq!(rejection.field.as_deref(), Some("command_id"));
        assert_eq!(store.load("cat-1").await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_missing_aggregate_id_is_an_error() {
        let (_store, handler) = handler();
        let err = handler
            .handle_command(CommandEnvelope::new("", register("cmd-1", "Miso")))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::MissingAggregateId));
    }

    #[tokio::test]
    async fn test_whitespace_aggregate_id_is_an_ordinary_stream() {
        let (store, handler) = handler();
        let result = handler
            .handle_command(CommandEnvelope::new(" ", register("cmd-1", "Miso")))
            .await
            .unwrap();
        assert!(result.ok);
        assert_eq!(store.load(" ").await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_undecodable_stream_is_an_error_not_a_rejection() {
        let store = Arc::new(UndecodableStore::default());
        let metrics = Arc::new(Metrics::new().unwrap());
        let handler = CatCareCommandHandler::new(store.clone(), metrics.clone());

        let err = handler
            .handle_command(CommandEnvelope::new("cat-1", log_weight("cmd-2", 4200)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CommandError::Store(EventStoreError::Codec(EventCodecError::UnknownKind(ref kind))) if kind == "CatAdopted"
        ));
        assert!(!err.is_concurrency_conflict());
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
        assert_eq!(store.appends.load(Ordering::SeqCst), 0);
        assert_eq!(metrics.commands_total.with_label_values(&["LogWeight", "error"]).get(), 1);
    }

    #[tokio::test]
    async fn test_missing_command_is_rejected() {
        let (_store, handler) = handler();
        let envelope = CommandEnvelope {
            aggregate_id: "cat-1".to_string(),
            command: None,
            expected_version: None,
        };

        let result = handler.handle_command(envelope).await.unwrap();
        assert!(!result.ok);
        assert_eq!(result.rejection.unwrap().code, RejectionCode::InvalidCommand);
    }

    #[tokio::test]
    async fn test_pinned_stale_version_conflicts_without_retry() {
        let (store, handler) = handler();
        handler
            .handle_command(CommandEnvelope::new("cat-1", register("cmd-1", "Miso")))
            .await
            .unwrap();

        let err = handler
            .handle_command(CommandEnvelope::new("cat-1", log_weight("cmd-2", 4200)).with_expected_version(0))
            .await
            .unwrap_err();
        assert!(err.is_concurrency_conflict());
        assert_eq!(store.load("cat-1").await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_pinned_matching_version_succeeds() {
        let (_store, handler) = handler();
        handler
            .handle_command(CommandEnvelope::new("cat-1", register("cmd-1", "Miso")))
            .await
            .unwrap();

        let result = handler
            .handle_command(CommandEnvelope::new("cat-1", log_weight("cmd-2", 4200)).with_expected_version(1))
            .await
            .unwrap();
        assert!(result.ok);
        assert_eq!(result.new_version, 2);
    }

    #[tokio::test]
    async fn test_unpinned_conflict_retries_once_against_fresh_state() {
        let (store, handler, metrics) = registered_racing_store(1).await;

        let result = handler
            .handle_command(CommandEnvelope::new("cat-1", log_weight("cmd-2", 4200)))
            .await
            .unwrap();

        // register, racer, ours
        assert!(result.ok);
        assert_eq!(result.new_version, 3);
        assert_eq!(store.load("cat-1").await.unwrap().version, 3);
        assert_eq!(
            metrics.retry_attempts_total.with_label_values(&["handle_command", "2"]).get(),
            1
        );
        assert_eq!(metrics.concurrency_conflicts.with_label_values(&["false"]).get(), 1);
    }

    #[tokio::test]
    async fn test_unpinned_conflict_surfaces_after_budget() {
        let (store, handler, _metrics) = registered_racing_store(2).await;

        let err = handler
            .handle_command(CommandEnvelope::new("cat-1", log_weight("cmd-2", 4200)))
            .await
            .unwrap_err();

        assert!(err.is_concurrency_conflict());
        // register plus one racer per attempt, nothing of ours
        assert_eq!(store.appends.load(Ordering::SeqCst), 1 + MAX_ATTEMPTS);
        assert_eq!(store.load("cat-1").await.unwrap().version, 1 + MAX_ATTEMPTS as i64);
    }

    #[tokio::test]
    async fn test_pinned_conflict_is_not_retried_even_with_budget() {
        let (store, handler, metrics) = registered_racing_store(1).await;

        let err = handler
            .handle_command(CommandEnvelope::new("cat-1", log_weight("cmd-2", 4200)).with_expected_version(1))
            .await
            .unwrap_err();

        assert!(err.is_concurrency_conflict());
        assert_eq!(store.appends.load(Ordering::SeqCst), 2);
        assert_eq!(metrics.concurrency_conflicts.with_label_values(&["true"]).get(), 1);
    }

    #[tokio::test]
    async fn test_live_projection_sees_committed_versions() {
        let store = Arc::new(InMemoryEventStore::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let cats = Arc::new(RegisteredCats::new());
        let handler = CatCareCommandHandler::new(store.clone(), metrics).with_projection(cats.clone());

        handler
            .handle_command(CommandEnvelope::new("cat-1", register("cmd-1", "Miso")))
            .await
            .unwrap();
        handler
            .handle_command(CommandEnvelope::new("cat-1", log_weight("cmd-2", 4200)))
            .await
            .unwrap();

        assert_eq!(cats.last_version("cat-1"), 2);
        let listed = cats.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].entity_id, "entity-cmd-1");

        // A later replay re-delivers the same versions and changes nothing.
        store.replay(&*cats).await.unwrap();
        assert_eq!(cats.list(), listed);
    }
}
