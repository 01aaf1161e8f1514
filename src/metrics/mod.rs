use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Command handling outcomes and latency
// - Events appended per kind
// - Concurrency conflicts and retry attempts
// - Events delivered by startup replay
//
// `render` produces the Prometheus text exposition format.
// ============================================================================

/// Central metrics registry for the engine
pub struct Metrics {
    registry: Registry,

    // Command Handling Metrics
    pub commands_total: IntCounterVec,
    pub command_duration: HistogramVec,
    pub events_appended: IntCounterVec,

    // Concurrency Metrics
    pub concurrency_conflicts: IntCounterVec,
    pub retry_attempts_total: IntCounterVec,

    // Replay Metrics
    pub replayed_events: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let commands_total = IntCounterVec::new(
            Opts::new("catcare_commands_total", "Commands handled by outcome"),
            &["command", "outcome"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;

        let command_duration = HistogramVec::new(
            HistogramOpts::new("catcare_command_duration_seconds", "Command handling duration")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["command"],
        )?;
        registry.register(Box::new(command_duration.clone()))?;

        let events_appended = IntCounterVec::new(
            Opts::new("catcare_events_appended_total", "Events committed to the event store"),
            &["event_kind"],
        )?;
        registry.register(Box::new(events_appended.clone()))?;

        let concurrency_conflicts = IntCounterVec::new(
            Opts::new("catcare_concurrency_conflicts_total", "Optimistic concurrency conflicts on append"),
            &["pinned"],
        )?;
        registry.register(Box::new(concurrency_conflicts.clone()))?;

        let retry_attempts_total = IntCounterVec::new(
            Opts::new("catcare_retry_attempts_total", "Retry attempts after a conflict"),
            &["operation", "attempt"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        let replayed_events = IntCounter::new(
            "catcare_replayed_events_total",
            "Events delivered to projections by replay",
        )?;
        registry.register(Box::new(replayed_events.clone()))?;

        Ok(Self {
            registry,
            commands_total,
            command_duration,
            events_appended,
            concurrency_conflicts,
            retry_attempts_total,
            replayed_events,
        })
    }

    /// Helper to record a handled command
    pub fn record_command(&self, command: &str, outcome: &str, duration_secs: f64) {
        self.commands_total.with_label_values(&[command, outcome]).inc();
        self.command_duration.with_label_values(&[command]).observe(duration_secs);
    }

    pub fn record_appended(&self, event_kind: &str) {
        self.events_appended.with_label_values(&[event_kind]).inc();
    }

    pub fn record_conflict(&self, pinned: bool) {
        let pinned = if pinned { "true" } else { "false" };
        self.concurrency_conflicts.with_label_values(&[pinned]).inc();
    }

    /// Helper to record retry attempt
    pub fn record_retry_attempt(&self, operation: &str, attempt: u32) {
        let attempt = attempt.to_string();
        self.retry_attempts_total
            .with_label_values(&[operation, attempt.as_str()])
            .inc();
    }

    pub fn record_replayed(&self, count: u64) {
        self.replayed_events.inc_by(count);
    }

    /// Encode every registered metric in the text exposition format.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
