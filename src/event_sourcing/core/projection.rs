use super::event::DomainEvent;

// ============================================================================
// Projection Contract - Read Models Folded From the Log
// ============================================================================
//
// A projection receives `(stream_id, version, event)` triples, either from a
// full replay at startup or from the command handler right after a commit.
// Delivery may repeat, so implementations must ignore versions at or below
// their per-stream watermark.
//
// ============================================================================

pub trait Projection<E: DomainEvent>: Send + Sync {
    /// Fold one committed event. Must be idempotent per `(stream_id, version)`.
    fn apply(&self, stream_id: &str, version: i64, event: &E);
}
