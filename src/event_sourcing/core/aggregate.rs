use super::event::DomainEvent;

// ============================================================================
// Aggregate Root Pattern - Event Sourcing Core
// ============================================================================
//
// Key Principles:
// 1. State is derived from events (not stored directly)
// 2. Commands are validated against state before any event exists
// 3. Events represent facts that have already happened
// 4. `apply` is the only way state changes
//
// Aggregates are rebuilt from their stream on every command, so no instance
// outlives a single call.
//
// ============================================================================

/// Generic Aggregate trait - all event-sourced aggregates implement this
///
/// Type Parameters:
/// - `Event`: The closed event family for this aggregate
/// - `Command`: The closed command family for this aggregate
/// - `Error`: Business rule violations returned by `decide`
pub trait Aggregate: Default + Send + Sync {
    type Event: DomainEvent;
    type Command;
    type Error;

    /// Fold one committed event into state.
    fn apply(&mut self, event: &Self::Event);

    /// Validate a command against current state and propose new events.
    ///
    /// Never mutates state; the caller persists the events and folds them
    /// back through [`Aggregate::apply`]. `None` models an envelope that
    /// arrived without a command.
    fn decide(&self, command: Option<&Self::Command>) -> Result<Vec<Self::Event>, Self::Error>;

    /// Number of events folded into this instance.
    fn version(&self) -> i64;

    /// Rebuild an aggregate by folding its stream from empty state.
    fn load_from<'a, I>(events: I) -> Self
    where
        I: IntoIterator<Item = &'a Self::Event>,
        Self::Event: 'a,
    {
        let mut aggregate = Self::default();
        for event in events {
            aggregate.apply(event);
        }
        aggregate
    }
}
