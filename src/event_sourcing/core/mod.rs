// ============================================================================
// Event Sourcing Core - Generic Infrastructure Abstractions
// ============================================================================
//
// This module contains GENERIC, reusable event sourcing infrastructure
// that works with ANY domain aggregate.
//
// Key Principles:
// - No domain-specific code (no CatCare, no weights, no names)
// - Generic over aggregate and event types
// - Reusable across all aggregates
//
// ============================================================================

pub mod aggregate;
pub mod event;
pub mod projection;

// Re-export core types for convenience
pub use aggregate::Aggregate;
pub use event::{decode_payload, encode_payload, DomainEvent, EventCodecError};
pub use projection::Projection;
