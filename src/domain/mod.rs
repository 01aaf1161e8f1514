// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each aggregate has its own subdirectory with its commands, events, errors,
// aggregate implementation, command handler and read models.
//
// This layer is completely separate from the event sourcing infrastructure.
//
// ============================================================================

pub mod catcare;
