// ============================================================================
// CatCare Domain - Business Logic for the Cat Aggregate
// ============================================================================
//
// This module contains ALL CatCare-specific code:
// - Commands (Register, LogWeight)
// - Events (Registered, WeightLogged)
// - Errors (CatCareError, Rejection, CommandError)
// - Aggregate (CatCareAggregate with the business rules)
// - Command Handler (CatCareCommandHandler)
// - Projection (RegisteredCats read model)
//
// The generic event sourcing infrastructure knows nothing about cats.
//
// ============================================================================

pub mod commands;
pub mod events;
pub mod errors;
pub mod aggregate;
pub mod command_handler;
pub mod projection;

// Re-export for convenience
pub use commands::*;
pub use events::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
pub use projection::*;
