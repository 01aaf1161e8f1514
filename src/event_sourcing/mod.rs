// ============================================================================
// Event Sourcing Infrastructure
// ============================================================================
//
// `core` holds the contracts (aggregate, event codec, projection) and
// `store` the persistence behind them. Nothing here knows about cats;
// domain code lives in src/domain/.
//
// ============================================================================

pub mod core;
pub mod store;

pub use self::core::*;
pub use store::*;
