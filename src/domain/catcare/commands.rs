use serde::{Deserialize, Serialize};

// ============================================================================
// CatCare Domain Commands
// ============================================================================
//
// Every command carries a caller-assigned `command_id`, unique per aggregate.
// It is the idempotency key and the seed for generated identifiers.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CatCareCommand {
    Register {
        command_id: String,
        name: String,
        birth_date: String,
    },
    LogWeight {
        command_id: String,
        at: String,
        grams: i32,
        notes: String,
    },
}

impl CatCareCommand {
    pub fn command_id(&self) -> &str {
        match self {
            CatCareCommand::Register { command_id, .. } => command_id,
            CatCareCommand::LogWeight { command_id, .. } => command_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CatCareCommand::Register { .. } => "Register",
            CatCareCommand::LogWeight { .. } => "LogWeight",
        }
    }
}
