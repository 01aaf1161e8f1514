use serde::{Deserialize, Serialize};
use std::fmt;

use crate::event_sourcing::store::EventStoreError;

// ============================================================================
// CatCare Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatCareError {
    #[error("cat already registered")]
    AlreadyRegistered,

    #[error("cat must be registered first")]
    NotRegistered,

    #[error("already applied")]
    DuplicateCommand,

    #[error("command is required")]
    MissingCommand,

    #[error("must not be empty")]
    EmptyCommandId,

    #[error("must be positive")]
    InvalidWeight(i32),

    #[error("outside allowed range")]
    AbsurdWeight(i32),

    #[error("must not be empty")]
    EmptyName,

    #[error("must not be empty")]
    EmptyTimestamp,
}

impl CatCareError {
    pub fn code(&self) -> RejectionCode {
        match self {
            CatCareError::AlreadyRegistered => RejectionCode::AlreadyRegistered,
            CatCareError::NotRegistered => RejectionCode::NotRegistered,
            CatCareError::DuplicateCommand => RejectionCode::DuplicateCommand,
            CatCareError::MissingCommand => RejectionCode::InvalidCommand,
            CatCareError::EmptyCommandId => RejectionCode::InvalidCommandId,
            CatCareError::InvalidWeight(_) => RejectionCode::InvalidWeight,
            CatCareError::AbsurdWeight(_) => RejectionCode::AbsurdWeight,
            CatCareError::EmptyName => RejectionCode::InvalidName,
            CatCareError::EmptyTimestamp => RejectionCode::InvalidDate,
        }
    }

    /// Name of the offending command field, when there is one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            CatCareError::AlreadyRegistered
            | CatCareError::NotRegistered
            | CatCareError::MissingCommand => None,
            CatCareError::DuplicateCommand | CatCareError::EmptyCommandId => Some("command_id"),
            CatCareError::InvalidWeight(_) | CatCareError::AbsurdWeight(_) => Some("grams"),
            CatCareError::EmptyName => Some("name"),
            CatCareError::EmptyTimestamp => Some("at"),
        }
    }
}

// ============================================================================
// Rejections - structured, expected refusals returned to callers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionCode {
    AlreadyRegistered,
    NotRegistered,
    DuplicateCommand,
    InvalidCommand,
    InvalidCommandId,
    InvalidWeight,
    AbsurdWeight,
    InvalidName,
    InvalidDate,
}

impl RejectionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionCode::AlreadyRegistered => "already_registered",
            RejectionCode::NotRegistered => "not_registered",
            RejectionCode::DuplicateCommand => "duplicate_command",
            RejectionCode::InvalidCommand => "invalid_command",
            RejectionCode::InvalidCommandId => "invalid_command_id",
            RejectionCode::InvalidWeight => "invalid_weight",
            RejectionCode::AbsurdWeight => "absurd_weight",
            RejectionCode::InvalidName => "invalid_name",
            RejectionCode::InvalidDate => "invalid_date",
        }
    }
}

impl fmt::Display for RejectionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub code: RejectionCode,
    pub message: String,
    pub field: Option<String>,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}: {} {}", self.code, field, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

impl From<CatCareError> for Rejection {
    fn from(error: CatCareError) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
            field: error.field().map(str::to_string),
        }
    }
}

// ============================================================================
// Command Handling Errors - infrastructure, never business rules
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("aggregate id is required")]
    MissingAggregateId,

    #[error(transparent)]
    Store(#[from] EventStoreError),
}

impl CommandError {
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, CommandError::Store(err) if err.is_concurrency_conflict())
    }
}
