use std::collections::HashSet;

use crate::event_sourcing::core::Aggregate;
use super::commands::CatCareCommand;
use super::errors::CatCareError;
use super::events::*;

pub const MIN_WEIGHT_GRAMS: i32 = 100;
pub const MAX_WEIGHT_GRAMS: i32 = 30000;

// ============================================================================
// CatCare Aggregate - Business Logic
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatCareAggregate {
    pub entity_id: String,
    pub name: String,
    pub birth_date: String,
    pub registered: bool,
    pub weight_entries: Vec<WeightLogged>,
    pub version: i64,
    processed_command_ids: HashSet<String>,
}

/// Generated identifiers depend only on the command id, so a retried or
/// replayed command always mints the same id.
pub fn mint_id(prefix: &str, command_id: &str) -> String {
    format!("{prefix}-{command_id}")
}

impl CatCareAggregate {
    pub fn has_processed(&self, command_id: &str) -> bool {
        self.processed_command_ids.contains(command_id)
    }

    fn decide_register(&self, command_id: &str, name: &str, birth_date: &str) -> Result<Vec<CatCareEvent>, CatCareError> {
        if self.registered {
            return Err(CatCareError::AlreadyRegistered);
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(CatCareError::EmptyName);
        }

        Ok(vec![CatCareEvent::Registered(Registered {
            command_id: command_id.to_string(),
            entity_id: mint_id("entity", command_id),
            name: name.to_string(),
            birth_date: birth_date.trim().to_string(),
        })])
    }

    fn decide_log_weight(&self, command_id: &str, at: &str, grams: i32, notes: &str) -> Result<Vec<CatCareEvent>, CatCareError> {
        if !self.registered {
            return Err(CatCareError::NotRegistered);
        }
        let at = at.trim();
        if at.is_empty() {
            return Err(CatCareError::EmptyTimestamp);
        }
        if grams <= 0 {
            return Err(CatCareError::InvalidWeight(grams));
        }
        if !(MIN_WEIGHT_GRAMS..=MAX_WEIGHT_GRAMS).contains(&grams) {
            return Err(CatCareError::AbsurdWeight(grams));
        }

        Ok(vec![CatCareEvent::WeightLogged(WeightLogged {
            command_id: command_id.to_string(),
            entry_id: mint_id("entry", command_id),
            at: at.to_string(),
            grams,
            notes: notes.trim().to_string(),
        })])
    }
}

impl Aggregate for CatCareAggregate {
    type Event = CatCareEvent;
    type Command = CatCareCommand;
    type Error = CatCareError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CatCareEvent::Registered(e) => {
                self.entity_id = e.entity_id.clone();
                self.name = e.name.clone();
                self.birth_date = e.birth_date.clone();
                self.registered = true;
            }
            CatCareEvent::WeightLogged(e) => {
                self.weight_entries.push(e.clone());
            }
        }

        let command_id = event.command_id();
        if !command_id.is_empty() {
            self.processed_command_ids.insert(command_id.to_string());
        }
        self.version += 1;
    }

    fn decide(&self, command: Option<&Self::Command>) -> Result<Vec<Self::Event>, Self::Error> {
        let command = command.ok_or(CatCareError::MissingCommand)?;

        let command_id = command.command_id();
        if command_id.is_empty() {
            return Err(CatCareError::EmptyCommandId);
        }
        if self.has_processed(command_id) {
            return Err(CatCareError::DuplicateCommand);
        }

        match command {
            CatCareCommand::Register { command_id, name, birth_date } => {
                self.decide_register(command_id, name, birth_date)
            }
            CatCareCommand::LogWeight { command_id, at, grams, notes } => {
                self.decide_log_weight(command_id, at, *grams, notes)
            }
        }
    }

    fn version(&self) -> i64 {
        self.version
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
