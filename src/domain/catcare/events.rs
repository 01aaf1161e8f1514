use serde::{Deserialize, Serialize};

use crate::event_sourcing::core::{decode_payload, encode_payload, DomainEvent, EventCodecError};

// ============================================================================
// CatCare Domain Events
// ============================================================================

/// Union type for all cat-care events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CatCareEvent {
    Registered(Registered),
    WeightLogged(WeightLogged),
}

impl CatCareEvent {
    pub fn command_id(&self) -> &str {
        match self {
            CatCareEvent::Registered(e) => &e.command_id,
            CatCareEvent::WeightLogged(e) => &e.command_id,
        }
    }

    /// One-line human readable summary.
    pub fn summary(&self) -> String {
        match self {
            CatCareEvent::Registered(e) => format!(
                "Registered entity_id={} name={} birth_date={}",
                e.entity_id, e.name, e.birth_date
            ),
            CatCareEvent::WeightLogged(e) => format!(
                "WeightLogged entry_id={} at={} grams={}",
                e.entry_id, e.at, e.grams
            ),
        }
    }
}

impl DomainEvent for CatCareEvent {
    const KINDS: &'static [&'static str] = &[Registered::KIND, WeightLogged::KIND];

    fn kind(&self) -> &'static str {
        match self {
            CatCareEvent::Registered(_) => Registered::KIND,
            CatCareEvent::WeightLogged(_) => WeightLogged::KIND,
        }
    }

    fn encode(&self) -> Result<String, EventCodecError> {
        match self {
            CatCareEvent::Registered(e) => encode_payload(Registered::KIND, e),
            CatCareEvent::WeightLogged(e) => encode_payload(WeightLogged::KIND, e),
        }
    }

    fn decode(kind: &str, payload: &str) -> Result<Self, EventCodecError> {
        match kind {
            Registered::KIND => decode_payload(kind, payload).map(CatCareEvent::Registered),
            WeightLogged::KIND => decode_payload(kind, payload).map(CatCareEvent::WeightLogged),
            other => Err(EventCodecError::UnknownKind(other.to_string())),
        }
    }
}

// Individual event types

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registered {
    pub command_id: String,
    pub entity_id: String,
    pub name: String,
    pub birth_date: String,
}

impl Registered {
    pub const KIND: &'static str = "Registered";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightLogged {
    pub command_id: String,
    pub entry_id: String,
    pub at: String,
    pub grams: i32,
    pub notes: String,
}

impl WeightLogged {
    pub const KIND: &'static str = "WeightLogged";
}
