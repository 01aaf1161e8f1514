use serde::{de::DeserializeOwned, Serialize};

// ============================================================================
// Domain Events - Closed-Variant Event Codec
// ============================================================================
//
// Every event type stored by the engine is a closed enum. Each variant has a
// stable kind name that is persisted next to its JSON payload, so a stored
// record is `(stream_id, version, kind, payload)`.
//
// Decoding an unknown kind is schema drift and always an error. Records are
// never skipped.
//
// ============================================================================

/// Errors raised while turning events into stored records and back.
#[derive(Debug, thiserror::Error)]
pub enum EventCodecError {
    #[error("unknown event kind `{0}`")]
    UnknownKind(String),

    #[error("malformed `{kind}` payload: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode `{kind}` event: {source}")]
    Encode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// A closed family of domain events that can be persisted and replayed.
pub trait DomainEvent: Clone + Send + Sync + 'static {
    /// Every kind name this event family can produce.
    const KINDS: &'static [&'static str];

    /// Stable name of this event's variant.
    fn kind(&self) -> &'static str;

    /// Serialize the variant's fields (not the enum tag) to a JSON payload.
    fn encode(&self) -> Result<String, EventCodecError>;

    /// Rebuild an event from its kind name and payload.
    fn decode(kind: &str, payload: &str) -> Result<Self, EventCodecError>;
}

// ============================================================================
// Payload Helpers
// ============================================================================

pub fn encode_payload<T: Serialize>(kind: &'static str, payload: &T) -> Result<String, EventCodecError> {
    serde_json::to_string(payload).map_err(|source| EventCodecError::Encode { kind, source })
}

pub fn decode_payload<T: DeserializeOwned>(kind: &str, payload: &str) -> Result<T, EventCodecError> {
    serde_json::from_str(payload).map_err(|source| EventCodecError::Malformed {
        kind: kind.to_string(),
        source,
    })
}
