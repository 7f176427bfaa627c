//! Event types
//!
//! One logical entity flows through the whole pipeline in three stages:
//! - `EventPayload`: what arrives over the wire, nothing guaranteed
//! - `Event`: an accepted event (non-empty type, non-zero timestamp)
//! - `StoredEvent`: an accepted event plus the identifier the store assigned

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Free-form event parameters (arbitrary JSON values keyed by name)
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Unvalidated event as received by the ingestion endpoint
///
/// Missing fields decode to their zero values, validation happens in
/// [`Event::try_from`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventPayload {
    #[serde(default)]
    pub event_type: String,
    #[serde(default, rename = "ts")]
    pub timestamp: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub params: Params,
}

/// `"params": null` means no parameters
fn null_as_empty<'de, D>(deserializer: D) -> Result<Params, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<Params>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Reasons a payload is not accepted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("event has to have a type")]
    MissingType,

    #[error("event has to have a timestamp")]
    MissingTimestamp,
}

/// An accepted event
///
/// Only constructible through validation, so every `Event` in the queue or
/// the store has a type and a timestamp. Serializes to the same shape as
/// [`EventPayload`], which is also the queue message format.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Event {
    event_type: String,
    #[serde(rename = "ts")]
    timestamp: i64,
    params: Params,
}

impl Event {
    /// Validate and build an accepted event
    pub fn new(
        event_type: impl Into<String>,
        timestamp: i64,
        params: Params,
    ) -> Result<Self, ValidationError> {
        let event_type = event_type.into();
        if event_type.is_empty() {
            return Err(ValidationError::MissingType);
        }
        if timestamp == 0 {
            return Err(ValidationError::MissingTimestamp);
        }
        Ok(Self {
            event_type,
            timestamp,
            params,
        })
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Attach a store-assigned identifier
    pub fn into_stored(self, id: impl Into<String>) -> StoredEvent {
        StoredEvent {
            id: id.into(),
            event_type: self.event_type,
            timestamp: self.timestamp,
            params: self.params,
        }
    }
}

impl TryFrom<EventPayload> for Event {
    type Error = ValidationError;

    fn try_from(payload: EventPayload) -> Result<Self, Self::Error> {
        Event::new(payload.event_type, payload.timestamp, payload.params)
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let payload = EventPayload::deserialize(deserializer)?;
        Event::try_from(payload).map_err(serde::de::Error::custom)
    }
}

impl From<Event> for EventPayload {
    fn from(event: Event) -> Self {
        Self {
            event_type: event.event_type,
            timestamp: event.timestamp,
            params: event.params,
        }
    }
}

/// A persisted event as returned by queries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredEvent {
    /// Identifier assigned by the store on insert
    pub id: String,
    #[serde(rename = "eventType")]
    pub event_type: String,
    #[serde(rename = "ts")]
    pub timestamp: i64,
    pub params: Params,
}
