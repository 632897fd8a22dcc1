//! Audit events interface for session and identity transitions.
use std::collections::BTreeMap;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

pub mod emit;
mod errors;

pub use self::errors::Error;

/// An individual event emitted by the application.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Identifier of the specific event (and its payload type).
    pub code: String,

    /// Additional unstructured metadata attached to the event.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    /// JSON encoded event payload.
    #[serde(default)]
    pub payload: Value,

    /// Time the event was generated.
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
}

impl Event {
    /// Attempt to decode the event payload into the specified type.
    pub fn decode<T>(&self) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_value(self.payload.clone())
            .context(Error::PayloadDecode)
            .map_err(anyhow::Error::from)
    }

    /// Create a new event with the given code and payload, generated now.
    pub fn new_with_payload<S, P>(code: S, payload: P) -> Result<Event>
    where
        S: Into<String>,
        P: Serialize,
    {
        let code = code.into();
        let payload =
            serde_json::to_value(payload).with_context(|| Error::PayloadEncode(code.clone()))?;
        let event = Event {
            code,
            metadata: Default::default(),
            payload,
            time: OffsetDateTime::now_utc(),
        };
        Ok(event)
    }
}
