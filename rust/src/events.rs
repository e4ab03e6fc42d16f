use serde::{Deserialize, Deserializer};
use thiserror::Error;

pub const INIT_CHANNELS: &str = "init_channels";
pub const INIT_USERS: &str = "init_users";
// Misspelled on the wire; kept for backend compatibility.
pub const RECEIVE_MESSAGE: &str = "recieve_message";

/// Payload of a `recieve_message` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WireMessage {
    pub username: String,
    pub body: String,
    #[serde(deserialize_with = "timestamp_seconds")]
    pub timestamp: i64,
    #[serde(default)]
    pub channel: Option<String>,
}

// Any JSON number is accepted; out-of-range values saturate and fractions truncate.
fn timestamp_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let n = serde_json::Number::deserialize(deserializer)?;
    Ok(n.as_i64()
        .or_else(|| n.as_u64().map(|_| i64::MAX))
        .or_else(|| n.as_f64().map(|f| f as i64))
        .unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    InitChannels(Vec<String>),
    InitUsers(Vec<String>),
    ReceiveMessage(WireMessage),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("unknown event stream: {0}")]
    UnknownEvent(String),
    #[error("malformed {event} payload: {source}")]
    Malformed {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl BackendEvent {
    pub fn parse(event: &str, payload_json: &str) -> Result<Self, EventError> {
        match event {
            INIT_CHANNELS => Ok(Self::InitChannels(decode(INIT_CHANNELS, payload_json)?)),
            INIT_USERS => Ok(Self::InitUsers(decode(INIT_USERS, payload_json)?)),
            RECEIVE_MESSAGE => Ok(Self::ReceiveMessage(decode(RECEIVE_MESSAGE, payload_json)?)),
            other => Err(EventError::UnknownEvent(other.to_string())),
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    event: &'static str,
    payload_json: &str,
) -> Result<T, EventError> {
    serde_json::from_str(payload_json).map_err(|source| EventError::Malformed { event, source })
}
