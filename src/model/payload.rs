use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Timestamped text payload exchanged by the demo peers.
///
/// Browsers put SDP and ICE blobs in the payload slot; the probe sends this
/// instead so signaling latency can be read off the relayed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub data: String,
    pub timestamp: i64,
}

impl Payload {
    pub fn new(data: &str) -> Payload {
        Self {
            data: data.to_string(),
            timestamp: Utc::now().timestamp_nanos_opt().unwrap_or(0),
        }
    }

    pub fn timestamp(&self) -> String {
        Utc.timestamp_nanos(self.timestamp).to_rfc3339()
    }

    pub fn latency(&self) -> String {
        (Utc::now() - Utc.timestamp_nanos(self.timestamp)).to_string()
    }

    /// Serialize into the opaque payload slot of a signal message.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Deserialize from a relayed payload, if it has this shape.
    pub fn from_value(value: Value) -> Option<Payload> {
        serde_json::from_value(value).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trips_through_value() {
        let payload = Payload::new("ping");
        let value = payload.to_value().unwrap();
        assert_eq!(Payload::from_value(value), Some(payload));
    }

    #[test]
    fn foreign_payload_is_rejected() {
        let value = serde_json::json!({ "sdp": "v=0..." });
        assert_eq!(Payload::from_value(value), None);
    }
}
