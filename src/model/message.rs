//! Wire vocabulary exchanged with signaling clients.
//!
//! Messages are JSON text frames tagged by `"type"`. SDP and ICE payloads
//! travel inside the `payload` field as opaque JSON; the relay never looks
//! at them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SignalMessage {
    /// Sent by the relay once a connection is registered.
    #[serde(rename = "OPEN")]
    Open,

    /// Liveness signal from a client. Never forwarded.
    #[serde(rename = "HEARTBEAT")]
    Heartbeat,

    #[serde(rename = "OFFER")]
    Offer(Envelope),

    #[serde(rename = "ANSWER")]
    Answer(Envelope),

    #[serde(rename = "CANDIDATE")]
    Candidate(Envelope),

    #[serde(rename = "LEAVE")]
    Leave(Envelope),

    /// Tells a sender that its destination is no longer reachable.
    #[serde(rename = "EXPIRE")]
    Expire(Envelope),

    /// Rejection of a connection announcing an id that is already in use
    /// under a different token.
    #[serde(rename = "ID-TAKEN")]
    IdTaken { payload: DiagnosticPayload },

    #[serde(rename = "ERROR")]
    Error { payload: DiagnosticPayload },
}

/// Routing fields carried by every relayable message.
///
/// Absent fields are omitted from the JSON; browser clients treat a
/// present-but-null `src` differently from a missing one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticPayload {
    pub msg: String,
}

impl Envelope {
    pub fn to(dst: impl Into<String>) -> Envelope {
        Envelope {
            dst: Some(dst.into()),
            ..Envelope::default()
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Envelope {
        self.payload = Some(payload);
        self
    }
}

impl SignalMessage {
    pub fn id_taken() -> SignalMessage {
        SignalMessage::IdTaken {
            payload: DiagnosticPayload {
                msg: "ID is taken".to_string(),
            },
        }
    }

    pub fn error(msg: impl Into<String>) -> SignalMessage {
        SignalMessage::Error {
            payload: DiagnosticPayload { msg: msg.into() },
        }
    }

    /// The wire tag, for logging.
    pub fn label(&self) -> &'static str {
        match self {
            SignalMessage::Open => "OPEN",
            SignalMessage::Heartbeat => "HEARTBEAT",
            SignalMessage::Offer(_) => "OFFER",
            SignalMessage::Answer(_) => "ANSWER",
            SignalMessage::Candidate(_) => "CANDIDATE",
            SignalMessage::Leave(_) => "LEAVE",
            SignalMessage::Expire(_) => "EXPIRE",
            SignalMessage::IdTaken { .. } => "ID-TAKEN",
            SignalMessage::Error { .. } => "ERROR",
        }
    }

    /// The routing envelope, for messages that are forwarded between peers.
    pub fn envelope_mut(&mut self) -> Option<&mut Envelope> {
        match self {
            SignalMessage::Offer(e)
            | SignalMessage::Answer(e)
            | SignalMessage::Candidate(e)
            | SignalMessage::Leave(e)
            | SignalMessage::Expire(e) => Some(e),
            _ => None,
        }
    }

    /// Whether an undeliverable message bounces back to its sender as
    /// EXPIRE. LEAVE and EXPIRE are dropped silently instead, so a pair of
    /// disconnecting peers cannot ping-pong expiries at each other.
    pub fn should_expire(&self) -> bool {
        matches!(
            self,
            SignalMessage::Offer(_) | SignalMessage::Answer(_) | SignalMessage::Candidate(_)
        )
    }
}
