//! Wire types exchanged between clients and the signaling server
//!
//! Every event is a JSON object tagged by name, with its fields under `data`:
//!
//! ```json
//! {"event": "join_key", "data": {"key": "AB12XY"}}
//! {"event": "generate_key"}
//! ```
//!
//! Negotiation payloads (`sdp`, `candidate`) are carried as raw JSON values
//! and never inspected.

use crate::error::JoinError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Server-assigned identifier of one client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnId(pub Uuid);

impl ConnId {
    /// Draw a fresh random connection id
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for ConnId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for ConnId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Shareable room key
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomKey(pub String);

impl From<&str> for RoomKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Events sent by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    GenerateKey,
    JoinKey {
        key: RoomKey,
    },
    LeaveKey {
        key: RoomKey,
    },
    Offer {
        key: RoomKey,
        sdp: Value,
    },
    Answer {
        key: RoomKey,
        sdp: Value,
    },
    Ice {
        key: RoomKey,
        candidate: Value,
    },
    IncomingCall {
        key: RoomKey,
        #[serde(rename = "callType")]
        call_type: String,
    },
    AcceptCall {
        key: RoomKey,
    },
    RejectCall {
        key: RoomKey,
        reason: String,
    },
    EndCallSignal {
        key: RoomKey,
    },
}

/// What a client event asks the server to do
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    GenerateKey,
    Join(RoomKey),
    Leave(RoomKey),
    Relay(RoomKey, Relay),
}

impl From<ClientEvent> for Command {
    fn from(event: ClientEvent) -> Self {
        match event {
            ClientEvent::GenerateKey => Self::GenerateKey,
            ClientEvent::JoinKey { key } => Self::Join(key),
            ClientEvent::LeaveKey { key } => Self::Leave(key),
            ClientEvent::Offer { key, sdp } => Self::Relay(key, Relay::Offer { sdp }),
            ClientEvent::Answer { key, sdp } => Self::Relay(key, Relay::Answer { sdp }),
            ClientEvent::Ice { key, candidate } => Self::Relay(key, Relay::Ice { candidate }),
            ClientEvent::IncomingCall { key, call_type } => {
                Self::Relay(key, Relay::IncomingCall { call_type })
            }
            ClientEvent::AcceptCall { key } => Self::Relay(key, Relay::AcceptCall),
            ClientEvent::RejectCall { key, reason } => Self::Relay(key, Relay::RejectCall { reason }),
            ClientEvent::EndCallSignal { key } => Self::Relay(key, Relay::EndCallSignal),
        }
    }
}

impl FromStr for ClientEvent {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

/// Payload of a negotiation or call-control event forwarded between peers
#[derive(Debug, Clone, PartialEq)]
pub enum Relay {
    Offer { sdp: Value },
    Answer { sdp: Value },
    Ice { candidate: Value },
    IncomingCall { call_type: String },
    AcceptCall,
    RejectCall { reason: String },
    EndCallSignal,
}

impl Relay {
    /// Event name on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Ice { .. } => "ice",
            Self::IncomingCall { .. } => "incoming_call",
            Self::AcceptCall => "accept_call",
            Self::RejectCall { .. } => "reject_call",
            Self::EndCallSignal => "end_call_signal",
        }
    }

    /// Outbound form of this payload, stamped with its sender
    pub fn into_event(self, from: ConnId) -> ServerEvent {
        match self {
            Self::Offer { sdp } => ServerEvent::Offer { sdp, from },
            Self::Answer { sdp } => ServerEvent::Answer { sdp, from },
            Self::Ice { candidate } => ServerEvent::Ice { candidate, from },
            Self::IncomingCall { call_type } => ServerEvent::IncomingCall { call_type, from },
            Self::AcceptCall => ServerEvent::AcceptCall { from },
            Self::RejectCall { reason } => ServerEvent::RejectCall { reason, from },
            Self::EndCallSignal => ServerEvent::EndCallSignal { from },
        }
    }
}

/// Events pushed to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    KeyGenerated {
        key: RoomKey,
    },
    Joined {
        key: RoomKey,
        peers: usize,
    },
    JoinError {
        reason: JoinError,
    },
    /// Sent to the first member once the room is full; it initiates the call
    StartCall {
        peer_sid: ConnId,
    },
    /// Sent to the second member once the room is full
    PeerJoined {
        peer_sid: ConnId,
    },
    PeerLeft {
        sid: ConnId,
    },
    Offer {
        sdp: Value,
        from: ConnId,
    },
    Answer {
        sdp: Value,
        from: ConnId,
    },
    Ice {
        candidate: Value,
        from: ConnId,
    },
    IncomingCall {
        #[serde(rename = "callType")]
        call_type: String,
        from: ConnId,
    },
    AcceptCall {
        from: ConnId,
    },
    RejectCall {
        reason: String,
        from: ConnId,
    },
    EndCallSignal {
        from: ConnId,
    },
}

impl fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}
