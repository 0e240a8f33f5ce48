//! Error types for the pairing signaling server

use crate::protocol::RoomKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while serving signaling requests
#[derive(Error, Debug)]
pub enum SignalingError {
    /// No free room key could be drawn
    #[error("Room key space exhausted after {attempts} attempts")]
    CapacityExhausted { attempts: usize },

    /// Unknown connection
    #[error("Unknown connection")]
    UnknownConnection,

    /// Relay or call event for a room that does not exist
    #[error("Unknown room: {0}")]
    UnknownRoom(RoomKey),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// State snapshot could not be read or written
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] std::io::Error),
}

/// Rejections reported to a client whose `join_key` failed.
///
/// Serialized as the `reason` of a `join_error` event.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinError {
    /// The key does not name a live room
    #[error("invalid key")]
    InvalidKey,

    /// The room already has two members
    #[error("room full")]
    RoomFull,
}

/// Errors from client requests
#[derive(Error, Debug)]
pub enum ClientRequestError {
    /// Missing or malformed `X-Sid` header
    #[error("Missing or invalid X-Sid header")]
    MissingSid,

    /// Request body could not be read
    #[error("Failed to read body: {0}")]
    Body(String),

    /// JSON parsing error, including unknown events and missing fields
    #[error("Invalid event: {0}")]
    Json(#[from] serde_json::Error),
}
