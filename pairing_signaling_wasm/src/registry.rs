//! Session registry: the authoritative map from room key to room state
//!
//! The registry only decides. It returns what happened ([`JoinOutcome`],
//! [`Departure`]) and leaves delivering notifications to the caller.

use crate::{
    error::{JoinError, SignalingError},
    keygen,
    protocol::{ConnId, RoomKey},
};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum number of members in a room
pub const ROOM_CAPACITY: usize = 2;

/// A pairing context for two connections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    key: RoomKey,
    /// Join order; the first member is the caller
    members: Vec<ConnId>,
    /// Connection that asked for the key; an unjoined room goes with it
    created_by: ConnId,
    created_at: DateTime<Utc>,
}

impl Room {
    fn new(key: RoomKey, created_by: ConnId, created_at: DateTime<Utc>) -> Self {
        Self {
            key,
            members: Vec::with_capacity(ROOM_CAPACITY),
            created_by,
            created_at,
        }
    }

    /// Members in join order
    pub fn members(&self) -> &[ConnId] {
        &self.members
    }

    /// Connection that generated this room's key
    pub fn created_by(&self) -> ConnId {
        self.created_by
    }

    /// When the key was generated
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= ROOM_CAPACITY
    }

    /// Whether `conn` is a member
    pub fn contains(&self, conn: ConnId) -> bool {
        self.members.contains(&conn)
    }

    /// Remove `conn`, returning whether it was a member
    fn remove(&mut self, conn: ConnId) -> bool {
        let before = self.members.len();
        self.members.retain(|member| *member != conn);
        self.members.len() != before
    }
}

/// Caller/receiver roles assigned when a room fills up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    /// First to join; initiates the call
    pub caller: ConnId,
    pub receiver: ConnId,
}

/// Result of a successful join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    /// Member count after the join
    pub peers: usize,
    /// Set when this join filled the room
    pub pairing: Option<Pairing>,
}

pub type JoinOutcome = Result<Joined, JoinError>;

/// A connection removed from a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub key: RoomKey,
    pub left: ConnId,
    /// Members still in the room, to be told the peer left
    pub remaining: Vec<ConnId>,
    /// Whether the room was deleted because it emptied
    pub closed: bool,
}

/// Live rooms keyed by room key
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Registry {
    rooms: HashMap<RoomKey, Room>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh key and insert an empty room under it on behalf of
    /// `creator`
    pub fn create_room<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        creator: ConnId,
        now: DateTime<Utc>,
    ) -> Result<RoomKey, SignalingError> {
        let key = keygen::generate(rng, |key| self.rooms.contains_key(key))?;
        self.rooms.insert(key.clone(), Room::new(key.clone(), creator, now));
        Ok(key)
    }

    /// Add `conn` to the room under `key`.
    ///
    /// Joining a room one is already in reports the current count and never
    /// produces a second pairing.
    pub fn join(&mut self, key: &RoomKey, conn: ConnId) -> JoinOutcome {
        let room = self.rooms.get_mut(key).ok_or(JoinError::InvalidKey)?;

        if room.contains(conn) {
            return Ok(Joined {
                peers: room.members.len(),
                pairing: None,
            });
        }
        if room.is_full() {
            return Err(JoinError::RoomFull);
        }

        room.members.push(conn);

        let pairing = match room.members[..] {
            [caller, receiver] => Some(Pairing { caller, receiver }),
            _ => None,
        };

        Ok(Joined {
            peers: room.members.len(),
            pairing,
        })
    }

    /// Remove `conn` from the room under `key`, deleting the room if it
    /// empties. `None` if `conn` was not a member.
    pub fn leave(&mut self, key: &RoomKey, conn: ConnId) -> Option<Departure> {
        let room = self.rooms.get_mut(key)?;
        if !room.remove(conn) {
            return None;
        }

        let remaining = room.members.clone();
        let closed = remaining.is_empty();
        if closed {
            self.rooms.remove(key);
        }

        Some(Departure {
            key: key.clone(),
            left: conn,
            remaining,
            closed,
        })
    }

    /// Remove `conn` from every room that lists it, and drop the still
    /// empty rooms it created
    pub fn disconnect(&mut self, conn: ConnId) -> Vec<Departure> {
        let mut departures = Vec::new();

        for room in self.rooms.values_mut() {
            if room.remove(conn) {
                departures.push(Departure {
                    key: room.key.clone(),
                    left: conn,
                    remaining: room.members.clone(),
                    closed: room.members.is_empty(),
                });
            }
        }

        for departure in departures.iter().filter(|d| d.closed) {
            self.rooms.remove(&departure.key);
        }
        self.rooms.retain(|_, room| !(room.created_by == conn && room.members.is_empty()));

        departures
    }

    /// Room under `key`, if live
    pub fn room(&self, key: &RoomKey) -> Option<&Room> {
        self.rooms.get(key)
    }

    pub fn contains(&self, key: &RoomKey) -> bool {
        self.rooms.contains_key(key)
    }

    /// Number of live rooms
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
