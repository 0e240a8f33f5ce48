//! Connection gateway
//!
//! Binds each live connection to at most one room, turns client events into
//! registry operations, and queues the resulting notifications on the
//! outboxes of the connections they are addressed to. Connections drain
//! their outbox when they poll.

use crate::{
    error::SignalingError,
    protocol::{ClientEvent, Command, ConnId, Relay, RoomKey, ServerEvent},
    registry::{Departure, Registry},
    relay,
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, error, info};

/// Room association of a connection
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Binding {
    #[default]
    Unbound,
    Bound(RoomKey),
}

/// Connection state with pending events
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Connection {
    binding: Binding,
    /// Pending events to be delivered to this connection
    outbox: VecDeque<ServerEvent>,
    last_seen: DateTime<Utc>,
}

impl Connection {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            binding: Binding::Unbound,
            outbox: VecDeque::new(),
            last_seen: now,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Gateway {
    registry: Registry,
    /// Map of connection ID -> connection state
    connections: HashMap<ConnId, Connection>,
}

impl Gateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new, unbound connection
    pub fn connect(&mut self, now: DateTime<Utc>) -> ConnId {
        let conn = ConnId::new_v4();
        self.connections.insert(conn, Connection::new(now));
        info!(sid = %conn, "connection opened");
        conn
    }

    pub fn is_connected(&self, conn: ConnId) -> bool {
        self.connections.contains_key(&conn)
    }

    /// Drain the pending events of `conn`, marking it as alive.
    ///
    /// `None` if the connection is unknown.
    pub fn poll(&mut self, conn: ConnId, now: DateTime<Utc>) -> Option<Vec<ServerEvent>> {
        let connection = self.connections.get_mut(&conn)?;
        connection.last_seen = now;
        Some(connection.outbox.drain(..).collect())
    }

    /// Apply one client event on behalf of `conn`
    pub fn handle<R: Rng + ?Sized>(
        &mut self,
        conn: ConnId,
        event: ClientEvent,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<(), SignalingError> {
        let connection = self
            .connections
            .get_mut(&conn)
            .ok_or(SignalingError::UnknownConnection)?;
        connection.last_seen = now;

        match Command::from(event) {
            Command::GenerateKey => self.generate_key(conn, rng, now),
            Command::Join(key) => {
                self.join(conn, key);
                Ok(())
            }
            Command::Leave(key) => {
                self.leave(conn, &key);
                Ok(())
            }
            Command::Relay(key, payload) => match self.relay(conn, key, payload) {
                Err(SignalingError::UnknownRoom(key)) => {
                    debug!(sid = %conn, key = %key, "dropping relay for unknown room");
                    Ok(())
                }
                result => result.map(|_| ()),
            },
        }
    }

    /// Close `conn`, removing it from any room and telling the peers left
    /// behind. Returns whether the connection was open.
    pub fn disconnect(&mut self, conn: ConnId) -> bool {
        let was_open = self.connections.remove(&conn).is_some();

        for departure in self.registry.disconnect(conn) {
            self.notify_departure(&departure);
        }

        if was_open {
            info!(sid = %conn, "connection closed");
        }
        was_open
    }

    /// Disconnect every connection not seen for longer than `timeout`
    pub fn expire_idle(&mut self, now: DateTime<Utc>, timeout: Duration) -> Vec<ConnId> {
        let idle: Vec<ConnId> = self
            .connections
            .iter()
            .filter(|(_, connection)| now - connection.last_seen > timeout)
            .map(|(conn, _)| *conn)
            .collect();

        for &conn in &idle {
            debug!(sid = %conn, "connection idle");
            self.disconnect(conn);
        }
        idle
    }

    pub fn binding(&self, conn: ConnId) -> Option<&Binding> {
        self.connections.get(&conn).map(|connection| &connection.binding)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn generate_key<R: Rng + ?Sized>(
        &mut self,
        conn: ConnId,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<(), SignalingError> {
        let key = self
            .registry
            .create_room(rng, conn, now)
            .inspect_err(|err| error!(sid = %conn, %err, "failed to allocate room key"))?;
        info!(sid = %conn, key = %key, "room created");
        self.deliver(conn, ServerEvent::KeyGenerated { key });
        Ok(())
    }

    fn join(&mut self, conn: ConnId, key: RoomKey) {
        let previous = match self.binding(conn) {
            Some(Binding::Bound(current)) if *current != key => Some(current.clone()),
            _ => None,
        };

        let joined = match self.registry.join(&key, conn) {
            Ok(joined) => joined,
            Err(reason) => {
                debug!(sid = %conn, key = %key, %reason, "join rejected");
                self.deliver(conn, ServerEvent::JoinError { reason });
                return;
            }
        };

        // A connection sits in one room at a time; drop the old seat only
        // once the new one is secured.
        if let Some(previous) = previous {
            self.leave(conn, &previous);
        }
        if let Some(connection) = self.connections.get_mut(&conn) {
            connection.binding = Binding::Bound(key.clone());
        }

        info!(sid = %conn, key = %key, peers = joined.peers, "joined room");
        self.deliver(
            conn,
            ServerEvent::Joined {
                key: key.clone(),
                peers: joined.peers,
            },
        );

        if let Some(pairing) = joined.pairing {
            info!(key = %key, caller = %pairing.caller, receiver = %pairing.receiver, "room paired");
            self.deliver(
                pairing.caller,
                ServerEvent::StartCall {
                    peer_sid: pairing.receiver,
                },
            );
            self.deliver(
                pairing.receiver,
                ServerEvent::PeerJoined {
                    peer_sid: pairing.caller,
                },
            );
        }
    }

    fn leave(&mut self, conn: ConnId, key: &RoomKey) {
        if let Some(departure) = self.registry.leave(key, conn) {
            self.notify_departure(&departure);
        }

        if let Some(connection) = self.connections.get_mut(&conn) {
            if connection.binding == Binding::Bound(key.clone()) {
                connection.binding = Binding::Unbound;
            }
        }
    }

    fn relay(
        &mut self,
        conn: ConnId,
        key: RoomKey,
        payload: Relay,
    ) -> Result<usize, SignalingError> {
        let Some(room) = self.registry.room(&key) else {
            return Err(SignalingError::UnknownRoom(key));
        };

        let kind = payload.kind();
        let connections = &mut self.connections;
        let delivered = relay::dispatch(room, conn, payload, |to, event| {
            push(connections, to, event)
        });
        debug!(sid = %conn, key = %key, kind, delivered, "relayed");
        Ok(delivered)
    }

    fn notify_departure(&mut self, departure: &Departure) {
        info!(
            sid = %departure.left,
            key = %departure.key,
            closed = departure.closed,
            "left room"
        );
        for &peer in &departure.remaining {
            self.deliver(
                peer,
                ServerEvent::PeerLeft {
                    sid: departure.left,
                },
            );
        }
    }

    fn deliver(&mut self, to: ConnId, event: ServerEvent) {
        push(&mut self.connections, to, event);
    }
}

/// Queue `event` for `to`; dropped if the connection is gone
fn push(connections: &mut HashMap<ConnId, Connection>, to: ConnId, event: ServerEvent) {
    match connections.get_mut(&to) {
        Some(connection) => connection.outbox.push_back(event),
        None => debug!(sid = %to, "dropping event for closed connection"),
    }
}
