//! Server state management for the WASM signaling server
//!
//! [`ServerState`] is the handle the HTTP handlers share. Every operation
//! takes one lock over the whole [`Gateway`], so registry mutations are
//! serialized globally.
//!
//! Under `wasmtime serve` each request may run in a fresh instance, so the
//! state can optionally be carried between requests in a JSON snapshot that
//! is loaded before and saved after every operation.

use crate::{
    config::Config,
    error::SignalingError,
    gateway::Gateway,
    protocol::{ClientEvent, ConnId, RoomKey, ServerEvent},
};
use chrono::{DateTime, Duration, Utc};
use std::{
    io::ErrorKind,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};
use tracing::{debug, warn};

/// JSON file holding a serialized [`Gateway`]
#[derive(Debug, Clone)]
struct Snapshot {
    path: PathBuf,
}

impl Snapshot {
    fn read(&self) -> Result<Option<Gateway>, SignalingError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn write(&self, gateway: &Gateway) -> Result<(), SignalingError> {
        let json = serde_json::to_string(gateway)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Load state from file; `None` if it is missing or unreadable, in
    /// which case the in-memory state stays authoritative
    fn load(&self) -> Option<Gateway> {
        match self.read() {
            Ok(Some(gateway)) => Some(gateway),
            Ok(None) => {
                debug!(path = %self.path.display(), "no snapshot, keeping in-memory state");
                None
            }
            Err(err) => {
                warn!(path = %self.path.display(), %err, "ignoring unreadable snapshot");
                None
            }
        }
    }

    fn save(&self, gateway: &Gateway) {
        if let Err(err) = self.write(gateway) {
            warn!(path = %self.path.display(), %err, "failed to save snapshot");
        }
    }
}

/// The main server state handle
#[derive(Clone)]
pub struct ServerState {
    gateway: Arc<Mutex<Gateway>>,
    snapshot: Option<Snapshot>,
    idle_timeout: Duration,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ServerState {
    /// Create an in-memory server state
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            gateway: Arc::new(Mutex::new(Gateway::default())),
            snapshot: config.state_file.clone().map(|path| Snapshot { path }),
            idle_timeout: config.idle_timeout,
        }
    }

    /// Run `f` with exclusive access to the gateway, after closing idle
    /// connections
    fn with_gateway<T>(&self, f: impl FnOnce(&mut Gateway, DateTime<Utc>) -> T) -> T {
        let mut gateway = self.gateway.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(loaded) = self.snapshot.as_ref().and_then(Snapshot::load) {
            *gateway = loaded;
        }

        let now = Utc::now();
        gateway.expire_idle(now, self.idle_timeout);
        let result = f(&mut gateway, now);

        if let Some(snapshot) = &self.snapshot {
            snapshot.save(&gateway);
        }
        result
    }

    /// Open a connection or poll an existing one for events
    ///
    /// If `sid` is None or no longer known, opens a new connection.
    /// Returns (sid, pending_events)
    pub fn connect_or_poll(&self, sid: Option<ConnId>) -> (ConnId, Vec<ServerEvent>) {
        self.with_gateway(|gateway, now| {
            if let Some(sid) = sid {
                if let Some(events) = gateway.poll(sid, now) {
                    return (sid, events);
                }
                debug!(sid = %sid, "poll from unknown connection, opening a new one");
            }
            (gateway.connect(now), Vec::new())
        })
    }

    /// Apply an event sent by `sid`
    pub fn emit(&self, sid: ConnId, event: ClientEvent) -> Result<(), SignalingError> {
        self.with_gateway(|gateway, now| gateway.handle(sid, event, &mut rand::thread_rng(), now))
    }

    /// Close `sid`; a no-op if it is already closed
    pub fn disconnect(&self, sid: ConnId) -> bool {
        self.with_gateway(|gateway, _| gateway.disconnect(sid))
    }

    /// Get all members of a room, in join order
    pub fn room_members(&self, key: &RoomKey) -> Vec<ConnId> {
        self.with_gateway(|gateway, _| {
            gateway
                .registry()
                .room(key)
                .map(|room| room.members().to_vec())
                .unwrap_or_default()
        })
    }

    pub fn room_count(&self) -> usize {
        self.with_gateway(|gateway, _| gateway.registry().len())
    }

    pub fn connection_count(&self) -> usize {
        self.with_gateway(|gateway, _| gateway.connection_count())
    }
}
