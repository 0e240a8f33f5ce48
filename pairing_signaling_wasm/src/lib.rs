//! WASI-compatible rendezvous and signaling relay for two-party WebRTC calls
//!
//! Two anonymous clients meet under a short shareable key. The server pairs
//! them, tells the first one to start the call, and blindly relays their
//! negotiation messages (`offer`, `answer`, `ice`) and call-control signals
//! until the session ends. It never carries media.
//!
//! # Protocol
//!
//! Instead of WebSockets, this server uses HTTP long-polling:
//!
//! - **GET /poll?sid={sid}** - Open a connection / poll for events
//! - **POST /emit** - Send one event (X-Sid header required)
//! - **POST /disconnect** - Close the connection (X-Sid header required)
//! - **GET /health** - Health check
//!
//! ## Response Format (server → client)
//!
//! JSON response with the connection id and pending events:
//! ```json
//! {"sid": "<uuid>", "events": [{"event": "start_call", "data": {"peer_sid": "<uuid>"}}]}
//! ```
//!
//! Events:
//! - `key_generated {key}` - A fresh room key
//! - `joined {key, peers}` - You are in the room
//! - `join_error {reason}` - `invalid_key` or `room_full`
//! - `start_call {peer_sid}` - Room is full and you were first: make the offer
//! - `peer_joined {peer_sid}` - Room is full and you were second
//! - `peer_left {sid}` - Your peer left or disconnected
//! - `offer`, `answer`, `ice`, `incoming_call`, `accept_call`, `reject_call`,
//!   `end_call_signal` - Relayed from your peer, with `from`
//!
//! ## Client Events (client → server)
//!
//! POST to /emit with X-Sid header and JSON body, e.g.:
//! - `{"event": "generate_key"}`
//! - `{"event": "join_key", "data": {"key": "AB12XY"}}`
//! - `{"event": "offer", "data": {"key": "AB12XY", "sdp": {...}}}`
//!
//! # Example
//!
//! ```bash
//! # Start the server; state is carried between requests in
//! # ./signaling_state.json (override with SIGNALING_STATE_FILE)
//! wasmtime serve -S common --dir . --addr 127.0.0.1:3536 pairing-signaling-wasm.wasm
//!
//! # Open a connection (returns sid)
//! curl http://127.0.0.1:3536/poll
//!
//! # Ask for a room key
//! curl -X POST -H "X-Sid: <your-sid>" -d '{"event":"generate_key"}' \
//!   http://127.0.0.1:3536/emit
//!
//! # Poll for new events
//! curl "http://127.0.0.1:3536/poll?sid=<your-sid>"
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod keygen;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod state;
pub mod telemetry;

pub use config::Config;
pub use error::{JoinError, SignalingError};
pub use gateway::{Binding, Gateway};
pub use handler::handle_request;
pub use protocol::{ClientEvent, ConnId, RoomKey, ServerEvent};
pub use registry::Registry;
pub use state::ServerState;
