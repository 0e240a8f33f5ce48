//! WASI HTTP server entry point for the long-polling signaling server
//!
//! This module provides the main entry point when running as a WASI HTTP component
//! using `wasmtime serve`.

use pairing_signaling_wasm::{Config, ServerState, handle_request, telemetry};
use std::cell::RefCell;
use wstd::http::{Body, Request, Response};

// Thread-local state for the server (WASI is single-threaded)
thread_local! {
    static STATE: RefCell<Option<ServerState>> = const { RefCell::new(None) };
}

fn get_or_init_state() -> ServerState {
    STATE.with(|s| {
        s.borrow_mut()
            .get_or_insert_with(|| {
                telemetry::init();
                ServerState::from_config(&Config::from_env())
            })
            .clone()
    })
}

/// The main HTTP handler for WASI
///
/// This function is called by the WASI runtime for each incoming HTTP request.
#[wstd::http_server]
async fn main(request: Request<Body>) -> Result<Response<Body>, wstd::http::Error> {
    let state = get_or_init_state();
    handle_request(request, &state).await
}
