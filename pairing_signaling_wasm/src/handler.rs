//! HTTP long-polling handlers for the WASM signaling server
//!
//! Each client connection is a long-polling session identified by the `sid`
//! the server hands out on the first poll. Events from the server queue up
//! until the next poll; events from the client are POSTed one at a time.

use crate::{
    error::{ClientRequestError, SignalingError},
    protocol::{ClientEvent, ConnId, ServerEvent},
    state::ServerState,
};
use serde::Serialize;
use tracing::{debug, error};
use wstd::http::{Body, Method, Request, Response};

const SID_HEADER: &str = "x-sid";

const INFO_PAGE: &str = "Pairing Signaling Server (Long-Polling)\n\
     \n\
     Endpoints:\n\
     - GET /health - Health check\n\
     - GET /poll?sid={sid} - Open a connection / poll it for events\n\
     - POST /emit - Send one event (X-Sid header required)\n\
     - POST /disconnect - Close the connection (X-Sid header required)\n\
     \n\
     Protocol:\n\
     1. GET /poll to open a connection and get your sid\n\
     2. POST /emit {\"event\":\"generate_key\"} and share the key\n\
     3. Both peers POST /emit {\"event\":\"join_key\",\"data\":{\"key\":\"...\"}}\n\
     4. Keep polling GET /poll?sid={sid}; the first peer gets start_call,\n\
        the second peer_joined, then relay offer/answer/ice through /emit\n\
     \n\
     Response format: {\"sid\": \"uuid\", \"events\": [...]}\n";

/// Body of a poll response
#[derive(Serialize)]
struct PollResponse {
    sid: ConnId,
    events: Vec<ServerEvent>,
}

/// Build a response; all responses allow any origin
fn respond(status: u16, content_type: Option<&'static str>, body: Body) -> Response<Body> {
    let mut builder = Response::builder()
        .status(status)
        .header("access-control-allow-origin", "*");
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    builder
        .body(body)
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

fn text(status: u16, body: impl Into<String>) -> Response<Body> {
    respond(status, Some("text/plain"), Body::from(body.into()))
}

/// Get query parameter from URI
fn get_query_param<'a>(query: Option<&'a str>, key: &str) -> Option<&'a str> {
    query?.split('&').find_map(|pair| {
        let mut parts = pair.splitn(2, '=');
        let k = parts.next()?;
        let v = parts.next()?;
        if k == key { Some(v) } else { None }
    })
}

/// Read the sender's connection id from the `X-Sid` header
fn sid_header(request: &Request<Body>) -> Result<ConnId, ClientRequestError> {
    request
        .headers()
        .get(SID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .ok_or(ClientRequestError::MissingSid)
}

/// Read the sender and the event it sent
async fn read_event(request: Request<Body>) -> Result<(ConnId, ClientEvent), ClientRequestError> {
    let sid = sid_header(&request)?;
    let mut body = request.into_body();
    let contents = body
        .str_contents()
        .await
        .map_err(|e| ClientRequestError::Body(format!("{e:?}")))?;
    let event: ClientEvent = contents.parse()?;
    Ok((sid, event))
}

/// Open a connection, or drain the pending events of an existing one
fn handle_poll(sid: Option<ConnId>, state: &ServerState) -> Response<Body> {
    let (sid, events) = state.connect_or_poll(sid);

    match serde_json::to_string(&PollResponse { sid, events }) {
        Ok(json) => respond(200, Some("application/json"), Body::from(json)),
        Err(err) => {
            error!(sid = %sid, %err, "failed to encode poll response");
            text(500, "Failed to encode events")
        }
    }
}

/// Handle an event POST request
async fn handle_emit(request: Request<Body>, state: &ServerState) -> Response<Body> {
    let (sid, event) = match read_event(request).await {
        Ok(parsed) => parsed,
        Err(err) => {
            debug!(%err, "rejected event");
            return text(400, err.to_string());
        }
    };

    match state.emit(sid, event) {
        Ok(()) => text(200, "OK"),
        Err(SignalingError::UnknownConnection) => text(404, "Connection not found"),
        Err(err @ SignalingError::CapacityExhausted { .. }) => text(503, err.to_string()),
        Err(err) => {
            error!(sid = %sid, %err, "failed to handle event");
            text(500, err.to_string())
        }
    }
}

/// Handle an explicit disconnect
fn handle_disconnect(request: &Request<Body>, state: &ServerState) -> Response<Body> {
    match sid_header(request) {
        Ok(sid) => {
            state.disconnect(sid);
            text(200, "OK")
        }
        Err(err) => text(400, err.to_string()),
    }
}

/// Handle CORS preflight
fn handle_cors_preflight() -> Response<Body> {
    Response::builder()
        .status(204)
        .header("access-control-allow-origin", "*")
        .header("access-control-allow-methods", "GET, POST, OPTIONS")
        .header("access-control-allow-headers", "content-type, x-sid")
        .header("access-control-max-age", "86400")
        .body(Body::empty())
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

/// Handle an HTTP request - main router
pub async fn handle_request(
    request: Request<Body>,
    state: &ServerState,
) -> Result<Response<Body>, wstd::http::Error> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let path = uri.path();

    // CORS preflight
    if method == Method::OPTIONS {
        return Ok(handle_cors_preflight());
    }

    let response = if path == "/health" {
        text(200, "OK")
    } else if path == "/poll" && method == Method::GET {
        let sid = get_query_param(uri.query(), "sid").and_then(|s| s.parse().ok());
        handle_poll(sid, state)
    } else if path == "/emit" && method == Method::POST {
        handle_emit(request, state).await
    } else if path == "/disconnect" && method == Method::POST {
        handle_disconnect(&request, state)
    } else if path == "/" && method == Method::GET {
        text(200, INFO_PAGE)
    } else {
        text(404, "Not Found")
    };

    Ok(response)
}
