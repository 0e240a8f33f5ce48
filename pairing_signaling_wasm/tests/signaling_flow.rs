//! End-to-end signaling flows through the shared server state

use chrono::Duration;
use pairing_signaling_wasm::{
    ClientEvent, Config, ConnId, JoinError, RoomKey, ServerEvent, ServerState, SignalingError,
};
use serde_json::json;

fn open(state: &ServerState) -> ConnId {
    let (sid, events) = state.connect_or_poll(None);
    assert!(events.is_empty());
    sid
}

fn poll(state: &ServerState, sid: ConnId) -> Vec<ServerEvent> {
    let (polled, events) = state.connect_or_poll(Some(sid));
    assert_eq!(polled, sid, "connection {sid} was closed");
    events
}

fn generate_key(state: &ServerState, sid: ConnId) -> RoomKey {
    state.emit(sid, ClientEvent::GenerateKey).unwrap();
    match poll(state, sid).as_slice() {
        [ServerEvent::KeyGenerated { key }] => key.clone(),
        other => panic!("expected key_generated, got {other:?}"),
    }
}

fn join(state: &ServerState, sid: ConnId, key: &RoomKey) {
    state
        .emit(sid, ClientEvent::JoinKey { key: key.clone() })
        .unwrap();
}

#[test]
fn two_clients_pair_and_negotiate() {
    let state = ServerState::new();
    let (client1, client2) = (open(&state), open(&state));

    let key = generate_key(&state, client1);
    join(&state, client1, &key);
    assert_eq!(
        poll(&state, client1),
        vec![ServerEvent::Joined {
            key: key.clone(),
            peers: 1
        }]
    );

    join(&state, client2, &key);
    assert_eq!(
        poll(&state, client1),
        vec![ServerEvent::StartCall { peer_sid: client2 }]
    );
    assert_eq!(
        poll(&state, client2),
        vec![
            ServerEvent::Joined {
                key: key.clone(),
                peers: 2
            },
            ServerEvent::PeerJoined { peer_sid: client1 },
        ]
    );

    let offer = json!({"type": "offer", "sdp": "v=0\r\n"});
    let answer = json!({"type": "answer", "sdp": "v=0\r\n"});
    let candidate = json!({"candidate": "candidate:0 1 UDP 2122252543 192.0.2.4 61665 typ host", "sdpMLineIndex": 0});

    state
        .emit(
            client1,
            ClientEvent::Offer {
                key: key.clone(),
                sdp: offer.clone(),
            },
        )
        .unwrap();
    state
        .emit(
            client2,
            ClientEvent::Answer {
                key: key.clone(),
                sdp: answer.clone(),
            },
        )
        .unwrap();
    state
        .emit(
            client2,
            ClientEvent::Ice {
                key: key.clone(),
                candidate: candidate.clone(),
            },
        )
        .unwrap();

    assert_eq!(
        poll(&state, client1),
        vec![
            ServerEvent::Answer {
                sdp: answer,
                from: client2
            },
            ServerEvent::Ice {
                candidate,
                from: client2
            },
        ]
    );
    assert_eq!(
        poll(&state, client2),
        vec![ServerEvent::Offer {
            sdp: offer,
            from: client1
        }]
    );
}

#[test]
fn call_control_is_relayed_to_the_peer_only() {
    let state = ServerState::new();
    let (a, b) = (open(&state), open(&state));
    let key = generate_key(&state, a);
    join(&state, a, &key);
    join(&state, b, &key);
    poll(&state, a);
    poll(&state, b);

    state
        .emit(
            a,
            ClientEvent::IncomingCall {
                key: key.clone(),
                call_type: "video".to_string(),
            },
        )
        .unwrap();
    state
        .emit(
            b,
            ClientEvent::RejectCall {
                key: key.clone(),
                reason: "busy".to_string(),
            },
        )
        .unwrap();
    state
        .emit(a, ClientEvent::AcceptCall { key: key.clone() })
        .unwrap();
    state
        .emit(b, ClientEvent::EndCallSignal { key: key.clone() })
        .unwrap();

    assert_eq!(
        poll(&state, a),
        vec![
            ServerEvent::RejectCall {
                reason: "busy".to_string(),
                from: b
            },
            ServerEvent::EndCallSignal { from: b },
        ]
    );
    assert_eq!(
        poll(&state, b),
        vec![
            ServerEvent::IncomingCall {
                call_type: "video".to_string(),
                from: a
            },
            ServerEvent::AcceptCall { from: a },
        ]
    );
}

#[test]
fn third_client_gets_room_full() {
    let state = ServerState::new();
    let (a, b, c) = (open(&state), open(&state), open(&state));
    let key = generate_key(&state, a);
    join(&state, a, &key);
    join(&state, b, &key);

    join(&state, c, &key);
    assert_eq!(
        poll(&state, c),
        vec![ServerEvent::JoinError {
            reason: JoinError::RoomFull
        }]
    );
    assert_eq!(state.room_members(&key), vec![a, b]);
}

#[test]
fn room_is_gone_after_both_members_leave() {
    let state = ServerState::new();
    let (a, b) = (open(&state), open(&state));
    let key = generate_key(&state, a);
    join(&state, a, &key);
    join(&state, b, &key);
    poll(&state, a);

    state
        .emit(a, ClientEvent::LeaveKey { key: key.clone() })
        .unwrap();
    state
        .emit(a, ClientEvent::LeaveKey { key: key.clone() })
        .unwrap();
    assert!(state.disconnect(b));
    assert!(!state.disconnect(b));

    assert_eq!(state.room_count(), 0);
    join(&state, a, &key);
    assert_eq!(
        poll(&state, a),
        vec![ServerEvent::JoinError {
            reason: JoinError::InvalidKey
        }]
    );
}

#[test]
fn disconnect_notifies_remaining_peer() {
    let state = ServerState::new();
    let (a, b) = (open(&state), open(&state));
    let key = generate_key(&state, a);
    join(&state, a, &key);
    join(&state, b, &key);
    poll(&state, a);

    state.disconnect(b);
    assert_eq!(poll(&state, a), vec![ServerEvent::PeerLeft { sid: b }]);
    assert_eq!(state.room_members(&key), vec![a]);
    assert_eq!(state.connection_count(), 1);
}

#[test]
fn relay_after_peer_left_is_dropped() {
    let state = ServerState::new();
    let a = open(&state);
    let key = generate_key(&state, a);
    join(&state, a, &key);
    state.disconnect(a);

    let b = open(&state);
    state
        .emit(
            b,
            ClientEvent::Offer {
                key,
                sdp: json!({}),
            },
        )
        .unwrap();
    assert!(poll(&state, b).is_empty());
}

#[test]
fn events_from_closed_connection_are_refused() {
    let state = ServerState::new();
    let a = open(&state);
    state.disconnect(a);

    let err = state.emit(a, ClientEvent::GenerateKey).unwrap_err();
    assert!(matches!(err, SignalingError::UnknownConnection));
    assert_eq!(state.room_count(), 0);
}

#[test]
fn polling_a_closed_connection_opens_a_new_one() {
    let state = ServerState::new();
    let a = open(&state);
    state.disconnect(a);

    let (sid, events) = state.connect_or_poll(Some(a));
    assert_ne!(sid, a);
    assert!(events.is_empty());
}

#[test]
fn idle_peer_is_disconnected() {
    let state = ServerState::from_config(&Config {
        state_file: None,
        idle_timeout: Duration::milliseconds(300),
    });
    let (a, b) = (open(&state), open(&state));
    let key = generate_key(&state, a);
    join(&state, a, &key);
    join(&state, b, &key);

    std::thread::sleep(std::time::Duration::from_millis(200));
    poll(&state, a);
    std::thread::sleep(std::time::Duration::from_millis(200));

    assert_eq!(poll(&state, a), vec![ServerEvent::PeerLeft { sid: b }]);
    assert_eq!(state.room_members(&key), vec![a]);
}

#[test]
fn snapshot_carries_state_between_instances() {
    let path = std::env::temp_dir().join(format!("signaling-{}.json", uuid::Uuid::new_v4()));
    let config = Config {
        state_file: Some(path.clone()),
        ..Config::default()
    };

    let first = ServerState::from_config(&config);
    let a = open(&first);
    let key = generate_key(&first, a);
    join(&first, a, &key);

    let second = ServerState::from_config(&config);
    let b = open(&second);
    join(&second, b, &key);

    assert_eq!(
        poll(&first, a),
        vec![
            ServerEvent::Joined {
                key: key.clone(),
                peers: 1
            },
            ServerEvent::StartCall { peer_sid: b },
        ]
    );
    assert_eq!(second.room_members(&key), vec![a, b]);

    let _ = std::fs::remove_file(path);
}

#[test]
fn unjoined_room_goes_with_its_creator() {
    let state = ServerState::new();
    for _ in 0..10 {
        let a = open(&state);
        generate_key(&state, a);
        state.disconnect(a);
    }
    assert_eq!(state.connection_count(), 0);
    assert_eq!(state.room_count(), 0);
}

#[test]
fn unwritable_snapshot_keeps_in_memory_state() {
    let path = std::env::temp_dir()
        .join(format!("missing-{}", uuid::Uuid::new_v4()))
        .join("state.json");
    let state = ServerState::from_config(&Config {
        state_file: Some(path),
        ..Config::default()
    });

    let (a, b) = (open(&state), open(&state));
    let key = generate_key(&state, a);
    join(&state, a, &key);
    join(&state, b, &key);

    assert_eq!(
        poll(&state, a),
        vec![
            ServerEvent::Joined {
                key: key.clone(),
                peers: 1
            },
            ServerEvent::StartCall { peer_sid: b },
        ]
    );
    assert_eq!(state.room_members(&key), vec![a, b]);
}
