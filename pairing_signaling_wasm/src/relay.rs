//! Forwarding negotiation and call-control payloads within a room

use crate::{
    protocol::{ConnId, Relay, ServerEvent},
    registry::Room,
};

/// Deliver `relay` to every member of `room` except `sender`.
///
/// Returns how many members it was handed to; zero when the peer has not
/// joined yet or already left.
pub fn dispatch<F>(room: &Room, sender: ConnId, relay: Relay, mut deliver: F) -> usize
where
    F: FnMut(ConnId, ServerEvent),
{
    let event = relay.into_event(sender);
    let mut delivered = 0;
    for &member in room.members().iter().filter(|&&member| member != sender) {
        deliver(member, event.clone());
        delivered += 1;
    }
    delivered
}
