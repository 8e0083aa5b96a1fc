//! Subscription registry: which connection hears which room.
//!
//! The room coordinators return scoped events but hold no connection
//! state; this registry is the one place that knows how to turn a
//! [`Scope`] into actual sends. Each connection subscribes to exactly one
//! room's broadcast stream at a time (its writer task's channel sender).

use std::collections::HashMap;

use pointforge_protocol::{
    ConnectionId, RoomCode, ServerEvent, ServerPayload,
};
use pointforge_room::{Outbound, Scope};
use tokio::sync::mpsc;

/// Sender half of one connection's outbound channel. The paired writer
/// task assigns sequence numbers, encodes, and drives the socket.
pub(crate) type OutboundSender = mpsc::UnboundedSender<ServerPayload>;

/// Maps connections to room broadcast streams, both directions.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    by_conn: HashMap<ConnectionId, (RoomCode, OutboundSender)>,
    rooms: HashMap<RoomCode, Vec<ConnectionId>>,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Subscribes a connection to a room's broadcast stream. A connection
    /// subscribes to at most one room; a second subscribe replaces the
    /// first.
    pub(crate) fn subscribe(
        &mut self,
        conn: ConnectionId,
        room: RoomCode,
        sender: OutboundSender,
    ) {
        self.unsubscribe(conn);
        self.rooms.entry(room.clone()).or_default().push(conn);
        self.by_conn.insert(conn, (room, sender));
    }

    /// Drops a connection's subscription. Returns the room it was
    /// subscribed to, if any.
    pub(crate) fn unsubscribe(
        &mut self,
        conn: ConnectionId,
    ) -> Option<RoomCode> {
        let (room, _) = self.by_conn.remove(&conn)?;
        if let Some(members) = self.rooms.get_mut(&room) {
            members.retain(|c| *c != conn);
            if members.is_empty() {
                self.rooms.remove(&room);
            }
        }
        Some(room)
    }

    /// Drops every subscription for a destroyed room.
    pub(crate) fn drop_room(&mut self, room: &RoomCode) {
        if let Some(members) = self.rooms.remove(room) {
            for conn in members {
                self.by_conn.remove(&conn);
            }
        }
    }

    /// Fans a batch of scoped events out to a room's subscribers.
    ///
    /// Sends to closed channels are silently dropped — a receiver is only
    /// gone when its connection is already tearing down, and the
    /// disconnect path will unsubscribe it.
    pub(crate) fn fan_out(&self, room: &RoomCode, outbound: &[Outbound]) {
        let Some(members) = self.rooms.get(room) else {
            return;
        };
        for Outbound { scope, event } in outbound {
            for conn in members {
                if self.in_scope(*scope, *conn) {
                    self.send_to(*conn, event.clone());
                }
            }
        }
    }

    fn in_scope(&self, scope: Scope, conn: ConnectionId) -> bool {
        match scope {
            Scope::All => true,
            Scope::AllExcept(excluded) => conn != excluded,
            Scope::Connection(target) => conn == target,
        }
    }

    fn send_to(&self, conn: ConnectionId, event: ServerEvent) {
        if let Some((_, sender)) = self.by_conn.get(&conn) {
            let _ = sender.send(ServerPayload::Event(event));
        }
    }

    /// Number of live subscriptions.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.by_conn.len()
    }
}
