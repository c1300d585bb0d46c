//! Room membership registry.
//!
//! Tracks which connections are in which rooms, in both directions. A single
//! short-lived lock guards both maps so a join, leave or disconnect is never
//! observed half applied. Rooms exist only while they have members.
//!
//! Each room's member set is published as an immutable `Arc` snapshot.
//! Readers clone the `Arc` and iterate it without holding the lock, and a
//! writer only copies a member set while some reader still holds it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::catalog_store::RoomKey;
use crate::server::metrics;
use crate::server::websocket::ConnectionId;

/// Immutable view of one room's members.
pub type Members = Arc<HashSet<ConnectionId>>;

#[derive(Default)]
struct Memberships {
    /// room -> published members
    rooms: HashMap<RoomKey, Members>,
    /// connection -> joined rooms
    connections: HashMap<ConnectionId, HashSet<RoomKey>>,
}

impl Memberships {
    fn remove_member(&mut self, connection: ConnectionId, room: &RoomKey) -> bool {
        let Some(members) = self.rooms.get_mut(room) else {
            return false;
        };
        if !members.contains(&connection) {
            return false;
        }
        if members.len() == 1 {
            self.rooms.remove(room);
        } else {
            Arc::make_mut(members).remove(&connection);
        }
        true
    }

    fn remove(&mut self, connection: ConnectionId, room: &RoomKey) -> bool {
        let removed = self.remove_member(connection, room);
        if let Some(joined) = self.connections.get_mut(&connection) {
            joined.remove(room);
            if joined.is_empty() {
                self.connections.remove(&connection);
            }
        }
        removed
    }

    fn publish_gauges(&self) {
        metrics::WS_ROOMS.set(self.rooms.len() as f64);
    }
}

#[derive(Default)]
pub struct RoomRegistry {
    state: Mutex<Memberships>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Memberships> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a connection to a room. Returns false if it was already a member.
    pub fn join(&self, connection: ConnectionId, room: &RoomKey) -> bool {
        let mut state = self.lock();
        let members = state.rooms.entry(room.clone()).or_default();
        let added = !members.contains(&connection);
        if added {
            Arc::make_mut(members).insert(connection);
        }
        state
            .connections
            .entry(connection)
            .or_default()
            .insert(room.clone());
        state.publish_gauges();
        if added {
            debug!("{} joined room {}", connection, room);
        }
        added
    }

    /// Remove a connection from a room. Returns false if it was not a member.
    pub fn leave(&self, connection: ConnectionId, room: &RoomKey) -> bool {
        let mut state = self.lock();
        let removed = state.remove(connection, room);
        state.publish_gauges();
        if removed {
            debug!("{} left room {}", connection, room);
        }
        removed
    }

    /// Remove a connection from every room it joined. Returns those rooms.
    pub fn disconnect(&self, connection: ConnectionId) -> Vec<RoomKey> {
        let mut state = self.lock();
        let joined: Vec<RoomKey> = state
            .connections
            .remove(&connection)
            .map(|rooms| rooms.into_iter().collect())
            .unwrap_or_default();
        for room in &joined {
            state.remove_member(connection, room);
        }
        state.publish_gauges();
        joined
    }

    /// Members of a room at the time of the call.
    ///
    /// The returned set is a snapshot: later joins and leaves do not change
    /// it, and holding it never delays them.
    pub fn members_of(&self, room: &RoomKey) -> Members {
        self.lock().rooms.get(room).cloned().unwrap_or_default()
    }

    pub fn rooms_of(&self, connection: ConnectionId) -> HashSet<RoomKey> {
        self.lock()
            .connections
            .get(&connection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.lock().rooms.len()
    }

    pub fn connection_count(&self) -> usize {
        self.lock().connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::CatalogType;

    fn room(partition: &str) -> RoomKey {
        RoomKey::new(CatalogType::Price, partition)
    }

    #[test]
    fn join_is_idempotent_and_bidirectional() {
        let registry = RoomRegistry::new();
        let c1 = ConnectionId(1);

        assert!(registry.join(c1, &room("A")));
        assert!(!registry.join(c1, &room("A")));

        assert_eq!(registry.members_of(&room("A")).len(), 1);
        assert!(registry.rooms_of(c1).contains(&room("A")));
    }

    #[test]
    fn leave_is_idempotent_and_collects_empty_rooms() {
        let registry = RoomRegistry::new();
        let c1 = ConnectionId(1);
        registry.join(c1, &room("A"));

        assert!(registry.leave(c1, &room("A")));
        assert!(!registry.leave(c1, &room("A")));
        assert!(!registry.leave(ConnectionId(9), &room("Z")));

        assert_eq!(registry.room_count(), 0);
        assert_eq!(registry.connection_count(), 0);
        assert!(registry.members_of(&room("A")).is_empty());
    }

    #[test]
    fn disconnect_leaves_no_dangling_membership() {
        let registry = RoomRegistry::new();
        let c1 = ConnectionId(1);
        let c2 = ConnectionId(2);
        registry.join(c1, &room("A"));
        registry.join(c1, &room("B"));
        registry.join(c2, &room("A"));

        let mut left = registry.disconnect(c1);
        left.sort();
        assert_eq!(left, vec![room("A"), room("B")]);

        assert!(registry.rooms_of(c1).is_empty());
        assert!(!registry.members_of(&room("A")).contains(&c1));
        assert!(registry.members_of(&room("B")).is_empty());
        assert_eq!(registry.room_count(), 1);
        assert_eq!(registry.connection_count(), 1);
    }

    #[test]
    fn disconnect_of_unknown_connection_is_a_no_op() {
        let registry = RoomRegistry::new();
        assert!(registry.disconnect(ConnectionId(42)).is_empty());
    }

    #[test]
    fn held_member_snapshot_does_not_hold_up_writers() {
        let registry = RoomRegistry::new();
        let c1 = ConnectionId(1);
        let c2 = ConnectionId(2);
        registry.join(c1, &room("A"));

        let snapshot = registry.members_of(&room("A"));

        // Would deadlock if the snapshot kept the registry locked
        assert!(registry.join(c2, &room("A")));
        assert!(registry.leave(c1, &room("A")));

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains(&c1));
        let current = registry.members_of(&room("A"));
        assert_eq!(current.len(), 1);
        assert!(current.contains(&c2));
    }

    #[test]
    fn reads_proceed_while_joins_are_in_flight() {
        let registry = Arc::new(RoomRegistry::new());
        let writer = std::thread::spawn({
            let registry = registry.clone();
            move || {
                for i in 0..500u64 {
                    registry.join(ConnectionId(i), &room("A"));
                }
            }
        });

        let mut last_seen = 0;
        while !writer.is_finished() {
            let members = registry.members_of(&room("A"));
            // Members only ever grow here, so every snapshot is at least as large as the last
            assert!(members.len() >= last_seen);
            last_seen = members.len();
        }
        writer.join().unwrap();

        assert_eq!(registry.members_of(&room("A")).len(), 500);
    }

    #[tokio::test]
    async fn concurrent_joins_and_disconnects_stay_consistent() {
        let registry = Arc::new(RoomRegistry::new());
        let mut handles = Vec::new();
        for i in 0..16u64 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let connection = ConnectionId(i);
                for p in 0..4 {
                    registry.join(connection, &room(&p.to_string()));
                }
                if i % 2 == 0 {
                    registry.disconnect(connection);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.connection_count(), 8);
        for p in 0..4 {
            let members = registry.members_of(&room(&p.to_string()));
            assert_eq!(members.len(), 8);
            assert!(members.iter().all(|c| c.0 % 2 == 1));
        }
    }
}
