//! Bounded, per-room queue of pending deltas.
//!
//! Writers push without waiting; the dispatcher drains one room at a time in
//! the order rooms became ready. Each room holds at most `room_capacity`
//! pending deltas: a delta for an entry that is already pending replaces it,
//! otherwise the oldest pending delta of a full room is dropped.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use super::Delta;
use crate::catalog_store::{CatalogType, RoomKey};

/// Default number of pending deltas kept per room.
pub const DEFAULT_ROOM_QUEUE_CAPACITY: usize = 256;

/// What happened to a pushed delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Merged into a pending delta for the same entry.
    Coalesced,
    /// Queued after evicting the room's oldest pending delta.
    DroppedOldest,
}

#[derive(Default)]
struct QueueState {
    rooms: HashMap<RoomKey, VecDeque<Delta>>,
    /// Rooms with pending deltas, in the order they became non-empty.
    ready: VecDeque<RoomKey>,
}

pub struct DispatchQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    room_capacity: usize,
}

impl DispatchQueue {
    pub fn new(room_capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            room_capacity: room_capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a delta for its room. Never blocks on consumers.
    pub fn push(&self, delta: Delta) -> PushOutcome {
        let outcome = {
            let mut state = self.lock();
            let QueueState { rooms, ready } = &mut *state;
            let pending = rooms.entry(delta.room.clone()).or_insert_with(|| {
                ready.push_back(delta.room.clone());
                VecDeque::new()
            });

            if let Some(existing) = pending.iter_mut().find(|d| d.entry.id == delta.entry.id) {
                existing.merge(delta);
                PushOutcome::Coalesced
            } else if pending.len() >= self.room_capacity {
                pending.pop_front();
                pending.push_back(delta);
                PushOutcome::DroppedOldest
            } else {
                pending.push_back(delta);
                PushOutcome::Queued
            }
        };
        self.notify.notify_one();
        outcome
    }

    /// Take every pending delta of the next ready room.
    pub fn pop_room(&self) -> Option<(RoomKey, Vec<Delta>)> {
        let mut state = self.lock();
        let room = state.ready.pop_front()?;
        let deltas = state.rooms.remove(&room).unwrap_or_default();
        Some((room, deltas.into()))
    }

    /// Wait until something is pushed. A push that happened while nobody was
    /// waiting wakes the next waiter immediately.
    pub async fn notified(&self) {
        self.notify.notified().await
    }

    /// Total number of pending deltas across rooms.
    /// Whether any room still holds a delta for the entry.
    pub fn has_pending_for(&self, catalog_type: CatalogType, id: &str) -> bool {
        self.lock()
            .rooms
            .iter()
            .filter(|(room, _)| room.catalog_type == catalog_type)
            .any(|(_, deltas)| deltas.iter().any(|d| d.entry.id == id))
    }

    pub fn pending(&self) -> usize {
        self.lock().rooms.values().map(VecDeque::len).sum()
    }
}
