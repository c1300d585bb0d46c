//! Room-scoped broadcast of catalog changes.
//!
//! The store hands committed changes to the [`BroadcastDispatcher`], which
//! turns them into per-room [`Delta`]s, queues them, and fans them out to the
//! members tracked by the [`RoomRegistry`]. [`ReconnectSync`] answers every
//! join with a full snapshot.

mod dispatcher;
mod queue;
mod reconnect;
mod rooms;

use std::sync::Arc;

pub use dispatcher::BroadcastDispatcher;
pub use queue::{DispatchQueue, PushOutcome, DEFAULT_ROOM_QUEUE_CAPACITY};
pub use reconnect::{JoinError, ReconnectSync};
pub use rooms::{Members, RoomRegistry};

use crate::catalog_store::{CatalogEntry, ChangeKind, RoomKey, Version};

/// An incremental change to one entry, addressed to one room.
#[derive(Debug, Clone, PartialEq)]
pub struct Delta {
    pub room: RoomKey,
    pub kind: ChangeKind,
    pub entry: Arc<CatalogEntry>,
}

impl Delta {
    pub fn version(&self) -> Version {
        self.entry.version
    }

    /// Fold a newer delta for the same entry into this one.
    ///
    /// The newest version always wins; the kind is chosen so a client that
    /// only sees the merged delta ends in the same state.
    fn merge(&mut self, newer: Delta) {
        if newer.version() < self.version() {
            return;
        }
        self.kind = match (self.kind, newer.kind) {
            (ChangeKind::Added, ChangeKind::Updated) => ChangeKind::Added,
            (ChangeKind::Removed, ChangeKind::Added) => ChangeKind::Updated,
            (_, kind) => kind,
        };
        self.entry = newer.entry;
    }
}
