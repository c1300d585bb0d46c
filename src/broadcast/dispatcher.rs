//! Broadcast dispatcher.
//!
//! Receives committed changes from the catalog store, turns them into room
//! deltas and fans them out to room members from a background task, so a
//! slow fan-out never delays a writer.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::queue::{DispatchQueue, PushOutcome};
use super::rooms::{Members, RoomRegistry};
use super::Delta;
use crate::catalog_store::{CatalogChange, ChangeKind, ChangeListener, RoomKey};
use crate::server::metrics;
use crate::server::websocket::connection::{DeliveryFailure, DeliveryOutcome};
use crate::server::websocket::ConnectionManager;

pub struct BroadcastDispatcher {
    queue: DispatchQueue,
    registry: Arc<RoomRegistry>,
    connections: Arc<ConnectionManager>,
}

impl BroadcastDispatcher {
    pub fn new(
        registry: Arc<RoomRegistry>,
        connections: Arc<ConnectionManager>,
        room_queue_capacity: usize,
    ) -> Self {
        Self {
            queue: DispatchQueue::new(room_queue_capacity),
            registry,
            connections,
        }
    }

    /// Deltas produced by one committed change.
    ///
    /// An entry that moved partitions yields a `removed` delta for its old
    /// room and an `added` delta for its new one, both with the new version.
    pub fn deltas_for(change: &CatalogChange) -> Vec<Delta> {
        let new_room = RoomKey::new(change.catalog_type, change.new_partition.clone());
        match &change.old_partition {
            Some(old) if *old != change.new_partition => vec![
                Delta {
                    room: RoomKey::new(change.catalog_type, old.clone()),
                    kind: ChangeKind::Removed,
                    entry: change.entry.clone(),
                },
                Delta {
                    room: new_room,
                    kind: ChangeKind::Added,
                    entry: change.entry.clone(),
                },
            ],
            _ => vec![Delta {
                room: new_room,
                kind: change.kind,
                entry: change.entry.clone(),
            }],
        }
    }

    /// Queue the deltas of a committed change. Never waits on delivery.
    pub fn publish(&self, change: CatalogChange) {
        metrics::record_catalog_change(change.catalog_type.as_str(), change.kind);
        for delta in Self::deltas_for(&change) {
            let room = delta.room.clone();
            if self.queue.push(delta) == PushOutcome::DroppedOldest {
                debug!("Room {} queue full, dropped oldest pending delta", room);
                metrics::record_delta_dropped("queue_full");
            }
        }
    }

    /// Deliver everything currently queued. Returns the number of deltas delivered.
    pub async fn dispatch_pending(&self) -> usize {
        let mut delivered = 0;
        while let Some((room, deltas)) = self.queue.pop_room() {
            delivered += self.deliver(&room, deltas).await;
        }
        delivered
    }

    async fn deliver(&self, room: &RoomKey, deltas: Vec<Delta>) -> usize {
        let members = self.registry.members_of(room);
        if members.is_empty() {
            return 0;
        }

        let mut delivered = 0;
        for delta in &deltas {
            for member in members.iter() {
                match self.connections.deliver_delta(*member, delta).await {
                    DeliveryOutcome::Delivered => {
                        delivered += 1;
                        metrics::DELTAS_DELIVERED_TOTAL.inc();
                    }
                    DeliveryOutcome::Stale => metrics::record_delta_dropped("stale"),
                    DeliveryOutcome::NotInRoom => metrics::record_delta_dropped("not_in_room"),
                    DeliveryOutcome::Failed(failure) => {
                        let reason = match failure {
                            DeliveryFailure::ChannelFull => "channel_full",
                            DeliveryFailure::ChannelClosed | DeliveryFailure::NotConnected => {
                                "channel_closed"
                            }
                        };
                        debug!(
                            "Dropped delta {} v{} for {} in room {}: {}",
                            delta.entry.id,
                            delta.version(),
                            member,
                            room,
                            reason
                        );
                        metrics::record_delta_dropped(reason);
                    }
                }
            }
            if delta.kind == ChangeKind::Removed {
                self.forget_removed(delta, &members).await;
            }
        }
        delivered
    }

    /// Drop the members' version record of a removed entry once no older
    /// delta for it is left in any room queue. Every later delta for the
    /// entry is newer than the removal.
    async fn forget_removed(&self, delta: &Delta, members: &Members) {
        let catalog_type = delta.room.catalog_type;
        if self.queue.has_pending_for(catalog_type, &delta.entry.id) {
            return;
        }
        for member in members.iter() {
            self.connections
                .forget_entry(*member, catalog_type, &delta.entry.id, delta.version())
                .await;
        }
    }

    /// Dispatch loop - call from a spawned task. Only one loop may run per
    /// dispatcher.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Broadcast dispatcher starting");
        loop {
            self.dispatch_pending().await;
            tokio::select! {
                _ = self.queue.notified() => {}
                _ = shutdown.cancelled() => {
                    info!("Broadcast dispatcher shutting down");
                    break;
                }
            }
        }
        info!("Broadcast dispatcher stopped");
    }

    pub fn pending(&self) -> usize {
        self.queue.pending()
    }
}

impl ChangeListener for BroadcastDispatcher {
    fn on_change(&self, change: CatalogChange) {
        self.publish(change);
    }
}
