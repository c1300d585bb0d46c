//! In-memory catalog store.
//!
//! Each catalog type owns a published copy-on-write map of its live entries
//! plus one slot per id that serializes mutations of that id. Readers only
//! clone the published `Arc`, so snapshots never observe a partially applied
//! mutation. A write clones the whole map only while an older snapshot of
//! it is still held; entries themselves are shared through their `Arc`.
//!
//! Slots are never removed: the slot map holds one tombstone per distinct id
//! ever written, so memory grows with the number of ids, not live entries.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::debug;

use super::models::{
    Attributes, CatalogChange, CatalogEntry, CatalogSnapshot, CatalogType, ChangeKind, Version,
};
use super::trait_def::{CatalogError, CatalogStore, ChangeListener};
use super::validation::validate_entry;

type EntryMap = BTreeMap<String, Arc<CatalogEntry>>;

/// Per-id mutation state. Survives deletion as a tombstone so versions keep
/// increasing if the id is re-created.
#[derive(Debug, Default)]
struct EntrySlot {
    /// Arrival sequence of the last applied mutation.
    last_sequence: u64,
    version: Version,
    entry: Option<Arc<CatalogEntry>>,
}

#[derive(Default)]
struct CatalogTable {
    published: RwLock<Arc<EntryMap>>,
    slots: Mutex<HashMap<String, Arc<Mutex<EntrySlot>>>>,
}

impl CatalogTable {
    fn slot(&self, id: &str) -> Arc<Mutex<EntrySlot>> {
        let mut slots = lock(&self.slots);
        slots.entry(id.to_string()).or_default().clone()
    }

    fn existing_slot(&self, id: &str) -> Option<Arc<Mutex<EntrySlot>>> {
        lock(&self.slots).get(id).cloned()
    }

    fn publish(&self, id: &str, entry: Option<Arc<CatalogEntry>>) {
        let mut published = self.published.write().unwrap_or_else(PoisonError::into_inner);
        let map = Arc::make_mut(&mut *published);
        match entry {
            Some(entry) => {
                map.insert(id.to_string(), entry);
            }
            None => {
                map.remove(id);
            }
        }
    }

    fn current(&self) -> Arc<EntryMap> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Catalog store keeping every catalog in memory.
pub struct InMemoryCatalogStore {
    tables: HashMap<CatalogType, CatalogTable>,
    sequence: AtomicU64,
    listeners: Vec<Arc<dyn ChangeListener>>,
}

impl Default for InMemoryCatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        let tables = CatalogType::ALL
            .iter()
            .map(|t| (*t, CatalogTable::default()))
            .collect();
        Self {
            tables,
            sequence: AtomicU64::new(0),
            listeners: Vec::new(),
        }
    }

    /// Register a listener notified of every committed mutation.
    pub fn with_listener(mut self, listener: Arc<dyn ChangeListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Assign the arrival sequence number of a mutation.
    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn table(&self, catalog_type: CatalogType) -> &CatalogTable {
        // Every type gets a table in `new`.
        &self.tables[&catalog_type]
    }

    fn emit(&self, change: CatalogChange) {
        for listener in &self.listeners {
            listener.on_change(change.clone());
        }
    }

    /// Upsert with an explicit arrival sequence number.
    fn upsert_sequenced(
        &self,
        sequence: u64,
        catalog_type: CatalogType,
        id: &str,
        attributes: Attributes,
        new_partition: String,
    ) -> Version {
        let table = self.table(catalog_type);
        let slot_handle = table.slot(id);
        let mut slot = lock(&slot_handle);

        if slot.last_sequence > sequence {
            debug!(
                "Upsert of {} '{}' (seq {}) superseded by seq {}",
                catalog_type, id, sequence, slot.last_sequence
            );
            return slot.version;
        }

        let schema = catalog_type.schema();
        let old_partition = slot.entry.as_ref().and_then(|e| schema.partition_of(e));
        let kind = if slot.entry.is_some() {
            ChangeKind::Updated
        } else {
            ChangeKind::Added
        };
        let version = slot.version + 1;
        let entry = Arc::new(CatalogEntry {
            id: id.to_string(),
            catalog_type,
            attributes,
            version,
            updated_at: now_millis(),
        });

        table.publish(id, Some(entry.clone()));
        slot.last_sequence = sequence;
        slot.version = version;
        slot.entry = Some(entry.clone());

        self.emit(CatalogChange {
            catalog_type,
            id: id.to_string(),
            old_partition,
            new_partition,
            version,
            kind,
            entry,
        });
        version
    }

    fn delete_sequenced(
        &self,
        sequence: u64,
        catalog_type: CatalogType,
        id: &str,
    ) -> Result<(), CatalogError> {
        let not_found = || CatalogError::NotFound {
            catalog_type,
            id: id.to_string(),
        };

        let table = self.table(catalog_type);
        let slot_handle = table.existing_slot(id).ok_or_else(not_found)?;
        let mut slot = lock(&slot_handle);

        if slot.last_sequence > sequence {
            debug!(
                "Delete of {} '{}' (seq {}) superseded by seq {}",
                catalog_type, id, sequence, slot.last_sequence
            );
            return Ok(());
        }

        let previous = slot.entry.take().ok_or_else(not_found)?;
        let partition = catalog_type
            .schema()
            .partition_of(&previous)
            .unwrap_or_default();
        let version = slot.version + 1;
        let removed = Arc::new(CatalogEntry {
            version,
            updated_at: now_millis(),
            ..(*previous).clone()
        });

        table.publish(id, None);
        slot.last_sequence = sequence;
        slot.version = version;

        self.emit(CatalogChange {
            catalog_type,
            id: id.to_string(),
            old_partition: Some(partition.clone()),
            new_partition: partition,
            version,
            kind: ChangeKind::Removed,
            entry: removed,
        });
        Ok(())
    }
}

impl CatalogStore for InMemoryCatalogStore {
    fn upsert(
        &self,
        catalog_type: CatalogType,
        id: &str,
        attributes: Attributes,
    ) -> Result<Version, CatalogError> {
        let partition = validate_entry(catalog_type, id, &attributes)?;
        let sequence = self.next_sequence();
        Ok(self.upsert_sequenced(sequence, catalog_type, id, attributes, partition))
    }

    fn delete(&self, catalog_type: CatalogType, id: &str) -> Result<(), CatalogError> {
        let sequence = self.next_sequence();
        self.delete_sequenced(sequence, catalog_type, id)
    }

    fn get(&self, catalog_type: CatalogType, id: &str) -> Result<CatalogEntry, CatalogError> {
        self.table(catalog_type)
            .current()
            .get(id)
            .map(|entry| (**entry).clone())
            .ok_or_else(|| CatalogError::NotFound {
                catalog_type,
                id: id.to_string(),
            })
    }

    fn list_snapshot(&self, catalog_type: CatalogType) -> CatalogSnapshot {
        CatalogSnapshot::new(catalog_type, self.table(catalog_type).current())
    }

    fn count(&self, catalog_type: CatalogType) -> usize {
        self.table(catalog_type).current().len()
    }
}
