//! Catalog models shared by the store, the filter engine and the broadcast layer.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::validation::ValidationError;

/// Per-entry monotonic counter.
pub type Version = u64;

/// Free-form attributes of an entry, keyed by attribute name.
pub type Attributes = BTreeMap<String, serde_json::Value>;

// =============================================================================
// Enumerations
// =============================================================================

/// The kinds of catalogs served by the platform.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogType {
    /// Market prices of crops, partitioned by region.
    Price,
    /// Marketplace product listings.
    Listing,
    /// Government schemes.
    Scheme,
    /// Experts available for consultation.
    Expert,
    /// Learning hub resources (videos, articles, courses).
    Resource,
}

impl CatalogType {
    pub const ALL: [CatalogType; 5] = [
        CatalogType::Price,
        CatalogType::Listing,
        CatalogType::Scheme,
        CatalogType::Expert,
        CatalogType::Resource,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogType::Price => "price",
            CatalogType::Listing => "listing",
            CatalogType::Scheme => "scheme",
            CatalogType::Expert => "expert",
            CatalogType::Resource => "resource",
        }
    }
}

impl fmt::Display for CatalogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CatalogType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price" => Ok(CatalogType::Price),
            "listing" => Ok(CatalogType::Listing),
            "scheme" => Ok(CatalogType::Scheme),
            "expert" => Ok(CatalogType::Expert),
            "resource" => Ok(CatalogType::Resource),
            other => Err(ValidationError::UnknownCatalogType(other.to_string())),
        }
    }
}

/// Kind of change carried by a delta.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Updated,
    Removed,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Updated => "updated",
            ChangeKind::Removed => "removed",
        }
    }
}

// =============================================================================
// Entries
// =============================================================================

/// A single catalog entry as committed by the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub catalog_type: CatalogType,
    pub attributes: Attributes,
    pub version: Version,
    /// Unix timestamp in milliseconds of the commit.
    pub updated_at: i64,
}

impl CatalogEntry {
    /// Scalar rendering of an attribute, used for partitioning and equality filters.
    ///
    /// Returns `None` for missing, null, array and object values.
    pub fn scalar_attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).and_then(scalar_to_string)
    }

    /// String attribute, or empty string when missing or not a string.
    pub fn text_attribute(&self, name: &str) -> &str {
        self.attributes
            .get(name)
            .and_then(|v| v.as_str())
            .unwrap_or("")
    }
}

pub(crate) fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Payload handed in by catalog CRUD collaborators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntryPayload {
    pub id: String,
    pub catalog_type: String,
    #[serde(default)]
    pub attributes: Attributes,
}

// =============================================================================
// Rooms and changes
// =============================================================================

/// Identifies one partition of one catalog; the unit of subscription.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct RoomKey {
    pub catalog_type: CatalogType,
    pub partition: String,
}

impl RoomKey {
    pub fn new(catalog_type: CatalogType, partition: impl Into<String>) -> Self {
        Self {
            catalog_type,
            partition: partition.into(),
        }
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.catalog_type, self.partition)
    }
}

/// A committed mutation, emitted by the store to its change listeners.
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogChange {
    pub catalog_type: CatalogType,
    pub id: String,
    /// Partition the entry was in before the mutation, `None` if it did not exist.
    pub old_partition: Option<String>,
    /// Partition the entry is in after the mutation. For removals this is the
    /// partition it was removed from.
    pub new_partition: String,
    pub version: Version,
    pub kind: ChangeKind,
    /// Entry content after the mutation; for removals, the last content with
    /// the removal version.
    pub entry: Arc<CatalogEntry>,
}

/// Point-in-time, immutable copy of one catalog, ordered by id.
#[derive(Clone, Debug)]
pub struct CatalogSnapshot {
    catalog_type: CatalogType,
    entries: Arc<BTreeMap<String, Arc<CatalogEntry>>>,
}

impl CatalogSnapshot {
    pub(crate) fn new(
        catalog_type: CatalogType,
        entries: Arc<BTreeMap<String, Arc<CatalogEntry>>>,
    ) -> Self {
        Self {
            catalog_type,
            entries,
        }
    }

    pub fn empty(catalog_type: CatalogType) -> Self {
        Self::new(catalog_type, Arc::new(BTreeMap::new()))
    }

    pub fn catalog_type(&self) -> CatalogType {
        self.catalog_type
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<CatalogEntry>> {
        self.entries.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CatalogEntry>> {
        self.entries.values()
    }
}
