//! CatalogStore trait definition.
//!
//! The store is the only mutation path into the catalog. Collaborators call
//! `upsert` and `delete`; everything else reads snapshots.

use thiserror::Error;

use super::models::{Attributes, CatalogChange, CatalogEntry, CatalogSnapshot, CatalogType, Version};
use super::validation::ValidationError;

/// Errors returned by catalog operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{catalog_type} '{id}' not found")]
    NotFound { catalog_type: CatalogType, id: String },
}

/// Receives every committed mutation.
///
/// Called while the mutated id is still serialized, so implementations must
/// hand the change off without blocking.
pub trait ChangeListener: Send + Sync {
    fn on_change(&self, change: CatalogChange);
}

/// Trait for catalog storage backends.
pub trait CatalogStore: Send + Sync {
    /// Insert or replace an entry. Returns the committed version.
    fn upsert(
        &self,
        catalog_type: CatalogType,
        id: &str,
        attributes: Attributes,
    ) -> Result<Version, CatalogError>;

    /// Delete an entry. Fails with `NotFound` if absent.
    fn delete(&self, catalog_type: CatalogType, id: &str) -> Result<(), CatalogError>;

    /// Get an entry by id.
    fn get(&self, catalog_type: CatalogType, id: &str) -> Result<CatalogEntry, CatalogError>;

    /// Point-in-time copy of one catalog.
    fn list_snapshot(&self, catalog_type: CatalogType) -> CatalogSnapshot;

    /// Number of live entries in one catalog.
    fn count(&self, catalog_type: CatalogType) -> usize {
        self.list_snapshot(catalog_type).len()
    }
}
