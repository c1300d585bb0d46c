//! Seeding the catalog at startup from a JSON file.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::models::{CatalogType, EntryPayload};
use super::trait_def::{CatalogError, CatalogStore};

/// Outcome of applying a seed file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub applied: usize,
    pub skipped: usize,
}

/// Read a seed file containing a JSON array of entry payloads.
pub fn read_seed_file(path: &Path) -> Result<Vec<EntryPayload>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse seed file: {:?}", path))
}

/// Upsert every payload into the store. Invalid payloads are logged and skipped.
pub fn apply_seed(store: &dyn CatalogStore, payloads: Vec<EntryPayload>) -> SeedReport {
    let mut report = SeedReport::default();
    for payload in payloads {
        let result = payload
            .catalog_type
            .parse::<CatalogType>()
            .map_err(CatalogError::from)
            .and_then(|catalog_type| store.upsert(catalog_type, &payload.id, payload.attributes));
        match result {
            Ok(_) => report.applied += 1,
            Err(e) => {
                warn!(
                    "Skipping seed entry {} '{}': {}",
                    payload.catalog_type, payload.id, e
                );
                report.skipped += 1;
            }
        }
    }
    info!(
        "Seeded catalog: {} entries applied, {} skipped",
        report.applied, report.skipped
    );
    report
}

/// Read a seed file and apply it to the store.
pub fn load_seed(store: &dyn CatalogStore, path: &Path) -> Result<SeedReport> {
    let payloads = read_seed_file(path)?;
    Ok(apply_seed(store, payloads))
}
