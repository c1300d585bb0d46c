//! Filter engine.
//!
//! A pure projection of a catalog snapshot against query criteria. Results
//! are ordered by the catalog type's comparator, never by storage order.

mod criteria;

use std::sync::Arc;

pub use criteria::{Criteria, TEXT_QUERY_PARAM};

use crate::catalog_store::{CatalogEntry, CatalogSchema, CatalogSnapshot};

/// Apply `criteria` to `snapshot`, returning matching entries in the type's order.
pub fn apply(snapshot: &CatalogSnapshot, criteria: &Criteria) -> Vec<Arc<CatalogEntry>> {
    let schema = snapshot.catalog_type().schema();
    let text = criteria.normalized_text();

    let mut matches: Vec<Arc<CatalogEntry>> = snapshot
        .iter()
        .filter(|entry| matches_entry(schema, entry, text.as_deref(), criteria))
        .cloned()
        .collect();
    matches.sort_by(|a, b| schema.compare(a, b));
    matches
}

fn matches_entry(
    schema: &CatalogSchema,
    entry: &CatalogEntry,
    text: Option<&str>,
    criteria: &Criteria,
) -> bool {
    if let Some(text) = text {
        let found = schema
            .text_fields
            .iter()
            .any(|field| entry.text_attribute(field).to_lowercase().contains(text));
        if !found {
            return false;
        }
    }

    criteria
        .equals
        .iter()
        .all(|(field, value)| entry.scalar_attribute(field).as_deref() == Some(value.as_str()))
}
