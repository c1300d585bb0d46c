//! Per catalog type schema: required fields, searchable text, partitioning and ordering.

use std::cmp::Ordering;

use super::models::{CatalogEntry, CatalogType};

/// Fixed result ordering of a catalog type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryOrdering {
    /// Most recently updated first.
    NewestUpdatedFirst,
    /// Ascending, case-insensitive, on the given text attribute.
    TextAscending(&'static str),
}

/// Static description of one catalog type.
#[derive(Debug)]
pub struct CatalogSchema {
    pub catalog_type: CatalogType,
    pub required_fields: &'static [&'static str],
    /// Fields matched by free-text search.
    pub text_fields: &'static [&'static str],
    /// Attribute whose value is the entry's partition key.
    pub partition_attribute: &'static str,
    /// Fields that must hold non-negative numbers.
    pub non_negative_fields: &'static [&'static str],
    pub ordering: EntryOrdering,
}

static PRICE_SCHEMA: CatalogSchema = CatalogSchema {
    catalog_type: CatalogType::Price,
    required_fields: &["crop", "category", "price", "region"],
    text_fields: &["crop", "market"],
    partition_attribute: "region",
    non_negative_fields: &["price"],
    ordering: EntryOrdering::NewestUpdatedFirst,
};

static LISTING_SCHEMA: CatalogSchema = CatalogSchema {
    catalog_type: CatalogType::Listing,
    required_fields: &["name", "category", "type", "price"],
    text_fields: &["name", "description"],
    partition_attribute: "category",
    non_negative_fields: &["price"],
    ordering: EntryOrdering::NewestUpdatedFirst,
};

static SCHEME_SCHEMA: CatalogSchema = CatalogSchema {
    catalog_type: CatalogType::Scheme,
    required_fields: &["name", "category", "description"],
    text_fields: &["name", "description"],
    partition_attribute: "category",
    non_negative_fields: &[],
    ordering: EntryOrdering::TextAscending("name"),
};

static EXPERT_SCHEMA: CatalogSchema = CatalogSchema {
    catalog_type: CatalogType::Expert,
    required_fields: &["name", "category", "specialization"],
    text_fields: &["name", "specialization"],
    partition_attribute: "category",
    non_negative_fields: &[],
    ordering: EntryOrdering::TextAscending("name"),
};

static RESOURCE_SCHEMA: CatalogSchema = CatalogSchema {
    catalog_type: CatalogType::Resource,
    required_fields: &["title", "category", "type"],
    text_fields: &["title", "description"],
    partition_attribute: "category",
    non_negative_fields: &[],
    ordering: EntryOrdering::TextAscending("title"),
};

impl CatalogType {
    pub fn schema(&self) -> &'static CatalogSchema {
        match self {
            CatalogType::Price => &PRICE_SCHEMA,
            CatalogType::Listing => &LISTING_SCHEMA,
            CatalogType::Scheme => &SCHEME_SCHEMA,
            CatalogType::Expert => &EXPERT_SCHEMA,
            CatalogType::Resource => &RESOURCE_SCHEMA,
        }
    }
}

impl CatalogSchema {
    /// Partition key of an entry of this type, if its partition attribute is a scalar.
    pub fn partition_of(&self, entry: &CatalogEntry) -> Option<String> {
        entry.scalar_attribute(self.partition_attribute)
    }

    /// Total order over entries of this type. Ties are broken by id.
    pub fn compare(&self, a: &CatalogEntry, b: &CatalogEntry) -> Ordering {
        let primary = match self.ordering {
            EntryOrdering::NewestUpdatedFirst => b.updated_at.cmp(&a.updated_at),
            EntryOrdering::TextAscending(field) => {
                let left = a.text_attribute(field).to_lowercase();
                let right = b.text_attribute(field).to_lowercase();
                left.cmp(&right)
            }
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}
