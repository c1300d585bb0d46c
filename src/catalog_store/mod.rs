mod load;
mod models;
mod schema;
mod store;
mod trait_def;
mod validation;

pub use load::{apply_seed, load_seed, read_seed_file, SeedReport};
pub use models::*;
pub use schema::{CatalogSchema, EntryOrdering};
pub use store::InMemoryCatalogStore;
pub use trait_def::{CatalogError, CatalogStore, ChangeListener};
pub use validation::{validate_entry, ValidationError, ValidationResult};
