//! Validation for catalog entries.
//!
//! Ensures an entry satisfies its type's required-field schema before the
//! store commits it. Failures leave the store untouched.

use thiserror::Error;

use super::models::{scalar_to_string, Attributes, CatalogType};

/// Validation error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Unknown catalog type '{0}'")]
    UnknownCatalogType(String),

    #[error("Field '{field}' is required but was missing")]
    MissingField { field: &'static str },

    #[error("Field '{field}' is required but was empty")]
    EmptyField { field: &'static str },

    #[error("Field '{field}' must be a number")]
    NotANumber { field: &'static str },

    #[error("Field '{field}' must be non-negative, got {value}")]
    NegativeValue { field: &'static str, value: f64 },

    #[error("Partition field '{field}' must be a non-empty string, number or boolean")]
    InvalidPartition { field: &'static str },
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate an entry against its type's schema.
///
/// Returns the partition key the entry resolves to.
pub fn validate_entry(
    catalog_type: CatalogType,
    id: &str,
    attributes: &Attributes,
) -> ValidationResult<String> {
    if id.trim().is_empty() {
        return Err(ValidationError::EmptyField { field: "id" });
    }

    let schema = catalog_type.schema();
    for &field in schema.required_fields {
        match attributes.get(field) {
            None | Some(serde_json::Value::Null) => {
                return Err(ValidationError::MissingField { field });
            }
            Some(serde_json::Value::String(s)) if s.trim().is_empty() => {
                return Err(ValidationError::EmptyField { field });
            }
            Some(_) => {}
        }
    }

    for &field in schema.non_negative_fields {
        let Some(value) = attributes.get(field) else {
            continue;
        };
        let number = value
            .as_f64()
            .ok_or(ValidationError::NotANumber { field })?;
        if number < 0.0 {
            return Err(ValidationError::NegativeValue {
                field,
                value: number,
            });
        }
    }

    let field = schema.partition_attribute;
    attributes
        .get(field)
        .and_then(scalar_to_string)
        .filter(|p| !p.trim().is_empty())
        .ok_or(ValidationError::InvalidPartition { field })
}
