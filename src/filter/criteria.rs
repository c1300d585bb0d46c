//! Query criteria understood by the filter engine.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::catalog_store::RoomKey;

/// Query parameter carrying the free-text search.
pub const TEXT_QUERY_PARAM: &str = "q";

/// Value meaning "no filter" on a category field.
const MATCH_ALL_VALUE: &str = "all";

/// Filter criteria: an optional free-text substring plus category equalities,
/// all combined with logical AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub equals: BTreeMap<String, String>,
}

impl Criteria {
    /// Criteria matching everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_equal(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.equals.insert(field.into(), value.into());
        self
    }

    /// Criteria selecting the entries of a room's partition.
    pub fn for_room(room: &RoomKey) -> Self {
        let field = room.catalog_type.schema().partition_attribute;
        Self::all().with_equal(field, room.partition.clone())
    }

    /// Build criteria from HTTP query parameters.
    ///
    /// `q` is the free-text search; every other parameter is a category
    /// equality. Empty values and `all` mean no filter.
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        let mut criteria = Self::all();
        for (key, value) in params {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            if key == TEXT_QUERY_PARAM {
                criteria.text = Some(value.to_string());
            } else if !value.eq_ignore_ascii_case(MATCH_ALL_VALUE) {
                criteria.equals.insert(key.clone(), value.to_string());
            }
        }
        criteria
    }

    /// Lowercased search text, `None` when blank.
    pub(crate) fn normalized_text(&self) -> Option<String> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
    }
}
