//! Catalog HTTP routes.
//!
//! The write side of the catalog: collaborators create, replace and delete
//! entries here, and every committed write is broadcast to the rooms it
//! touches. Reads go through the filter engine.
//!
//! - GET /{type}?q=&<attr>=<value>
//! - GET /{type}/{id}
//! - POST /{type}
//! - PUT /{type}/{id}
//! - DELETE /{type}/{id}

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog_store::{Attributes, CatalogError, CatalogType, Version};
use crate::filter::{self, Criteria};
use crate::server::state::{GuardedCatalogStore, ServerState};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateEntryBody {
    /// Generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEntryBody {
    #[serde(default)]
    pub attributes: Attributes,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MutationResponse {
    pub id: String,
    pub version: Version,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

fn catalog_error_response(err: CatalogError) -> Response {
    match &err {
        CatalogError::Validation(_) => error_response(StatusCode::BAD_REQUEST, err.to_string()),
        CatalogError::NotFound { .. } => error_response(StatusCode::NOT_FOUND, err.to_string()),
    }
}

fn parse_catalog_type(raw: &str) -> Result<CatalogType, Response> {
    raw.parse::<CatalogType>()
        .map_err(|e| catalog_error_response(CatalogError::from(e)))
}

// =============================================================================
// Handlers
// =============================================================================

async fn list_entries(
    State(store): State<GuardedCatalogStore>,
    Path(catalog_type): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let catalog_type = match parse_catalog_type(&catalog_type) {
        Ok(t) => t,
        Err(response) => return response,
    };
    let criteria = Criteria::from_query(&params);
    let entries = filter::apply(&store.list_snapshot(catalog_type), &criteria);
    debug!(
        "Listing {} {} entries for {:?}",
        entries.len(),
        catalog_type,
        criteria
    );
    Json(entries).into_response()
}

async fn get_entry(
    State(store): State<GuardedCatalogStore>,
    Path((catalog_type, id)): Path<(String, String)>,
) -> Response {
    let catalog_type = match parse_catalog_type(&catalog_type) {
        Ok(t) => t,
        Err(response) => return response,
    };
    match store.get(catalog_type, &id) {
        Ok(entry) => Json(entry).into_response(),
        Err(err) => catalog_error_response(err),
    }
}

async fn create_entry(
    State(store): State<GuardedCatalogStore>,
    Path(catalog_type): Path<String>,
    Json(body): Json<CreateEntryBody>,
) -> Response {
    let catalog_type = match parse_catalog_type(&catalog_type) {
        Ok(t) => t,
        Err(response) => return response,
    };
    let id = body
        .id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    match store.upsert(catalog_type, &id, body.attributes) {
        Ok(version) => (StatusCode::CREATED, Json(MutationResponse { id, version })).into_response(),
        Err(err) => catalog_error_response(err),
    }
}

async fn update_entry(
    State(store): State<GuardedCatalogStore>,
    Path((catalog_type, id)): Path<(String, String)>,
    Json(body): Json<UpdateEntryBody>,
) -> Response {
    let catalog_type = match parse_catalog_type(&catalog_type) {
        Ok(t) => t,
        Err(response) => return response,
    };
    match store.upsert(catalog_type, &id, body.attributes) {
        Ok(version) => Json(MutationResponse { id, version }).into_response(),
        Err(err) => catalog_error_response(err),
    }
}

async fn delete_entry(
    State(store): State<GuardedCatalogStore>,
    Path((catalog_type, id)): Path<(String, String)>,
) -> Response {
    let catalog_type = match parse_catalog_type(&catalog_type) {
        Ok(t) => t,
        Err(response) => return response,
    };
    match store.delete(catalog_type, &id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => catalog_error_response(err),
    }
}

// =============================================================================
// Router Construction
// =============================================================================

/// Build the catalog routes, to be nested under `/v1/catalog`.
pub fn catalog_routes() -> Router<ServerState> {
    Router::new()
        .route("/{catalog_type}", get(list_entries).post(create_entry))
        .route(
            "/{catalog_type}/{id}",
            get(get_entry).put(update_entry).delete(delete_entry),
        )
}
