//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all sync-server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP test client
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    // ========================================================================
    // Server Endpoints
    // ========================================================================

    /// GET / - server stats
    pub async fn get_stats(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Get stats request failed")
    }

    // ========================================================================
    // Catalog Endpoints
    // ========================================================================

    /// GET /v1/catalog/{type}?<query>
    pub async fn list_entries(&self, catalog_type: &str, query: &[(&str, &str)]) -> Response {
        self.client
            .get(format!("{}/v1/catalog/{}", self.base_url, catalog_type))
            .query(query)
            .send()
            .await
            .expect("List entries request failed")
    }

    /// GET /v1/catalog/{type}/{id}
    pub async fn get_entry(&self, catalog_type: &str, id: &str) -> Response {
        self.client
            .get(format!("{}/v1/catalog/{}/{}", self.base_url, catalog_type, id))
            .send()
            .await
            .expect("Get entry request failed")
    }

    /// POST /v1/catalog/{type}
    pub async fn create_entry(
        &self,
        catalog_type: &str,
        id: Option<&str>,
        attributes: Value,
    ) -> Response {
        let mut body = json!({ "attributes": attributes });
        if let Some(id) = id {
            body["id"] = json!(id);
        }
        self.client
            .post(format!("{}/v1/catalog/{}", self.base_url, catalog_type))
            .json(&body)
            .send()
            .await
            .expect("Create entry request failed")
    }

    /// PUT /v1/catalog/{type}/{id}
    pub async fn put_entry(&self, catalog_type: &str, id: &str, attributes: Value) -> Response {
        self.client
            .put(format!("{}/v1/catalog/{}/{}", self.base_url, catalog_type, id))
            .json(&json!({ "attributes": attributes }))
            .send()
            .await
            .expect("Put entry request failed")
    }

    /// DELETE /v1/catalog/{type}/{id}
    pub async fn delete_entry(&self, catalog_type: &str, id: &str) -> Response {
        self.client
            .delete(format!("{}/v1/catalog/{}/{}", self.base_url, catalog_type, id))
            .send()
            .await
            .expect("Delete entry request failed")
    }

    /// PUT a price entry with the fields every price needs.
    pub async fn put_price(&self, id: &str, crop: &str, region: &str, price: i64) -> Response {
        self.put_entry(
            "price",
            id,
            json!({
                "crop": crop,
                "category": "grains",
                "price": price,
                "region": region,
            }),
        )
        .await
    }
}
