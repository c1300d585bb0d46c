//! Test fixture creation
//!
//! Writes a seed file with a small, known catalog that every test server
//! loads at startup.

use super::constants::*;
use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;
use tempfile::TempDir;

/// Creates a temporary seed file.
/// Returns (temp_dir, seed_path)
///
/// Contents: 3 prices (2 in Punjab, 1 in Maharashtra), 1 insurance scheme,
/// 1 equipment listing, and one invalid entry that loading must skip.
pub fn create_test_seed() -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new()?;
    let seed_path = dir.path().join("seed.json");

    let entries = json!([
        {
            "id": PRICE_WHEAT_ID,
            "catalog_type": "price",
            "attributes": {
                "crop": "Wheat",
                "category": "grains",
                "price": 2275,
                "region": REGION_PUNJAB,
                "market": "Khanna Mandi"
            }
        },
        {
            "id": PRICE_RICE_ID,
            "catalog_type": "price",
            "attributes": {
                "crop": "Rice",
                "category": "grains",
                "price": 3100,
                "region": REGION_PUNJAB,
                "market": "Ludhiana"
            }
        },
        {
            "id": PRICE_ONION_ID,
            "catalog_type": "price",
            "attributes": {
                "crop": "Onion",
                "category": "vegetables",
                "price": 1800,
                "region": REGION_MAHARASHTRA,
                "market": "Lasalgaon"
            }
        },
        {
            "id": SCHEME_INSURANCE_ID,
            "catalog_type": "scheme",
            "attributes": {
                "name": "Crop Insurance Scheme",
                "category": "insurance",
                "description": "Insurance cover against crop loss"
            }
        },
        {
            "id": LISTING_TRACTOR_ID,
            "catalog_type": "listing",
            "attributes": {
                "name": "Used Tractor 45HP",
                "category": "equipment",
                "type": "sale",
                "price": 350000,
                "description": "Well maintained, single owner"
            }
        },
        {
            "id": "broken-entry",
            "catalog_type": "weather",
            "attributes": {}
        }
    ]);

    std::fs::write(&seed_path, serde_json::to_vec_pretty(&entries)?)?;
    Ok((dir, seed_path))
}
