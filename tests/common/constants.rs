//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When the seeded catalog changes, update only this file.

// ============================================================================
// Seeded Catalog IDs
// ============================================================================

/// Wheat price in region "Punjab"
pub const PRICE_WHEAT_ID: &str = "price-wheat-punjab";

/// Rice price in region "Punjab"
pub const PRICE_RICE_ID: &str = "price-rice-punjab";

/// Onion price in region "Maharashtra"
pub const PRICE_ONION_ID: &str = "price-onion-maharashtra";

/// Crop insurance scheme in category "insurance"
pub const SCHEME_INSURANCE_ID: &str = "scheme-pmfby";

/// Tractor listing in category "equipment"
pub const LISTING_TRACTOR_ID: &str = "listing-tractor";

// ============================================================================
// Seeded Partitions
// ============================================================================

pub const REGION_PUNJAB: &str = "Punjab";

pub const REGION_MAHARASHTRA: &str = "Maharashtra";

/// Scheme category with no seeded entries
pub const SCHEME_EMPTY_CATEGORY: &str = "financial";

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// Time to wait for an expected WebSocket message (milliseconds)
pub const WS_MESSAGE_TIMEOUT_MS: u64 = 3000;

/// Time to wait when asserting that no WebSocket message arrives (milliseconds)
pub const WS_SILENCE_TIMEOUT_MS: u64 = 300;
