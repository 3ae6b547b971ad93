//! Depo Orders
//!
//! Warehouse-side tracking for marketplace orders.
//!
//! ## Features
//! - Order file merged from the integration API, keeping local edits
//! - Status, platform, carrier and date filtering
//! - Pick lists grouped by product with per-marketplace breakdown
//! - Shelf location registry
//! - Finalize, cancel and archive workflows

use thiserror::Error;

pub mod config;
pub mod domain;
pub mod fetch;
pub mod filter;
pub mod http;
pub mod locations;
pub mod picklist;
pub mod service;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{Config, ConfigError, FetchConfig};
pub use domain::aggregates::{LineItem, Order, Urgency};
pub use domain::value_objects::{DateRange, StatusBucket, StatusKeywords};
pub use fetch::{fetch_all, EntegraClient, FetchError, OrderSource};
pub use filter::OrderFilter;
pub use locations::{LocationError, LocationRegistry};
pub use picklist::{aggregate, outstanding, PicklistEntry, PicklistQuery};
pub use service::{Finalize, Outcome, Warehouse};
pub use store::{merge, DoneSet, OrderStore, StoreError, StorePaths};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum DepoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
}

pub type Result<T> = std::result::Result<T, DepoError>;
