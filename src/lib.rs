//! Facade crate for the address lookup service.
//!
//! This crate re-exports the core domain types and, behind feature flags,
//! the SQLite-backed store and the lifecycle manager that swaps it.

#![forbid(unsafe_code)]

pub use address_core::{
    Address, AddressStore, AdvancedQuery, CitySummary, FulltextQuery, HighlightedAddress,
    QueryError, ReverseQuery, SearchHit, ValidationError, advanced_search, fulltext_search,
    haversine_km, normalise_query, reverse_geocode,
};

#[cfg(feature = "store-sqlite")]
pub use address_core::{SqliteAddressStore, StoreInitError};

#[cfg(feature = "lifecycle")]
pub use address_data::{LifecycleState, ReplaceError, StartupError, StoreManager};
