//! Core domain types for the address lookup service.
//!
//! The crate owns the address model, the query normalisation rules, the
//! haversine distance used for reverse geocoding and the [`AddressStore`]
//! abstraction the HTTP layer queries. Query types validate their input in
//! their constructors so an invalid request never reaches a store.

#![forbid(unsafe_code)]

mod address;
mod distance;
pub mod engine;
mod error;
mod query;
pub mod store;
pub mod test_support;

pub use address::{Address, CitySummary, HighlightedAddress, SearchHit};
pub use distance::{EARTH_RADIUS_KM, haversine_km};
pub use engine::{advanced_search, fulltext_search, reverse_geocode};
pub use error::{QueryError, ValidationError};
pub use query::{
    ADVANCED_DEFAULT_LIMIT, ADVANCED_MAX_LIMIT, AdvancedQuery, DEFAULT_RADIUS_KM,
    DEFAULT_REVERSE_LIMIT, FulltextQuery, MAX_RADIUS_KM, MAX_REVERSE_LIMIT, RESULT_CAP,
    ReverseQuery, apply_client_limit, normalise_query,
};
pub use store::AddressStore;

#[cfg(feature = "store-sqlite")]
pub use store::{SqliteAddressStore, StoreInitError};
