//! Data access traits for persisted addresses.
//!
//! The `AddressStore` trait defines the read-only queries the service runs
//! against whatever store is currently live. Implementations enforce the
//! row caps; callers never see unbounded result sets.

use crate::{Address, AdvancedQuery, FulltextQuery, QueryError, ReverseQuery, SearchHit};

#[cfg(feature = "store-sqlite")]
pub mod schema;
#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use sqlite::{SqliteAddressStore, StoreInitError};

/// Read-only access to persisted addresses.
///
/// # Examples
///
/// ```rust
/// use address_core::test_support::MemoryStore;
/// use address_core::{Address, AddressStore, FulltextQuery};
///
/// let store = MemoryStore::with_addresses([Address::new(
///     1, "Hauptstraße", "12", "Berlin", 13.4, 52.5,
/// )]);
/// let query = FulltextQuery::new("Haupt, 12").expect("valid query");
/// let found = store.fulltext_search(&query).expect("query succeeds");
/// assert_eq!(found[0].street, "Hauptstraße");
/// ```
pub trait AddressStore {
    /// Up to [`RESULT_CAP`](crate::RESULT_CAP) addresses ordered by
    /// relevance, best match first.
    ///
    /// # Errors
    /// Returns [`QueryError::StoreUnavailable`] when the backend fails.
    fn fulltext_search(&self, query: &FulltextQuery) -> Result<Vec<Address>, QueryError>;

    /// Up to [`RESULT_CAP`](crate::RESULT_CAP) addresses whose haversine
    /// distance from the query centre is strictly below the radius, nearest
    /// first. The caller's limit is not applied here.
    ///
    /// # Errors
    /// Returns [`QueryError::StoreUnavailable`] when the backend fails.
    fn find_in_radius(&self, query: &ReverseQuery) -> Result<Vec<Address>, QueryError>;

    /// Relevance-ranked hits, highlighted when the query asks for it.
    ///
    /// # Errors
    /// Returns [`QueryError::StoreUnavailable`] when the backend fails.
    fn advanced_search(&self, query: &AdvancedQuery) -> Result<Vec<SearchHit>, QueryError>;
}
