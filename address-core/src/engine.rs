//! Query entry points used by the HTTP layer.
//!
//! Each function takes an already validated request, so input errors are
//! rejected before a store is touched. Stores return at most
//! [`RESULT_CAP`](crate::RESULT_CAP) rows; [`reverse_geocode`] applies the
//! caller's limit on top of that.

use crate::{
    Address, AddressStore, AdvancedQuery, FulltextQuery, QueryError, ReverseQuery, SearchHit,
    apply_client_limit,
};

/// Relevance-ranked fulltext search, best match first.
///
/// # Errors
/// Propagates [`QueryError`] from the store.
pub fn fulltext_search<S>(store: &S, query: &FulltextQuery) -> Result<Vec<Address>, QueryError>
where
    S: AddressStore + ?Sized,
{
    store.fulltext_search(query)
}

/// Addresses strictly within the radius, nearest first, cut to the limit.
///
/// # Errors
/// Propagates [`QueryError`] from the store.
///
/// # Examples
/// ```
/// use address_core::test_support::MemoryStore;
/// use address_core::{Address, ReverseQuery, reverse_geocode};
///
/// # fn main() -> Result<(), address_core::QueryError> {
/// let store = MemoryStore::with_addresses([
///     Address::new(1, "Rathausstraße", "1", "Berlin", 13.4060, 52.5205),
///     Address::new(2, "Fernweg", "9", "Berlin", 13.50, 52.60),
/// ]);
/// let query = ReverseQuery::new(52.5200, 13.4050, 1.0, 10)?;
/// let found = reverse_geocode(&store, &query)?;
/// assert_eq!(found.len(), 1);
/// assert_eq!(found[0].id, 1);
/// # Ok(())
/// # }
/// ```
pub fn reverse_geocode<S>(store: &S, query: &ReverseQuery) -> Result<Vec<Address>, QueryError>
where
    S: AddressStore + ?Sized,
{
    let mut addresses = store.find_in_radius(query)?;
    apply_client_limit(&mut addresses, query.limit());
    Ok(addresses)
}

/// Fulltext search with optional match highlighting.
///
/// # Errors
/// Propagates [`QueryError`] from the store.
pub fn advanced_search<S>(store: &S, query: &AdvancedQuery) -> Result<Vec<SearchHit>, QueryError>
where
    S: AddressStore + ?Sized,
{
    store.advanced_search(query)
}
