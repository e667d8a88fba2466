//! Test-only helpers: an in-memory `AddressStore` and a SQLite fixture
//! writer used by unit and behaviour tests across the workspace.

use crate::{
    Address, AddressStore, AdvancedQuery, FulltextQuery, HighlightedAddress, QueryError,
    RESULT_CAP, ReverseQuery, SearchHit, haversine_km,
};

/// In-memory `AddressStore` implementation used in tests.
///
/// Matching mimics a prefix index: every query token must prefix some word
/// of the street, house number or city, ignoring case. Results keep
/// insertion order in place of a relevance rank.
#[derive(Default, Debug)]
pub struct MemoryStore {
    addresses: Vec<Address>,
}

impl MemoryStore {
    /// Create a store from a collection of addresses.
    pub fn with_addresses<I>(addresses: I) -> Self
    where
        I: IntoIterator<Item = Address>,
    {
        Self {
            addresses: addresses.into_iter().collect(),
        }
    }

    fn matching(&self, query: &FulltextQuery, limit: usize) -> Vec<&Address> {
        let prefixes = query_prefixes(query);
        self.addresses
            .iter()
            .filter(|address| {
                prefixes.iter().all(|prefix| {
                    columns(address)
                        .iter()
                        .any(|column| column_matches(column, prefix))
                })
            })
            .take(limit)
            .collect()
    }
}

fn query_prefixes(query: &FulltextQuery) -> Vec<String> {
    query
        .match_expression()
        .split(' ')
        .map(|token| token.trim_end_matches('*').to_lowercase())
        .collect()
}

fn columns(address: &Address) -> [&str; 3] {
    [&address.street, &address.house_number, &address.city]
}

fn words(column: &str) -> impl Iterator<Item = &str> {
    column
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
}

fn column_matches(column: &str, prefix: &str) -> bool {
    words(column).any(|word| word.to_lowercase().starts_with(prefix))
}

fn highlight(column: &str, prefixes: &[String]) -> Option<String> {
    let mut matched = false;
    let marked: Vec<String> = column
        .split(' ')
        .map(|word| {
            let lower = word.to_lowercase();
            if prefixes.iter().any(|prefix| lower.starts_with(prefix.as_str())) {
                matched = true;
                format!("<b>{word}</b>")
            } else {
                word.to_owned()
            }
        })
        .collect();
    matched.then(|| marked.join(" "))
}

impl AddressStore for MemoryStore {
    fn fulltext_search(&self, query: &FulltextQuery) -> Result<Vec<Address>, QueryError> {
        Ok(self.matching(query, RESULT_CAP).into_iter().cloned().collect())
    }

    fn find_in_radius(&self, query: &ReverseQuery) -> Result<Vec<Address>, QueryError> {
        let mut near: Vec<(f64, &Address)> = self
            .addresses
            .iter()
            .map(|address| (haversine_km(query.centre(), address.location()), address))
            .filter(|(distance, _)| *distance < query.radius_km())
            .collect();
        near.sort_by(|left, right| left.0.total_cmp(&right.0));
        Ok(near
            .into_iter()
            .take(RESULT_CAP)
            .map(|(_, address)| address.clone())
            .collect())
    }

    fn advanced_search(&self, query: &AdvancedQuery) -> Result<Vec<SearchHit>, QueryError> {
        let prefixes = query_prefixes(query.text());
        Ok(self
            .matching(query.text(), query.limit())
            .into_iter()
            .map(|address| {
                if query.highlight() {
                    SearchHit::Highlighted(HighlightedAddress {
                        address: address.clone(),
                        street_match: highlight(&address.street, &prefixes),
                        house_number_match: highlight(&address.house_number, &prefixes),
                        city_match: highlight(&address.city, &prefixes),
                    })
                } else {
                    SearchHit::Plain(address.clone())
                }
            })
            .collect())
    }
}

/// Write a complete address store (table, index and triggers) to `path`.
///
/// # Errors
/// Returns the underlying `rusqlite` error.
#[cfg(feature = "store-sqlite")]
pub fn write_sqlite_database(
    path: &std::path::Path,
    addresses: &[Address],
) -> Result<(), rusqlite::Error> {
    let mut connection = rusqlite::Connection::open(path)?;
    let transaction = connection.transaction()?;
    crate::store::schema::create_schema(&transaction)?;
    {
        let mut statement = transaction.prepare(
            "INSERT INTO addresses (id, street, house_number, city, longitude, latitude)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for address in addresses {
            statement.execute((
                address.id,
                &address.street,
                &address.house_number,
                &address.city,
                address.longitude,
                address.latitude,
            ))?;
        }
    }
    transaction.commit()
}

/// Write a SQLite file that lacks the `address_fts` index.
///
/// # Errors
/// Returns the underlying `rusqlite` error.
#[cfg(feature = "store-sqlite")]
pub fn write_database_without_index(path: &std::path::Path) -> Result<(), rusqlite::Error> {
    let connection = rusqlite::Connection::open(path)?;
    connection.execute_batch(crate::store::schema::ADDRESSES_TABLE_SQL)
}
