//! SQLite-backed store implementation for persisted addresses.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use geo::Coord;
use log::info;
use parking_lot::Mutex;
use rusqlite::{
    Connection, ErrorCode, OpenFlags, OptionalExtension, Row, functions::FunctionFlags,
};
use thiserror::Error;

use crate::{
    Address, AddressStore, AdvancedQuery, CitySummary, FulltextQuery, HighlightedAddress,
    QueryError, RESULT_CAP, ReverseQuery, SearchHit, ValidationError, haversine_km,
};

use super::schema::{ADDRESSES_TABLE, FTS_INDEX, PRAGMAS, apply_pragma, table_exists};

/// Marker FTS5 `highlight()` places in front of a matched span.
const HIGHLIGHT_OPEN: &str = "<b>";
/// Marker FTS5 `highlight()` places after a matched span.
const HIGHLIGHT_CLOSE: &str = "</b>";

/// Largest page size honoured by [`SqliteAddressStore::addresses_by_city`].
const MAX_PAGE_SIZE: usize = 1000;
/// Page size used when the caller's value is out of range.
const DEFAULT_PAGE_SIZE: usize = 100;
/// Number of cities reported by [`SqliteAddressStore::city_summary`].
const CITY_SUMMARY_LIMIT: i64 = 1000;

/// Error raised when a store file cannot be brought into service.
#[derive(Debug, Error)]
pub enum StoreInitError {
    /// Opening the SQLite database failed.
    #[error("failed to open database at {path}: {source}")]
    Open {
        /// Location of the SQLite database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A tuning pragma was rejected.
    #[error("failed to set pragma {pragma}: {source}")]
    Pragma {
        /// Pragma statement that failed.
        pragma: String,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// The distance function could not be registered on the connection.
    #[error("failed to register SQL function {name}: {source}")]
    RegisterFunction {
        /// Function name.
        name: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Reading `sqlite_master` failed.
    #[error("failed to inspect database schema: {source}")]
    Inspect {
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A required table or index is absent.
    #[error("database is missing required table {object}")]
    MissingSchema {
        /// Name of the absent object.
        object: &'static str,
    },
}

/// Address store backed by a single SQLite connection.
///
/// The connection is not `Sync`, so queries on one store are serialised by
/// an internal mutex. Dropping the store closes the connection.
pub struct SqliteAddressStore {
    connection: Mutex<Connection>,
    path: PathBuf,
}

impl fmt::Debug for SqliteAddressStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteAddressStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteAddressStore {
    /// Open and initialise the store at `path`.
    ///
    /// The file must already exist. Every pragma in
    /// [`PRAGMAS`](super::schema::PRAGMAS) is applied and the schema must
    /// contain the address table and its fulltext index.
    ///
    /// # Errors
    /// Returns a [`StoreInitError`] describing the first failed step.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreInitError> {
        let path = path.as_ref();
        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| StoreInitError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        for (name, value) in PRAGMAS {
            apply_pragma(&connection, name, value).map_err(|source| StoreInitError::Pragma {
                pragma: format!("{name} = {value}"),
                source,
            })?;
        }
        register_distance_function(&connection)?;
        ensure_schema(&connection)?;

        info!("address store at {} initialised", path.display());
        Ok(Self {
            connection: Mutex::new(connection),
            path: path.to_path_buf(),
        })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the connection, reporting a failed close.
    ///
    /// # Errors
    /// Returns the `rusqlite` error raised by `sqlite3_close`; the
    /// connection is released either way.
    pub fn close(self) -> Result<(), rusqlite::Error> {
        self.connection
            .into_inner()
            .close()
            .map_err(|(_, source)| source)
    }

    /// Look up a single address by identifier.
    ///
    /// # Errors
    /// Returns [`QueryError::StoreUnavailable`] when the query fails.
    pub fn address_by_id(&self, id: i64) -> Result<Option<Address>, QueryError> {
        let connection = self.connection.lock();
        connection
            .query_row(
                "SELECT id, street, house_number, city, longitude, latitude
                 FROM addresses WHERE id = ?1",
                [id],
                address_from_row,
            )
            .optional()
            .map_err(|source| QueryError::store("get address by id", source))
    }

    /// Filter by street prefix, exact house number and city prefix.
    ///
    /// Absent or empty fields do not constrain the result. At most
    /// [`RESULT_CAP`] rows are returned.
    ///
    /// # Errors
    /// Returns [`QueryError::StoreUnavailable`] when the query fails.
    pub fn search_by_fields(
        &self,
        street: Option<&str>,
        house_number: Option<&str>,
        city: Option<&str>,
    ) -> Result<Vec<Address>, QueryError> {
        let mut sql = String::from(
            "SELECT id, street, house_number, city, longitude, latitude
             FROM addresses WHERE 1=1",
        );
        let mut params: Vec<String> = Vec::new();
        if let Some(prefix) = street.filter(|value| !value.is_empty()) {
            sql.push_str(" AND street LIKE ?");
            params.push(format!("{prefix}%"));
        }
        if let Some(number) = house_number.filter(|value| !value.is_empty()) {
            sql.push_str(" AND house_number = ?");
            params.push(number.to_owned());
        }
        if let Some(prefix) = city.filter(|value| !value.is_empty()) {
            sql.push_str(" AND city LIKE ?");
            params.push(format!("{prefix}%"));
        }
        sql.push_str(&format!(" LIMIT {RESULT_CAP}"));

        let connection = self.connection.lock();
        collect_addresses(
            &connection,
            &sql,
            rusqlite::params_from_iter(params.iter()),
            "search query",
        )
    }

    /// One page of the addresses of `city`.
    ///
    /// Pages start at 1; smaller values are treated as 1. A page size outside
    /// `1..=1000` falls back to 100.
    ///
    /// # Errors
    /// Returns [`QueryError::StoreUnavailable`] when the query fails.
    pub fn addresses_by_city(
        &self,
        city: &str,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<Address>, QueryError> {
        let size = usize::try_from(page_size)
            .ok()
            .filter(|size| (1..=MAX_PAGE_SIZE).contains(size))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let limit = cap_param(size);
        let offset = (page.max(1) - 1).saturating_mul(limit);

        let connection = self.connection.lock();
        collect_addresses(
            &connection,
            "SELECT id, street, house_number, city, longitude, latitude
             FROM addresses WHERE city = ?1 LIMIT ?2 OFFSET ?3",
            (city, limit, offset),
            "get addresses by city",
        )
    }

    /// Total number of stored addresses.
    ///
    /// # Errors
    /// Returns [`QueryError::StoreUnavailable`] when the query fails.
    pub fn address_count(&self) -> Result<i64, QueryError> {
        let connection = self.connection.lock();
        connection
            .query_row("SELECT COUNT(*) FROM addresses", [], |row| row.get(0))
            .map_err(|source| QueryError::store("count query", source))
    }

    /// Address count per city for the thousand largest cities.
    ///
    /// # Errors
    /// Returns [`QueryError::StoreUnavailable`] when the query fails.
    pub fn city_summary(&self) -> Result<CitySummary, QueryError> {
        let connection = self.connection.lock();
        let wrap = |source| QueryError::store("city summary query", source);
        let mut statement = connection
            .prepare(
                "SELECT city, COUNT(*) AS count FROM addresses
                 GROUP BY city ORDER BY count DESC LIMIT ?1",
            )
            .map_err(wrap)?;
        let rows = statement
            .query_map([CITY_SUMMARY_LIMIT], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(wrap)?;
        rows.collect::<Result<CitySummary, _>>().map_err(wrap)
    }
}

impl AddressStore for SqliteAddressStore {
    fn fulltext_search(&self, query: &FulltextQuery) -> Result<Vec<Address>, QueryError> {
        let connection = self.connection.lock();
        collect_matches(
            &connection,
            "SELECT a.id, a.street, a.house_number, a.city, a.longitude, a.latitude
             FROM address_fts
             JOIN addresses a ON address_fts.rowid = a.id
             WHERE address_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
            (query.match_expression(), cap_param(RESULT_CAP)),
            "fulltext search",
        )
    }

    fn find_in_radius(&self, query: &ReverseQuery) -> Result<Vec<Address>, QueryError> {
        let centre = query.centre();
        let connection = self.connection.lock();
        collect_addresses(
            &connection,
            "SELECT id, street, house_number, city, longitude, latitude
             FROM (
                 SELECT id, street, house_number, city, longitude, latitude,
                        haversine_km(?1, ?2, latitude, longitude) AS distance
                 FROM addresses
             )
             WHERE distance < ?3
             ORDER BY distance
             LIMIT ?4",
            (centre.y, centre.x, query.radius_km(), cap_param(RESULT_CAP)),
            "radius search",
        )
    }

    fn advanced_search(&self, query: &AdvancedQuery) -> Result<Vec<SearchHit>, QueryError> {
        let connection = self.connection.lock();
        let limit = cap_param(query.limit());
        let expression = query.text().match_expression();
        if !query.highlight() {
            let addresses = collect_matches(
                &connection,
                "SELECT a.id, a.street, a.house_number, a.city, a.longitude, a.latitude
                 FROM address_fts
                 JOIN addresses a ON address_fts.rowid = a.id
                 WHERE address_fts MATCH ?1
                 ORDER BY rank
                 LIMIT ?2",
                (expression, limit),
                "advanced fulltext search",
            )?;
            return Ok(addresses.into_iter().map(SearchHit::Plain).collect());
        }

        let operation = "advanced fulltext search";
        let wrap = |source| QueryError::store(operation, source);
        let mut statement = connection
            .prepare(
                "SELECT a.id, a.street, a.house_number, a.city, a.longitude, a.latitude,
                        highlight(address_fts, 0, ?3, ?4),
                        highlight(address_fts, 1, ?3, ?4),
                        highlight(address_fts, 2, ?3, ?4)
                 FROM address_fts
                 JOIN addresses a ON address_fts.rowid = a.id
                 WHERE address_fts MATCH ?1
                 ORDER BY rank
                 LIMIT ?2",
            )
            .map_err(wrap)?;
        let rows = statement
            .query_map(
                (expression, limit, HIGHLIGHT_OPEN, HIGHLIGHT_CLOSE),
                |row| {
                    Ok(SearchHit::Highlighted(HighlightedAddress {
                        address: address_from_row(row)?,
                        street_match: matched_span(row.get(6)?),
                        house_number_match: matched_span(row.get(7)?),
                        city_match: matched_span(row.get(8)?),
                    }))
                },
            )
            .map_err(|source| match_failure(operation, source))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|source| match_failure(operation, source))
    }
}

/// Keep a highlighted column only when it carries a match marker.
fn matched_span(highlighted: Option<String>) -> Option<String> {
    highlighted.filter(|text| text.contains(HIGHLIGHT_OPEN))
}

fn cap_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn address_from_row(row: &Row<'_>) -> Result<Address, rusqlite::Error> {
    Ok(Address {
        id: row.get(0)?,
        street: row.get(1)?,
        house_number: row.get(2)?,
        city: row.get(3)?,
        longitude: row.get(4)?,
        latitude: row.get(5)?,
    })
}

fn collect_addresses<P: rusqlite::Params>(
    connection: &Connection,
    sql: &str,
    params: P,
    operation: &'static str,
) -> Result<Vec<Address>, QueryError> {
    let wrap = |source| QueryError::store(operation, source);
    let mut statement = connection.prepare(sql).map_err(wrap)?;
    let rows = statement.query_map(params, address_from_row).map_err(wrap)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(wrap)
}

/// Like [`collect_addresses`] for statements filtering on `MATCH ?1`.
fn collect_matches<P: rusqlite::Params>(
    connection: &Connection,
    sql: &str,
    params: P,
    operation: &'static str,
) -> Result<Vec<Address>, QueryError> {
    let mut statement = connection
        .prepare(sql)
        .map_err(|source| QueryError::store(operation, source))?;
    let rows = statement
        .query_map(params, address_from_row)
        .map_err(|source| match_failure(operation, source))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|source| match_failure(operation, source))
}

/// FTS5 reports an expression it cannot parse as a plain `SQLITE_ERROR`
/// once the prepared statement steps.
fn match_failure(operation: &'static str, source: rusqlite::Error) -> QueryError {
    match source {
        rusqlite::Error::SqliteFailure(failure, Some(reason))
            if failure.code == ErrorCode::Unknown =>
        {
            ValidationError::InvalidSearchSyntax { reason }.into()
        }
        other => QueryError::store(operation, other),
    }
}

fn register_distance_function(connection: &Connection) -> Result<(), StoreInitError> {
    const NAME: &str = "haversine_km";
    connection
        .create_scalar_function(
            NAME,
            4,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |context| {
                let from = Coord {
                    x: context.get::<f64>(1)?,
                    y: context.get::<f64>(0)?,
                };
                let to = Coord {
                    x: context.get::<f64>(3)?,
                    y: context.get::<f64>(2)?,
                };
                Ok(haversine_km(from, to))
            },
        )
        .map_err(|source| StoreInitError::RegisterFunction { name: NAME, source })
}

fn ensure_schema(connection: &Connection) -> Result<(), StoreInitError> {
    for object in [ADDRESSES_TABLE, FTS_INDEX] {
        let present = table_exists(connection, object)
            .map_err(|source| StoreInitError::Inspect { source })?;
        if !present {
            return Err(StoreInitError::MissingSchema { object });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{write_database_without_index, write_sqlite_database};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    fn berlin() -> Vec<Address> {
        vec![
            Address::new(1, "Hauptstraße", "12", "Berlin", 13.4060, 52.5205),
            Address::new(2, "Hauptstraße", "14", "Berlin", 13.4075, 52.5210),
            Address::new(3, "Fernweg", "9", "Berlin", 13.50, 52.60),
            Address::new(4, "Ringstraße", "12a", "Potsdam", 13.06, 52.39),
        ]
    }

    #[fixture]
    fn store() -> (TempDir, SqliteAddressStore) {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("data.db");
        write_sqlite_database(&path, &berlin()).expect("persist database");
        let store = SqliteAddressStore::open(&path).expect("open store");
        (dir, store)
    }

    #[rstest]
    fn fulltext_search_matches_prefixes(store: (TempDir, SqliteAddressStore)) {
        let (_dir, store) = store;
        let query = FulltextQuery::new("Haupt, 12").expect("valid query");
        let found = store.fulltext_search(&query).expect("search succeeds");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].street, "Hauptstraße");
        assert_eq!(found[0].house_number, "12");
    }

    #[rstest]
    fn radius_search_orders_by_distance(store: (TempDir, SqliteAddressStore)) {
        let (_dir, store) = store;
        let query = ReverseQuery::new(52.5200, 13.4050, 1.0, 10).expect("valid query");
        let found = store.find_in_radius(&query).expect("search succeeds");
        let ids: Vec<_> = found.iter().map(|address| address.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[rstest]
    fn highlighted_search_marks_only_matching_columns(store: (TempDir, SqliteAddressStore)) {
        let (_dir, store) = store;
        let query = AdvancedQuery::new("Ring", None, true).expect("valid query");
        let hits = store.advanced_search(&query).expect("search succeeds");
        let [SearchHit::Highlighted(hit)] = hits.as_slice() else {
            panic!("expected one highlighted hit, got {hits:?}");
        };
        assert_eq!(hit.street_match.as_deref(), Some("<b>Ringstraße</b>"));
        assert_eq!(hit.house_number_match, None);
        assert_eq!(hit.city_match, None);
    }

    #[rstest]
    fn supplementary_reads(store: (TempDir, SqliteAddressStore)) {
        let (_dir, store) = store;
        assert_eq!(store.address_count().expect("count"), 4);
        assert_eq!(
            store.address_by_id(3).expect("lookup").map(|a| a.street),
            Some(String::from("Fernweg"))
        );
        assert_eq!(store.address_by_id(99).expect("lookup"), None);

        let summary = store.city_summary().expect("summary");
        assert_eq!(summary.get("Berlin"), Some(&3));
        assert_eq!(summary.get("Potsdam"), Some(&1));

        let by_fields = store
            .search_by_fields(Some("Haupt"), Some("14"), None)
            .expect("field search");
        assert_eq!(by_fields.iter().map(|a| a.id).collect::<Vec<_>>(), vec![2]);

        let second_page = store.addresses_by_city("Berlin", 2, 2).expect("page");
        assert_eq!(second_page.len(), 1);
        let clamped = store.addresses_by_city("Berlin", 0, 5000).expect("page");
        assert_eq!(clamped.len(), 3);
    }

    #[rstest]
    #[case("\"unbalanced")]
    #[case("Haupt-str")]
    fn malformed_match_expression_is_invalid_input(
        store: (TempDir, SqliteAddressStore),
        #[case] text: &str,
    ) {
        let (_dir, store) = store;
        let query = FulltextQuery::new(text).expect("valid query");
        let error = store.fulltext_search(&query).expect_err("syntax error");
        assert!(
            matches!(
                error,
                QueryError::InvalidArgument(ValidationError::InvalidSearchSyntax { .. })
            ),
            "{error}"
        );

        let advanced = AdvancedQuery::new(text, None, true).expect("valid query");
        let error = store.advanced_search(&advanced).expect_err("syntax error");
        assert!(error.is_invalid_argument(), "{error}");
    }

    #[rstest]
    fn missing_index_at_query_time_stays_a_store_error() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("addresses.db");
        write_sqlite_database(&path, &berlin()).expect("persist database");
        let store = SqliteAddressStore::open(&path).expect("open store");
        let side = Connection::open(&path).expect("second connection");
        side.execute_batch("DROP TABLE address_fts").expect("drop index");

        let query = FulltextQuery::new("Haupt").expect("valid query");
        let error = store.fulltext_search(&query).expect_err("index is gone");
        assert!(
            matches!(
                error,
                QueryError::StoreUnavailable {
                    operation: "fulltext search",
                    ..
                }
            ),
            "{error}"
        );
    }

    #[rstest]
    fn open_rejects_missing_file() {
        let dir = TempDir::new().expect("create temp dir");
        let error = SqliteAddressStore::open(dir.path().join("absent.db"))
            .expect_err("missing file should fail");
        assert!(matches!(error, StoreInitError::Open { .. }));
    }

    #[rstest]
    fn open_rejects_missing_index() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("data.db");
        write_database_without_index(&path).expect("persist table");
        let error = SqliteAddressStore::open(&path).expect_err("missing index should fail");
        assert!(matches!(
            error,
            StoreInitError::MissingSchema {
                object: "address_fts"
            }
        ));
    }

    #[rstest]
    fn open_rejects_non_database_file() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("data.db");
        std::fs::write(&path, b"definitely not sqlite, just some bytes").expect("write file");
        let error = SqliteAddressStore::open(&path).expect_err("garbage should fail");
        assert!(matches!(
            error,
            StoreInitError::Pragma { .. } | StoreInitError::Inspect { .. }
        ));
    }
}
