//! Error types shared by queries and stores.

use thiserror::Error;

/// Rejected user input.
///
/// Raised before any store access, except
/// [`ValidationError::InvalidSearchSyntax`], which the fulltext index reports
/// while running the query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The search text was empty after trimming.
    #[error("search query cannot be empty")]
    EmptyQuery,
    /// Latitude outside `[-90, 90]` or not a number.
    #[error("latitude must be between -90 and 90, got {value}")]
    LatitudeOutOfRange {
        /// Rejected latitude.
        value: f64,
    },
    /// Longitude outside `[-180, 180]` or not a number.
    #[error("longitude must be between -180 and 180, got {value}")]
    LongitudeOutOfRange {
        /// Rejected longitude.
        value: f64,
    },
    /// Radius outside `(0, 10]` kilometres.
    #[error("radius must be greater than 0 and at most {max} km, got {value}")]
    RadiusOutOfRange {
        /// Rejected radius.
        value: f64,
        /// Largest accepted radius.
        max: f64,
    },
    /// Result limit outside `[1, 100]`.
    #[error("limit must be between 1 and {max}, got {value}")]
    LimitOutOfRange {
        /// Rejected limit.
        value: i64,
        /// Largest accepted limit.
        max: i64,
    },
    /// The fulltext index could not parse the search text.
    #[error("invalid search query: {reason}")]
    InvalidSearchSyntax {
        /// Parser message reported by the index.
        reason: String,
    },
}

/// Errors returned by [`AddressStore`](crate::AddressStore) queries.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The request was invalid.
    #[error(transparent)]
    InvalidArgument(#[from] ValidationError),
    /// The backing store failed while executing the query.
    #[error("{operation} failed: {source}")]
    StoreUnavailable {
        /// Name of the failed operation.
        operation: &'static str,
        /// Backend error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
    /// No live store is attached, e.g. during or after a failed replacement.
    #[error("address store is not available")]
    Closed,
}

impl QueryError {
    /// Wrap a backend failure for the named operation.
    pub fn store<E>(operation: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::StoreUnavailable {
            operation,
            source: Box::new(source),
        }
    }

    /// Whether the caller is to blame for the failure.
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}
