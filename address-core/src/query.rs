//! Validated query requests and the fulltext normalisation rule.

use geo::Coord;

use crate::ValidationError;

/// Hard cap on rows returned by fulltext and radius queries.
pub const RESULT_CAP: usize = 100;

/// Radius used when a reverse geocode request omits one, in kilometres.
pub const DEFAULT_RADIUS_KM: f64 = 1.0;

/// Largest radius accepted from a request, in kilometres.
pub const MAX_RADIUS_KM: f64 = 10.0;

/// Limit used when a reverse geocode request omits one.
pub const DEFAULT_REVERSE_LIMIT: i64 = 10;

/// Largest limit accepted from a reverse geocode request.
pub const MAX_REVERSE_LIMIT: i64 = 100;

/// Limit used by advanced searches that omit or exceed the allowed range.
pub const ADVANCED_DEFAULT_LIMIT: usize = 100;

/// Largest limit honoured by advanced searches.
pub const ADVANCED_MAX_LIMIT: usize = 1000;

/// Turn free text into an FTS5 prefix match expression.
///
/// Commas become spaces, the text is split on whitespace and every token
/// receives a trailing `*` so fragments match complete index terms.
///
/// # Examples
/// ```
/// use address_core::normalise_query;
///
/// assert_eq!(normalise_query("Haupt, 12"), "Haupt* 12*");
/// assert_eq!(normalise_query("  "), "");
/// ```
#[must_use]
pub fn normalise_query(raw: &str) -> String {
    raw.replace(',', " ")
        .split_whitespace()
        .map(|token| format!("{token}*"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Truncate radius results to the caller's limit.
///
/// The limit applies only when it is positive and smaller than the number of
/// results. Larger limits and non-positive limits leave the list untouched.
pub fn apply_client_limit<T>(results: &mut Vec<T>, limit: i64) {
    if let Ok(cap) = usize::try_from(limit)
        && cap > 0
        && cap < results.len()
    {
        results.truncate(cap);
    }
}

/// A validated fulltext search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulltextQuery {
    raw: String,
    match_expression: String,
}

impl FulltextQuery {
    /// Validate the raw query text.
    ///
    /// # Errors
    /// Returns [`ValidationError::EmptyQuery`] when the text is blank after
    /// trimming.
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        let match_expression = normalise_query(&raw);
        if match_expression.is_empty() {
            return Err(ValidationError::EmptyQuery);
        }
        Ok(Self {
            raw,
            match_expression,
        })
    }

    /// Text as supplied by the caller.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Expression handed to the index's `MATCH` operator.
    #[must_use]
    pub fn match_expression(&self) -> &str {
        &self.match_expression
    }
}

/// A validated advanced fulltext search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvancedQuery {
    text: FulltextQuery,
    limit: usize,
    highlight: bool,
}

impl AdvancedQuery {
    /// Validate the query text and clamp the limit.
    ///
    /// A limit of zero, a negative limit or one above
    /// [`ADVANCED_MAX_LIMIT`] falls back to [`ADVANCED_DEFAULT_LIMIT`].
    ///
    /// # Errors
    /// Returns [`ValidationError::EmptyQuery`] for blank text.
    pub fn new(
        raw: impl Into<String>,
        requested_limit: Option<i64>,
        highlight: bool,
    ) -> Result<Self, ValidationError> {
        let text = FulltextQuery::new(raw)?;
        let limit = requested_limit
            .and_then(|value| usize::try_from(value).ok())
            .filter(|value| (1..=ADVANCED_MAX_LIMIT).contains(value))
            .unwrap_or(ADVANCED_DEFAULT_LIMIT);
        Ok(Self {
            text,
            limit,
            highlight,
        })
    }

    /// The normalised text query.
    #[must_use]
    pub const fn text(&self) -> &FulltextQuery {
        &self.text
    }

    /// Row limit passed to the store.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Whether highlighted match spans are requested.
    #[must_use]
    pub const fn highlight(&self) -> bool {
        self.highlight
    }
}

/// A validated reverse geocode request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverseQuery {
    centre: Coord<f64>,
    radius_km: f64,
    limit: i64,
}

impl ReverseQuery {
    /// Validate the coordinate of a reverse geocode.
    ///
    /// A radius of exactly zero is replaced by [`DEFAULT_RADIUS_KM`]. The
    /// limit is kept verbatim; see [`apply_client_limit`].
    ///
    /// # Errors
    /// Returns a [`ValidationError`] when latitude or longitude is out of
    /// range or not a number.
    pub fn new(
        latitude: f64,
        longitude: f64,
        radius: f64,
        limit: i64,
    ) -> Result<Self, ValidationError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ValidationError::LatitudeOutOfRange { value: latitude });
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(ValidationError::LongitudeOutOfRange { value: longitude });
        }
        let radius_km = if radius == 0.0 {
            DEFAULT_RADIUS_KM
        } else {
            radius
        };
        Ok(Self {
            centre: Coord {
                x: longitude,
                y: latitude,
            },
            radius_km,
            limit,
        })
    }

    /// Build a query from optional request parameters.
    ///
    /// Missing values take their defaults. Unlike [`ReverseQuery::new`] the
    /// radius must lie in `(0, 10]` and the limit in `[1, 100]`.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] for any out-of-range parameter.
    pub fn from_request(
        latitude: f64,
        longitude: f64,
        requested_radius: Option<f64>,
        requested_limit: Option<i64>,
    ) -> Result<Self, ValidationError> {
        let radius_km = requested_radius.unwrap_or(DEFAULT_RADIUS_KM);
        let limit = requested_limit.unwrap_or(DEFAULT_REVERSE_LIMIT);
        let query = Self::new(latitude, longitude, radius_km, limit)?;
        if !(radius_km > 0.0 && radius_km <= MAX_RADIUS_KM) {
            return Err(ValidationError::RadiusOutOfRange {
                value: radius_km,
                max: MAX_RADIUS_KM,
            });
        }
        if !(1..=MAX_REVERSE_LIMIT).contains(&limit) {
            return Err(ValidationError::LimitOutOfRange {
                value: limit,
                max: MAX_REVERSE_LIMIT,
            });
        }
        Ok(query)
    }

    /// Query point with `x = longitude` and `y = latitude`.
    #[must_use]
    pub const fn centre(&self) -> Coord<f64> {
        self.centre
    }

    /// Search radius in kilometres.
    #[must_use]
    pub const fn radius_km(&self) -> f64 {
        self.radius_km
    }

    /// Client-side result limit.
    #[must_use]
    pub const fn limit(&self) -> i64 {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("Haupt, 12", "Haupt* 12*")]
    #[case("Hauptstraß", "Hauptstraß*")]
    #[case("  main   street ", "main* street*")]
    #[case("a,b,,c", "a* b* c*")]
    fn normalises_into_prefix_tokens(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalise_query(raw), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case(" , ,")]
    fn blank_queries_are_rejected(#[case] raw: &str) {
        assert_eq!(FulltextQuery::new(raw), Err(ValidationError::EmptyQuery));
    }

    #[rstest]
    #[case(-90.5, 0.0)]
    #[case(90.5, 0.0)]
    #[case(0.0, -180.5)]
    #[case(0.0, 180.5)]
    #[case(f64::NAN, 0.0)]
    #[case(0.0, f64::NAN)]
    fn out_of_range_coordinates_are_rejected(#[case] lat: f64, #[case] lon: f64) {
        assert!(ReverseQuery::new(lat, lon, 1.0, 10).is_err());
    }

    #[rstest]
    #[case(-90.0, -180.0)]
    #[case(90.0, 180.0)]
    fn boundary_coordinates_are_accepted(#[case] lat: f64, #[case] lon: f64) {
        assert!(ReverseQuery::new(lat, lon, 1.0, 10).is_ok());
    }

    #[rstest]
    fn zero_radius_falls_back_to_default() {
        let query = ReverseQuery::new(52.52, 13.405, 0.0, 10).expect("valid query");
        assert_eq!(query.radius_km(), DEFAULT_RADIUS_KM);
    }

    #[rstest]
    fn request_defaults_apply() {
        let query = ReverseQuery::from_request(52.52, 13.405, None, None).expect("valid query");
        assert_eq!(query.radius_km(), DEFAULT_RADIUS_KM);
        assert_eq!(query.limit(), DEFAULT_REVERSE_LIMIT);
    }

    #[rstest]
    #[case(Some(0.0), None)]
    #[case(Some(-1.0), None)]
    #[case(Some(10.5), None)]
    #[case(None, Some(0))]
    #[case(None, Some(101))]
    fn request_bounds_are_enforced(#[case] radius: Option<f64>, #[case] limit: Option<i64>) {
        assert!(ReverseQuery::from_request(52.52, 13.405, radius, limit).is_err());
    }

    #[rstest]
    #[case(5, 3, 3)]
    #[case(5, 5, 5)]
    #[case(5, 200, 5)]
    #[case(5, 0, 5)]
    #[case(5, -4, 5)]
    fn client_limit_only_truncates_when_smaller(
        #[case] available: usize,
        #[case] limit: i64,
        #[case] expected: usize,
    ) {
        let mut results: Vec<usize> = (0..available).collect();
        apply_client_limit(&mut results, limit);
        assert_eq!(results.len(), expected);
    }

    #[rstest]
    #[case(None, ADVANCED_DEFAULT_LIMIT)]
    #[case(Some(0), ADVANCED_DEFAULT_LIMIT)]
    #[case(Some(-3), ADVANCED_DEFAULT_LIMIT)]
    #[case(Some(1001), ADVANCED_DEFAULT_LIMIT)]
    #[case(Some(1000), 1000)]
    #[case(Some(25), 25)]
    fn advanced_limit_is_clamped(#[case] limit: Option<i64>, #[case] expected: usize) {
        let query = AdvancedQuery::new("ring", limit, false).expect("valid query");
        assert_eq!(query.limit(), expected);
    }

    proptest! {
        #[test]
        fn commas_behave_like_spaces(raw in "[a-z0-9 ,]{1,40}") {
            prop_assert_eq!(normalise_query(&raw), normalise_query(&raw.replace(',', " ")));
        }

        #[test]
        fn every_token_gains_a_wildcard_in_order(tokens in prop::collection::vec("[A-Za-z0-9ß]{1,8}", 1..6)) {
            let normalised = normalise_query(&tokens.join(", "));
            let produced: Vec<&str> = normalised.split(' ').collect();
            prop_assert_eq!(produced.len(), tokens.len());
            for (token, original) in produced.iter().zip(&tokens) {
                prop_assert_eq!(*token, format!("{original}*"));
            }
        }
    }
}
