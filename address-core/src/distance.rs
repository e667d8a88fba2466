//! Great-circle distance between WGS84 coordinates.

use geo::Coord;

/// Mean Earth radius used by the haversine formula, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometres between two points.
///
/// Coordinates use `x = longitude` and `y = latitude`, both in degrees.
///
/// # Examples
/// ```
/// use address_core::haversine_km;
/// use geo::Coord;
///
/// let alexanderplatz = Coord { x: 13.4050, y: 52.5200 };
/// let nearby = Coord { x: 13.4060, y: 52.5205 };
/// assert!(haversine_km(alexanderplatz, nearby) < 0.1);
/// ```
#[must_use]
#[expect(
    clippy::float_arithmetic,
    reason = "the haversine formula is floating-point maths"
)]
pub fn haversine_km(from: Coord<f64>, to: Coord<f64>) -> f64 {
    let lat1 = from.y.to_radians();
    let lat2 = to.y.to_radians();
    let delta_lat = lat2 - lat1;
    let delta_lon = to.x.to_radians() - from.x.to_radians();

    let raw = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    // Rounding can push `a` just past 1 for near-antipodal points.
    let a = raw.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
#[expect(
    clippy::float_arithmetic,
    reason = "tests compare distances within a tolerance"
)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn coord(lat: f64, lon: f64) -> Coord<f64> {
        Coord { x: lon, y: lat }
    }

    #[rstest]
    fn identical_points_are_zero_apart() {
        let point = coord(49.4521, 11.0767);
        assert_eq!(haversine_km(point, point), 0.0);
    }

    #[rstest]
    #[case(coord(52.5205, 13.4060), 0.05, 0.1)]
    #[case(coord(52.60, 13.50), 9.0, 12.0)]
    fn berlin_reference_distances(#[case] to: Coord<f64>, #[case] min: f64, #[case] max: f64) {
        let distance = haversine_km(coord(52.5200, 13.4050), to);
        assert!(
            (min..max).contains(&distance),
            "distance {distance} outside [{min}, {max})"
        );
    }

    #[rstest]
    fn quarter_meridian_matches_radius() {
        let distance = haversine_km(coord(0.0, 0.0), coord(90.0, 0.0));
        let expected = EARTH_RADIUS_KM * std::f64::consts::FRAC_PI_2;
        assert!((distance - expected).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn distance_is_symmetric(
            lat1 in -90.0f64..=90.0,
            lon1 in -180.0f64..=180.0,
            lat2 in -90.0f64..=90.0,
            lon2 in -180.0f64..=180.0,
        ) {
            let forward = haversine_km(coord(lat1, lon1), coord(lat2, lon2));
            let backward = haversine_km(coord(lat2, lon2), coord(lat1, lon1));
            prop_assert!((forward - backward).abs() < 1e-6);
            prop_assert!(forward >= 0.0);
            prop_assert!(forward <= EARTH_RADIUS_KM * std::f64::consts::PI + 1e-6);
        }
    }
}
