use std::collections::BTreeMap;

use geo::Coord;
use serde::{Deserialize, Serialize};

/// A single persisted address.
///
/// Records are assigned their identifier by the store and are never mutated
/// by the service; only the whole store is replaced.
///
/// # Examples
/// ```
/// use address_core::Address;
///
/// let address = Address::new(1, "Hauptstraße", "12a", "Berlin", 13.405, 52.52);
/// assert_eq!(address.house_number, "12a");
/// assert_eq!(address.location().y, 52.52);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    /// Store-assigned identifier.
    pub id: i64,
    /// Street name.
    pub street: String,
    /// House number; a string so values such as `12a` survive.
    pub house_number: String,
    /// City name.
    pub city: String,
    /// WGS84 longitude in degrees.
    pub longitude: f64,
    /// WGS84 latitude in degrees.
    pub latitude: f64,
}

impl Address {
    /// Construct an address from its parts.
    pub fn new(
        id: i64,
        street: impl Into<String>,
        house_number: impl Into<String>,
        city: impl Into<String>,
        longitude: f64,
        latitude: f64,
    ) -> Self {
        Self {
            id,
            street: street.into(),
            house_number: house_number.into(),
            city: city.into(),
            longitude,
            latitude,
        }
    }

    /// Position of the address with `x = longitude` and `y = latitude`.
    #[must_use]
    pub const fn location(&self) -> Coord<f64> {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }
}

/// An address together with the highlighted text of each matching column.
///
/// A column that did not contribute to the match carries `None` and is
/// omitted from the serialised form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightedAddress {
    /// The matching record.
    pub address: Address,
    /// Street with match spans wrapped in `<b>` markers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_match: Option<String>,
    /// House number with match spans wrapped in `<b>` markers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub house_number_match: Option<String>,
    /// City with match spans wrapped in `<b>` markers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_match: Option<String>,
}

/// One entry of an advanced search result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchHit {
    /// Highlighting was requested.
    Highlighted(HighlightedAddress),
    /// Plain record without highlighting.
    Plain(Address),
}

impl SearchHit {
    /// The underlying address regardless of variant.
    #[must_use]
    pub const fn address(&self) -> &Address {
        match self {
            Self::Plain(address) => address,
            Self::Highlighted(hit) => &hit.address,
        }
    }
}

/// Number of addresses per city.
pub type CitySummary = BTreeMap<String, i64>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn address_serialises_with_snake_case_fields() {
        let address = Address::new(7, "Hauptstraße", "12", "Berlin", 13.4, 52.5);
        let value = serde_json::to_value(&address).expect("serialise address");
        assert_eq!(
            value,
            json!({
                "id": 7,
                "street": "Hauptstraße",
                "house_number": "12",
                "city": "Berlin",
                "longitude": 13.4,
                "latitude": 52.5,
            })
        );
    }

    #[rstest]
    fn highlighted_hit_omits_unmatched_columns() {
        let hit = SearchHit::Highlighted(HighlightedAddress {
            address: Address::new(1, "Hauptstraße", "12", "Berlin", 13.4, 52.5),
            street_match: Some(String::from("<b>Hauptstraße</b>")),
            house_number_match: None,
            city_match: None,
        });
        let value = serde_json::to_value(&hit).expect("serialise hit");
        assert_eq!(value["street_match"], "<b>Hauptstraße</b>");
        assert!(value.get("house_number_match").is_none());
        assert!(value.get("city_match").is_none());
    }

    #[rstest]
    fn plain_hit_serialises_as_bare_address() {
        let address = Address::new(2, "Ring", "1", "Köln", 6.9, 50.9);
        let value = serde_json::to_value(SearchHit::Plain(address.clone())).expect("serialise");
        assert_eq!(value, serde_json::to_value(&address).expect("serialise address"));
    }
}
