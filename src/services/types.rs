use serde::{Deserialize, Serialize};

/// Recognized filters for listing units
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnitFilters {
    /// Minimum monthly rent
    pub min_price: Option<f64>,
    /// Maximum monthly rent
    pub max_price: Option<f64>,
    /// Number of rooms
    pub rooms: Option<u32>,
    /// Free-text location (city, province...)
    pub location: Option<String>,
    /// Required amenities, sent comma-joined
    pub amenities: Option<Vec<String>>,
}

impl UnitFilters {
    /// Query pairs for every defined filter, in a stable order
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(min) = self.min_price {
            pairs.push(("minPrice", min.to_string()));
        }
        if let Some(max) = self.max_price {
            pairs.push(("maxPrice", max.to_string()));
        }
        if let Some(rooms) = self.rooms {
            pairs.push(("rooms", rooms.to_string()));
        }
        if let Some(location) = &self.location {
            pairs.push(("location", location.clone()));
        }
        if let Some(amenities) = &self.amenities {
            pairs.push(("amenities", amenities.join(",")));
        }
        pairs
    }

    /// Percent-encoded query string (without the leading `?`)
    pub fn query_string(&self) -> String {
        self.query_pairs()
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn is_empty(&self) -> bool {
        self.query_pairs().is_empty()
    }
}
