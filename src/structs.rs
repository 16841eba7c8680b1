use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};

/// A KMB bus stop as listed by the stop catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    #[serde(rename = "stop")]
    pub id: String,
    pub name_en: String,
    #[serde(deserialize_with = "de_coordinate")]
    pub lat: f64,
    #[serde(deserialize_with = "de_coordinate")]
    pub long: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UserPosition {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EtaEntry {
    pub route: String,
    pub dir: String,
    pub dest_en: String,
    /// `None` when the operator has no estimate for this slot.
    pub eta: Option<DateTime<FixedOffset>>,
}

/// ETAs sharing a route code and direction at one stop.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteGroup {
    pub route: String,
    pub dest: String,
    pub times: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NearbyStop {
    pub stop: Stop,
    /// Meters from the user.
    pub distance: f64,
}

/// Envelope shared by every KMB endpoint.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub data: Vec<T>,
}

// The KMB API sends coordinates as decimal strings ("22.345415").
fn de_coordinate<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Coordinate {
        Number(f64),
        Text(String),
    }

    match Coordinate::deserialize(deserializer)? {
        Coordinate::Number(n) => Ok(n),
        Coordinate::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
