use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Customer row as returned by the CRM customer listing.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: u64,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub login: String,
    #[serde(default, rename = "street_1", deserialize_with = "deserialize_text")]
    pub street: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub city: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceStatus {
    Active,
    Inactive,
}

impl From<String> for ServiceStatus {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("active") {
            ServiceStatus::Active
        } else {
            ServiceStatus::Inactive
        }
    }
}

impl<'de> Deserialize<'de> for ServiceStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(ServiceStatus::from).unwrap_or(ServiceStatus::Inactive))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeoInfo {
    #[serde(default, deserialize_with = "deserialize_text")]
    pub marker: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub address: String,
}

/// Internet service row. `geo.marker` is the only field this crate ever writes.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: u64,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub customer_id: Option<u64>,
    pub status: ServiceStatus,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub ipv4: String,
    #[serde(default, deserialize_with = "deserialize_geo")]
    pub geo: GeoInfo,
}

impl ServiceRecord {
    pub fn is_active(&self) -> bool {
        self.status == ServiceStatus::Active
    }

    pub fn has_marker(&self) -> bool {
        !self.geo.marker.is_empty()
    }
}

/// Single-line geocoding query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolvedAddress(String);

impl ResolvedAddress {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Rejects non-finite or out-of-range degrees so they never reach a marker.
    pub fn checked(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then(|| Self::new(latitude, longitude))
    }

    /// `"lat,lon"` as stored in `geo.marker`.
    pub fn to_marker(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    fn into_id<E: serde::de::Error>(self) -> Result<u64, E> {
        match self {
            RawId::Number(value) => Ok(value),
            RawId::Text(text) => text
                .trim()
                .parse::<u64>()
                .map_err(|_| E::custom(format!("invalid record id: {text:?}"))),
        }
    }
}

fn deserialize_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    RawId::deserialize(deserializer)?.into_id()
}

fn deserialize_optional_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u64>, D::Error> {
    match Option::<RawId>::deserialize(deserializer)? {
        Some(raw) => raw.into_id().map(Some),
        None => Ok(None),
    }
}

// The CRM sends null for unset text columns.
fn deserialize_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_geo<'de, D: Deserializer<'de>>(deserializer: D) -> Result<GeoInfo, D::Error> {
    Ok(Option::<GeoInfo>::deserialize(deserializer)?.unwrap_or_default())
}
