use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{GeocodeOutcome, GeocodeProvider};
use crate::config::AppConfig;
use crate::errors::AppResult;
use crate::model::Coordinate;

/// OpenStreetMap Nominatim search. Free and anonymous, throttled per client IP.
pub struct NominatimGeocoder {
    http: Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct SearchHit {
    lat: Option<serde_json::Value>,
    lon: Option<serde_json::Value>,
}

impl NominatimGeocoder {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent(config.nominatim_user_agent.clone())
            .timeout(config.http_timeout())
            .build()?;
        Ok(Self {
            http,
            endpoint: config.nominatim_endpoint.clone(),
        })
    }
}

#[async_trait]
impl GeocodeProvider for NominatimGeocoder {
    fn name(&self) -> &'static str {
        "nominatim"
    }

    async fn geocode(&self, address: &str, country_code: &str) -> GeocodeOutcome {
        let response = match self
            .http
            .get(&self.endpoint)
            .query(&[
                ("q", address),
                ("format", "json"),
                ("limit", "1"),
                ("countrycodes", country_code),
            ])
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(?err, "nominatim request failed");
                return GeocodeOutcome::NoResult;
            }
        };

        if response.status() != StatusCode::OK {
            debug!(status = %response.status(), "nominatim returned non-200");
            return GeocodeOutcome::NoResult;
        }

        let hits: Vec<SearchHit> = match response.json().await {
            Ok(hits) => hits,
            Err(err) => {
                debug!(?err, "nominatim response was not a result array");
                return GeocodeOutcome::NoResult;
            }
        };

        hits.into_iter()
            .next()
            .and_then(|hit| {
                let lat = parse_degrees(hit.lat.as_ref()?)?;
                let lon = parse_degrees(hit.lon.as_ref()?)?;
                let Some(coordinate) = Coordinate::checked(lat, lon) else {
                    debug!(lat, lon, "nominatim returned unusable coordinates");
                    return None;
                };
                Some(GeocodeOutcome::Found(coordinate))
            })
            .unwrap_or(GeocodeOutcome::NoResult)
    }
}

// Nominatim sends degrees as strings; accept plain numbers too.
fn parse_degrees(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::String(text) => text.trim().parse().ok(),
        serde_json::Value::Number(number) => number.as_f64(),
        _ => None,
    }
}
