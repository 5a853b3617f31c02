use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{GeocodeOutcome, GeocodeProvider};
use crate::config::AppConfig;
use crate::errors::AppResult;
use crate::model::Coordinate;

const STATUS_OK: &str = "OK";
const STATUS_REQUEST_DENIED: &str = "REQUEST_DENIED";

/// Google Geocoding API. Paid and key gated; only registered when a key exists.
pub struct GoogleGeocoder {
    http: Client,
    endpoint: String,
    api_key: SecretString,
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    status: String,
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<ResponseResult>,
}

#[derive(Deserialize)]
struct ResponseResult {
    geometry: Option<ResponseGeometry>,
}

#[derive(Deserialize)]
struct ResponseGeometry {
    location: Option<ResponseLocation>,
}

#[derive(Deserialize)]
struct ResponseLocation {
    lat: f64,
    lng: f64,
}

impl GoogleGeocoder {
    pub fn new(config: &AppConfig, api_key: SecretString) -> AppResult<Self> {
        let http = Client::builder().timeout(config.http_timeout()).build()?;
        Ok(Self {
            http,
            endpoint: config.google_geocoding_endpoint.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl GeocodeProvider for GoogleGeocoder {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn geocode(&self, address: &str, country_code: &str) -> GeocodeOutcome {
        let components = format!("country:{country_code}");
        let response = match self
            .http
            .get(&self.endpoint)
            .query(&[
                ("address", address),
                ("key", self.api_key.expose_secret()),
                ("components", components.as_str()),
            ])
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err.without_url(), "google geocoding request failed");
                return GeocodeOutcome::NoResult;
            }
        };

        // Errors such as REQUEST_DENIED are reported in the body, so decode
        // regardless of the HTTP status.
        let http_status = response.status();
        let parsed: Response = match response.json().await {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!(%http_status, error = %err.without_url(), "undecodable google geocoding response");
                return GeocodeOutcome::NoResult;
            }
        };

        if parsed.status != STATUS_OK {
            let error_message = parsed.error_message.as_deref().unwrap_or("Unknown error");
            if parsed.status == STATUS_REQUEST_DENIED {
                warn!(status = %parsed.status, error_message, "google geocoding rejected the API key");
                return GeocodeOutcome::AuthRejected;
            }
            debug!(status = %parsed.status, error_message, "google geocoding returned no result");
            return GeocodeOutcome::NoResult;
        }

        parsed
            .results
            .into_iter()
            .next()
            .and_then(|result| result.geometry)
            .and_then(|geometry| geometry.location)
            .and_then(|location| {
                let coordinate = Coordinate::checked(location.lat, location.lng);
                if coordinate.is_none() {
                    debug!(
                        lat = location.lat,
                        lng = location.lng,
                        "google geocoding returned unusable coordinates"
                    );
                }
                coordinate
            })
            .map(GeocodeOutcome::Found)
            .unwrap_or(GeocodeOutcome::NoResult)
    }
}
