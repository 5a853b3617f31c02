use std::path::PathBuf;
use std::time::Duration;
use std::{env, io};

use secrecy::SecretString;
use serde::Serialize;
use tracing::debug;

use crate::errors::{AppError, AppResult};

pub const DEFAULT_COUNTRY_CODE: &str = "nz";
pub const DEFAULT_NOMINATIM_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_NOMINATIM_USER_AGENT: &str = "Splynx-API-Client/1.0";
pub const DEFAULT_GOOGLE_GEOCODING_ENDPOINT: &str =
    "https://maps.googleapis.com/maps/api/geocode/json";
const DEFAULT_NOMINATIM_MIN_INTERVAL_MS: u64 = 1_000;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub splynx_api_url: String,
    pub splynx_api_key: Option<SecretString>,
    pub splynx_api_secret: Option<SecretString>,
    pub google_geocoding_api_key: Option<SecretString>,
    pub geocoding_country_code: String,
    pub nominatim_endpoint: String,
    pub nominatim_user_agent: String,
    pub nominatim_min_interval_ms: u64,
    pub google_geocoding_endpoint: String,
    pub http_timeout_secs: u64,
    pub history_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicAppConfig {
    pub splynx_api_url: String,
    pub has_splynx_credentials: bool,
    pub has_google_geocoding_key: bool,
    pub geocoding_country_code: String,
    pub nominatim_endpoint: String,
    pub nominatim_min_interval_ms: u64,
    pub google_geocoding_endpoint: String,
    pub http_timeout_secs: u64,
    pub history_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        Self {
            splynx_api_url: env::var("SPLYNX_API_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or_default(),
            splynx_api_key: parse_secret("SPLYNX_API_KEY"),
            splynx_api_secret: parse_secret("SPLYNX_API_SECRET"),
            google_geocoding_api_key: parse_secret("GOOGLE_GEOCODING_API_KEY"),
            geocoding_country_code: env::var("GEOCODING_COUNTRY_CODE")
                .ok()
                .map(|v| v.trim().to_ascii_lowercase())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_COUNTRY_CODE.to_string()),
            nominatim_endpoint: env::var("NOMINATIM_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_NOMINATIM_ENDPOINT.to_string()),
            nominatim_user_agent: env::var("NOMINATIM_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_NOMINATIM_USER_AGENT.to_string()),
            nominatim_min_interval_ms: parse_u64(
                "NOMINATIM_MIN_INTERVAL_MS",
                DEFAULT_NOMINATIM_MIN_INTERVAL_MS,
            ),
            google_geocoding_endpoint: env::var("GOOGLE_GEOCODING_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_GOOGLE_GEOCODING_ENDPOINT.to_string()),
            http_timeout_secs: parse_u64("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS).max(1),
            history_path: env::var("SYNC_HISTORY_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn public_profile(&self) -> PublicAppConfig {
        PublicAppConfig {
            splynx_api_url: self.splynx_api_url.clone(),
            has_splynx_credentials: self.splynx_api_key.is_some()
                && self.splynx_api_secret.is_some(),
            has_google_geocoding_key: self.google_geocoding_api_key.is_some(),
            geocoding_country_code: self.geocoding_country_code.clone(),
            nominatim_endpoint: self.nominatim_endpoint.clone(),
            nominatim_min_interval_ms: self.nominatim_min_interval_ms,
            google_geocoding_endpoint: self.google_geocoding_endpoint.clone(),
            http_timeout_secs: self.http_timeout_secs,
            history_path: self.history_path.clone(),
        }
    }

    /// Credentials for the CRM, or a config error naming what is missing.
    pub fn splynx_credentials(&self) -> AppResult<(&str, &SecretString, &SecretString)> {
        if self.splynx_api_url.is_empty() {
            return Err(AppError::Config("SPLYNX_API_URL is not configured".into()));
        }
        let key = self
            .splynx_api_key
            .as_ref()
            .ok_or_else(|| AppError::Config("SPLYNX_API_KEY is not configured".into()))?;
        let secret = self
            .splynx_api_secret
            .as_ref()
            .ok_or_else(|| AppError::Config("SPLYNX_API_SECRET is not configured".into()))?;
        Ok((self.splynx_api_url.as_str(), key, secret))
    }

    pub fn nominatim_min_interval(&self) -> Duration {
        Duration::from_millis(self.nominatim_min_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn parse_secret(key: &str) -> Option<SecretString> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        splynx_api_url: "http://splynx.invalid/api/2.0".into(),
        splynx_api_key: Some(SecretString::from("key".to_string())),
        splynx_api_secret: Some(SecretString::from("secret".to_string())),
        google_geocoding_api_key: None,
        geocoding_country_code: DEFAULT_COUNTRY_CODE.into(),
        nominatim_endpoint: DEFAULT_NOMINATIM_ENDPOINT.into(),
        nominatim_user_agent: DEFAULT_NOMINATIM_USER_AGENT.into(),
        nominatim_min_interval_ms: 0,
        google_geocoding_endpoint: DEFAULT_GOOGLE_GEOCODING_ENDPOINT.into(),
        http_timeout_secs: 5,
        history_path: None,
    }
}
