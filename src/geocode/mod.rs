//! Ordered-provider geocoding with per-provider rate limits and a sticky
//! circuit breaker for providers that reject their credentials.

mod google;
mod nominatim;
mod rate_limit;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::errors::AppResult;
use crate::model::{Coordinate, ResolvedAddress};

pub use google::GoogleGeocoder;
pub use nominatim::NominatimGeocoder;
use rate_limit::RateLimiter;

/// What a single provider made of an address.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeocodeOutcome {
    Found(Coordinate),
    NoResult,
    /// The provider refused our credentials; it stays disabled for the run.
    AuthRejected,
}

#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Transport and decode faults map to [`GeocodeOutcome::NoResult`].
    async fn geocode(&self, address: &str, country_code: &str) -> GeocodeOutcome;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    Resolved {
        coordinate: Coordinate,
        provider: &'static str,
    },
    Unresolved,
}

struct ProviderSlot {
    provider: Arc<dyn GeocodeProvider>,
    limiter: Option<RateLimiter>,
    disabled: AtomicBool,
}

pub struct GeocodingPolicy {
    providers: Vec<ProviderSlot>,
    country_code: String,
}

impl GeocodingPolicy {
    pub fn new(country_code: impl Into<String>) -> Self {
        Self {
            providers: Vec::new(),
            country_code: country_code.into(),
        }
    }

    /// Appends a provider after the ones already registered. A `min_interval`
    /// gates every call to this provider through one shared limiter.
    pub fn with_provider(
        mut self,
        provider: Arc<dyn GeocodeProvider>,
        min_interval: Option<Duration>,
    ) -> Self {
        self.providers.push(ProviderSlot {
            provider,
            limiter: min_interval.map(RateLimiter::new),
            disabled: AtomicBool::new(false),
        });
        self
    }

    /// Nominatim first, then Google when a key is configured.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let nominatim = NominatimGeocoder::new(config)?;
        let mut policy = Self::new(config.geocoding_country_code.clone()).with_provider(
            Arc::new(nominatim),
            Some(config.nominatim_min_interval()),
        );

        match config.google_geocoding_api_key.clone() {
            Some(key) => {
                let google = GoogleGeocoder::new(config, key)?;
                policy = policy.with_provider(Arc::new(google), None);
            }
            None => info!("no Google geocoding key configured; fallback provider disabled"),
        }
        Ok(policy)
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|slot| slot.provider.name()).collect()
    }

    pub fn is_disabled(&self, name: &str) -> bool {
        self.providers
            .iter()
            .any(|slot| slot.provider.name() == name && slot.disabled.load(Ordering::SeqCst))
    }

    pub async fn geocode(&self, address: &ResolvedAddress) -> Resolution {
        for slot in &self.providers {
            let name = slot.provider.name();
            if slot.disabled.load(Ordering::SeqCst) {
                debug!(provider = name, "skipping provider disabled earlier in this run");
                continue;
            }

            let outcome = match &slot.limiter {
                Some(limiter) => {
                    let _permit = limiter.acquire().await;
                    slot.provider
                        .geocode(address.as_str(), &self.country_code)
                        .await
                }
                None => {
                    slot.provider
                        .geocode(address.as_str(), &self.country_code)
                        .await
                }
            };

            match outcome {
                GeocodeOutcome::Found(coordinate) => {
                    info!(provider = name, %address, %coordinate, "geocoding succeeded");
                    return Resolution::Resolved {
                        coordinate,
                        provider: name,
                    };
                }
                GeocodeOutcome::NoResult => {
                    debug!(provider = name, %address, "no result; trying next provider");
                }
                GeocodeOutcome::AuthRejected => {
                    if !slot.disabled.swap(true, Ordering::SeqCst) {
                        warn!(
                            provider = name,
                            "provider rejected the API key; disabling it for the rest of the run"
                        );
                    }
                }
            }
        }
        Resolution::Unresolved
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use parking_lot::Mutex;
    use tokio::time::{sleep, Instant};

    use super::*;

    struct ScriptedProvider {
        name: &'static str,
        script: Mutex<VecDeque<GeocodeOutcome>>,
        calls: Mutex<Vec<(String, Instant)>>,
    }

    impl ScriptedProvider {
        fn new(name: &'static str, script: Vec<GeocodeOutcome>) -> Arc<Self> {
            Arc::new(Self {
                name,
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().iter().map(|(_, at)| *at).collect()
        }
    }

    #[async_trait]
    impl GeocodeProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn geocode(&self, address: &str, _country_code: &str) -> GeocodeOutcome {
            self.calls.lock().push((address.to_string(), Instant::now()));
            self.script
                .lock()
                .pop_front()
                .unwrap_or(GeocodeOutcome::NoResult)
        }
    }

    fn wellington() -> Coordinate {
        Coordinate::new(-41.28, 174.77)
    }

    #[tokio::test]
    async fn primary_success_short_circuits_fallback() {
        let primary = ScriptedProvider::new("primary", vec![GeocodeOutcome::Found(wellington())]);
        let secondary = ScriptedProvider::new("secondary", vec![]);
        let policy = GeocodingPolicy::new("nz")
            .with_provider(primary.clone(), None)
            .with_provider(secondary.clone(), None);

        let resolution = policy.geocode(&ResolvedAddress::new("12 Main St, Wellington")).await;

        assert_eq!(
            resolution,
            Resolution::Resolved {
                coordinate: wellington(),
                provider: "primary"
            }
        );
        assert_eq!(primary.call_count(), 1);
        assert_eq!(secondary.call_count(), 0);
    }

    #[tokio::test]
    async fn falls_through_to_secondary_on_no_result() {
        let primary = ScriptedProvider::new("primary", vec![GeocodeOutcome::NoResult]);
        let secondary =
            ScriptedProvider::new("secondary", vec![GeocodeOutcome::Found(wellington())]);
        let policy = GeocodingPolicy::new("nz")
            .with_provider(primary.clone(), None)
            .with_provider(secondary.clone(), None);

        let resolution = policy.geocode(&ResolvedAddress::new("somewhere")).await;

        assert!(matches!(
            resolution,
            Resolution::Resolved {
                provider: "secondary",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn unresolved_when_every_provider_misses() {
        let primary = ScriptedProvider::new("primary", vec![]);
        let secondary = ScriptedProvider::new("secondary", vec![]);
        let policy = GeocodingPolicy::new("nz")
            .with_provider(primary.clone(), None)
            .with_provider(secondary.clone(), None);

        assert_eq!(
            policy.geocode(&ResolvedAddress::new("nowhere")).await,
            Resolution::Unresolved
        );
        assert_eq!(primary.call_count(), 1);
        assert_eq!(secondary.call_count(), 1);
    }

    #[tokio::test]
    async fn auth_rejection_disables_provider_for_rest_of_run() {
        let primary = ScriptedProvider::new("primary", vec![]);
        let secondary = ScriptedProvider::new(
            "secondary",
            vec![
                GeocodeOutcome::AuthRejected,
                GeocodeOutcome::Found(wellington()),
            ],
        );
        let policy = GeocodingPolicy::new("nz")
            .with_provider(primary.clone(), None)
            .with_provider(secondary.clone(), None);

        let first = policy.geocode(&ResolvedAddress::new("first address")).await;
        let second = policy.geocode(&ResolvedAddress::new("unrelated address")).await;

        assert_eq!(first, Resolution::Unresolved);
        assert_eq!(second, Resolution::Unresolved);
        assert_eq!(secondary.call_count(), 1);
        assert_eq!(primary.call_count(), 2);
        assert!(policy.is_disabled("secondary"));
        assert!(!policy.is_disabled("primary"));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_provider_calls_are_spaced_across_addresses() {
        let primary = ScriptedProvider::new(
            "primary",
            vec![
                GeocodeOutcome::Found(wellington()),
                GeocodeOutcome::Found(wellington()),
            ],
        );
        let policy = GeocodingPolicy::new("nz")
            .with_provider(primary.clone(), Some(Duration::from_secs(1)));

        let start = Instant::now();
        policy.geocode(&ResolvedAddress::new("first")).await;
        sleep(Duration::from_millis(300)).await;
        policy.geocode(&ResolvedAddress::new("second")).await;

        let times = primary.call_times();
        assert_eq!(times.len(), 2);
        assert_eq!(times[0], start);
        assert!(times[1].duration_since(times[0]) >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn unlimited_provider_is_not_delayed() {
        let primary = ScriptedProvider::new("primary", vec![]);
        let secondary = ScriptedProvider::new("secondary", vec![]);
        let policy = GeocodingPolicy::new("nz")
            .with_provider(primary.clone(), Some(Duration::from_secs(1)))
            .with_provider(secondary.clone(), None);

        policy.geocode(&ResolvedAddress::new("first")).await;
        policy.geocode(&ResolvedAddress::new("second")).await;

        let secondary_times = secondary.call_times();
        let primary_times = primary.call_times();
        assert_eq!(secondary_times[0], primary_times[0]);
        assert!(primary_times[1].duration_since(primary_times[0]) >= Duration::from_secs(1));
    }

    #[test]
    fn from_config_skips_google_without_key() {
        let config = crate::config::test_config();
        let policy = GeocodingPolicy::from_config(&config).unwrap();
        assert_eq!(policy.provider_names(), vec!["nominatim"]);
    }

    #[test]
    fn from_config_orders_nominatim_before_google() {
        let mut config = crate::config::test_config();
        config.google_geocoding_api_key = Some(secrecy::SecretString::from("k".to_string()));
        let policy = GeocodingPolicy::from_config(&config).unwrap();
        assert_eq!(policy.provider_names(), vec!["nominatim", "google"]);
    }
}
