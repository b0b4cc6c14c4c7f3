//! Orchestration: concurrent fan-out to every configured source, consensus
//! summary, and the per-process weather cache.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::task::JoinSet;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::geocode::Geocoder;
use crate::model::{
    AggregatedReport, Coordinates, DailyForecast, ProviderReading, Summary,
};
use crate::provider::{ProviderId, WeatherProvider, all_providers};

const WEATHER_CACHE_TTL: Duration = Duration::from_secs(300);
const WEATHER_CACHE_CAPACITY: usize = 100;

/// Sources consulted for the consensus description, first non-empty wins.
const DESCRIPTION_PRIORITY: [ProviderId; 2] =
    [ProviderId::OpenMeteo, ProviderId::OpenWeatherMap];

/// Sources that may supply the report forecast, first non-empty wins.
const FORECAST_PRIORITY: [ProviderId; 1] = [ProviderId::OpenMeteo];

/// The only aggregation failure surfaced to callers: neither explicit
/// coordinates nor geocoding produced a location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not resolve location '{place}'")]
pub struct ResolutionError {
    pub place: String,
}

/// Fans requests out to every provider, merges whatever answered, and keeps
/// short-lived results in its own cache. One instance per process; it owns
/// both caches, so tearing it down drops all cached state with it.
#[derive(Debug)]
pub struct WeatherAggregator {
    providers: Vec<Arc<dyn WeatherProvider>>,
    /// The designated air-quality source, queried outside the fan-out.
    air_source: Option<Arc<dyn WeatherProvider>>,
    geocoder: Geocoder,
    weather_cache: TtlCache<String, AggregatedReport>,
}

impl WeatherAggregator {
    pub fn from_config(config: &Config) -> Self {
        let providers = all_providers(config);
        let air_source = providers
            .iter()
            .find(|p| p.id() == ProviderId::OpenWeatherMap)
            .cloned();

        Self::with_parts(
            providers,
            air_source,
            Geocoder::new(),
            TtlCache::new(WEATHER_CACHE_CAPACITY, WEATHER_CACHE_TTL),
        )
    }

    fn with_parts(
        providers: Vec<Arc<dyn WeatherProvider>>,
        air_source: Option<Arc<dyn WeatherProvider>>,
        geocoder: Geocoder,
        weather_cache: TtlCache<String, AggregatedReport>,
    ) -> Self {
        Self {
            providers,
            air_source,
            geocoder,
            weather_cache,
        }
    }

    /// Aggregate current weather for a place, geocoding it first unless
    /// explicit coordinates are given.
    ///
    /// Partial upstream failure is invisible here: sources that error or
    /// time out simply do not appear in the readings map, and a report with
    /// zero sources is still a valid answer. Only a failed location
    /// resolution is an error.
    pub async fn get_weather(
        &self,
        place: &str,
        coordinates: Option<(f64, f64)>,
    ) -> Result<AggregatedReport, ResolutionError> {
        let (lat, lon, city) = match coordinates {
            Some((lat, lon)) => (lat, lon, place.to_string()),
            None => {
                let resolved =
                    self.geocoder
                        .resolve(place)
                        .await
                        .ok_or_else(|| ResolutionError {
                            place: place.to_string(),
                        })?;
                (resolved.latitude, resolved.longitude, resolved.name)
            }
        };

        let key = cache_key(lat, lon);
        if let Some(cached) = self.weather_cache.get(&key) {
            tracing::info!("weather cache hit for {city} ({key})");
            return Ok(cached);
        }

        tracing::info!(
            "querying {} sources for {city} ({lat}, {lon})",
            self.providers.len()
        );

        let readings = self.fan_out(lat, lon, &city).await;

        let air_quality = match &self.air_source {
            Some(source) => source.fetch_air_quality(lat, lon).await,
            None => None,
        };

        let report = AggregatedReport {
            total_sources: readings.len(),
            summary: summarize(&readings),
            forecast: extract_forecast(&readings),
            city,
            coordinates: Coordinates {
                latitude: lat,
                longitude: lon,
            },
            readings,
            air_quality,
            timestamp: Utc::now(),
        };

        self.weather_cache.put(key, report.clone());
        Ok(report)
    }

    /// Probe every provider's credential. Diagnostic only.
    pub async fn validate_keys(&self) -> BTreeMap<&'static str, bool> {
        crate::validate::validate_keys(&self.providers).await
    }

    /// One task per provider, full barrier: each call is bounded by its own
    /// request timeout, so the barrier is too. Collection is keyed by
    /// provider name, making the result deterministic regardless of which
    /// source answers first.
    async fn fan_out(
        &self,
        lat: f64,
        lon: f64,
        place_hint: &str,
    ) -> BTreeMap<String, ProviderReading> {
        let mut tasks = JoinSet::new();

        for provider in &self.providers {
            let provider = Arc::clone(provider);
            let hint = place_hint.to_string();
            tasks.spawn(async move {
                let reading = provider.fetch_weather(lat, lon, &hint).await;
                (provider.id(), reading)
            });
        }

        let mut readings = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Some(reading))) => {
                    readings.insert(id.as_str().to_string(), reading);
                }
                Ok((_, None)) => {}
                Err(error) => {
                    tracing::error!("provider task failed: {error}");
                }
            }
        }

        readings
    }
}

/// Weather cache key: coordinates rounded to 3 decimals (~110 m), so
/// near-duplicate requests for the same place share one slot instead of
/// each hitting the upstreams.
fn cache_key(lat: f64, lon: f64) -> String {
    format!("{lat:.3},{lon:.3}")
}

fn summarize(readings: &BTreeMap<String, ProviderReading>) -> Summary {
    Summary {
        temperature_c: mean(readings.values().filter_map(|r| r.temperature_c)).map(round1),
        humidity_pct: mean(readings.values().filter_map(|r| r.humidity_pct)).map(round0),
        wind_kmh: mean(readings.values().filter_map(|r| r.wind_kmh)).map(round1),
        pressure_hpa: mean(readings.values().filter_map(|r| r.pressure_hpa)).map(round0),
        description: consensus_description(readings),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;

    for value in values {
        sum += value;
        count += 1;
    }

    (count > 0).then(|| sum / count as f64)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round0(value: f64) -> i64 {
    value.round() as i64
}

fn consensus_description(readings: &BTreeMap<String, ProviderReading>) -> String {
    DESCRIPTION_PRIORITY
        .iter()
        .filter_map(|id| readings.get(id.as_str()))
        .filter_map(|reading| reading.description.as_deref())
        .find(|description| !description.is_empty())
        .unwrap_or("N/A")
        .to_string()
}

fn extract_forecast(readings: &BTreeMap<String, ProviderReading>) -> DailyForecast {
    let days = FORECAST_PRIORITY
        .iter()
        .filter_map(|id| readings.get(id.as_str()))
        .map(|reading| reading.forecast.clone())
        .find(|forecast| !forecast.is_empty())
        .unwrap_or_default();

    DailyForecast { days }
}
