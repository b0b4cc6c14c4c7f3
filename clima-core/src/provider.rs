use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::Config;
use crate::model::{AirQuality, ProviderReading};
use crate::provider::{
    meteosource::MeteosourceProvider, open_meteo::OpenMeteoProvider,
    openweathermap::OpenWeatherMapProvider,
};

pub mod meteosource;
pub mod open_meteo;
pub mod openweathermap;

/// Hard ceiling for any single upstream request, applied per request so a
/// stalled source can delay a fan-out by at most this much.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenMeteo,
    OpenWeatherMap,
    Meteosource,
}

impl ProviderId {
    /// Stable key used in the readings map, config and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenMeteo => "open_meteo",
            ProviderId::OpenWeatherMap => "openweathermap",
            ProviderId::Meteosource => "meteosource",
        }
    }

    /// Human-readable name carried inside each reading.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::OpenMeteo => "Open-Meteo",
            ProviderId::OpenWeatherMap => "OpenWeatherMap",
            ProviderId::Meteosource => "Meteosource",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[
            ProviderId::OpenMeteo,
            ProviderId::OpenWeatherMap,
            ProviderId::Meteosource,
        ]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "open_meteo" => Ok(ProviderId::OpenMeteo),
            "openweathermap" => Ok(ProviderId::OpenWeatherMap),
            "meteosource" => Ok(ProviderId::Meteosource),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: open_meteo, openweathermap, meteosource."
            )),
        }
    }
}

/// A single upstream weather source.
///
/// `fetch_weather` never fails outward: transport errors, non-2xx statuses
/// and malformed payloads are logged with the provider name and collapse to
/// `None`, and a provider without a configured credential answers `None`
/// before touching the network. The orchestrator only sees readings that
/// actually arrived.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    async fn fetch_weather(&self, lat: f64, lon: f64, place_hint: &str)
    -> Option<ProviderReading>;

    /// Air quality for the same point, reported by at most one source.
    /// Independent of the weather call; its failure never taints readings.
    async fn fetch_air_quality(&self, _lat: f64, _lon: f64) -> Option<AirQuality> {
        None
    }

    /// One cheap probe confirming the configured credential is live.
    /// Keyless providers answer `true` and unconfigured ones `false`, both
    /// without a network call.
    async fn validate_key(&self) -> bool;
}

/// Build the full, statically-known provider set from configuration.
///
/// Providers whose API key is absent are still constructed; they disable
/// themselves per call instead of failing the set.
pub fn all_providers(config: &Config) -> Vec<Arc<dyn WeatherProvider>> {
    vec![
        Arc::new(OpenMeteoProvider::new()),
        Arc::new(OpenWeatherMapProvider::new(
            config.provider_api_key(ProviderId::OpenWeatherMap).map(str::to_owned),
        )),
        Arc::new(MeteosourceProvider::new(
            config.provider_api_key(ProviderId::Meteosource).map(str::to_owned),
        )),
    ]
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        format!("{}...", &body[..MAX])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let s = id.as_str();
            let parsed = ProviderId::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn display_names_differ_from_keys() {
        assert_eq!(ProviderId::OpenMeteo.display_name(), "Open-Meteo");
        assert_eq!(ProviderId::OpenMeteo.as_str(), "open_meteo");
        assert_eq!(ProviderId::OpenWeatherMap.to_string(), "openweathermap");
    }

    #[test]
    fn all_providers_covers_every_id() {
        let cfg = Config::default();
        let providers = all_providers(&cfg);

        let ids: Vec<_> = providers.iter().map(|p| p.id()).collect();
        assert_eq!(ids, ProviderId::all());
    }

    #[test]
    fn truncate_body_caps_long_payloads() {
        let long = "x".repeat(500);
        let truncated = truncate_body(&long);
        assert_eq!(truncated.len(), 203);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate_body("short"), "short");
    }
}
