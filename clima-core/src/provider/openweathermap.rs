use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{Local, TimeZone};
use reqwest::Client;
use serde::Deserialize;

use crate::model::{AirQuality, ProviderReading};

use super::{ProviderId, REQUEST_TIMEOUT, WeatherProvider, truncate_body};

const WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const AIR_URL: &str = "https://api.openweathermap.org/data/2.5/air_pollution";

/// Keyed source, and the designated one for air quality.
#[derive(Debug, Clone)]
pub struct OpenWeatherMapProvider {
    api_key: Option<String>,
    http: Client,
    weather_url: String,
    air_url: String,
}

impl OpenWeatherMapProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            http: Client::new(),
            weather_url: WEATHER_URL.to_string(),
            air_url: AIR_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_urls(
        api_key: Option<String>,
        weather_url: impl Into<String>,
        air_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key,
            http: Client::new(),
            weather_url: weather_url.into(),
            air_url: air_url.into(),
        }
    }

    async fn fetch(&self, api_key: &str, lat: f64, lon: f64) -> Result<ProviderReading> {
        let res = self
            .http
            .get(&self.weather_url)
            .timeout(REQUEST_TIMEOUT)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("appid", api_key.to_string()),
                ("units", "metric".to_string()),
                ("lang", "es".to_string()),
            ])
            .send()
            .await
            .context("Failed to send request to OpenWeatherMap (current weather)")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("Failed to read OpenWeatherMap response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "OpenWeatherMap request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        parse_reading(&body)
    }

    async fn fetch_air(&self, api_key: &str, lat: f64, lon: f64) -> Result<AirQuality> {
        let res = self
            .http
            .get(&self.air_url)
            .timeout(REQUEST_TIMEOUT)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("appid", api_key.to_string()),
            ])
            .send()
            .await
            .context("Failed to send request to OpenWeatherMap (air pollution)")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("Failed to read OpenWeatherMap air pollution body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "OpenWeatherMap air pollution request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        parse_air_quality(&body)
    }
}

/// OpenWeatherMap AQI ordinal (1–5) to its Spanish label.
pub fn aqi_label(index: u8) -> &'static str {
    match index {
        1 => "Excelente",
        2 => "Bueno",
        3 => "Moderado",
        4 => "Pobre",
        5 => "Muy Pobre",
        _ => "N/A",
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: f64,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    sunrise: Option<i64>,
    sunset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
    sys: Option<OwSys>,
}

#[derive(Debug, Deserialize)]
struct OwAirMain {
    aqi: u8,
}

#[derive(Debug, Deserialize)]
struct OwAirEntry {
    main: OwAirMain,
    components: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct OwAirResponse {
    list: Vec<OwAirEntry>,
}

fn parse_reading(body: &str) -> Result<ProviderReading> {
    let parsed: OwCurrentResponse =
        serde_json::from_str(body).context("Failed to parse OpenWeatherMap JSON")?;

    let description = parsed.weather.first().map(|w| w.description.clone());
    let sys = parsed.sys.as_ref();

    Ok(ProviderReading {
        source: ProviderId::OpenWeatherMap.display_name().to_string(),
        temperature_c: Some(parsed.main.temp),
        humidity_pct: Some(parsed.main.humidity),
        // Upstream reports m/s; the common schema is km/h.
        wind_kmh: Some(parsed.wind.speed * 3.6),
        pressure_hpa: Some(parsed.main.pressure),
        description,
        sunrise: sys.and_then(|s| s.sunrise).and_then(local_hm),
        sunset: sys.and_then(|s| s.sunset).and_then(local_hm),
        forecast: Vec::new(),
    })
}

fn parse_air_quality(body: &str) -> Result<AirQuality> {
    let parsed: OwAirResponse =
        serde_json::from_str(body).context("Failed to parse OpenWeatherMap air pollution JSON")?;

    let entry = parsed
        .list
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("OpenWeatherMap air pollution response contained no data"))?;

    Ok(AirQuality {
        index: entry.main.aqi,
        label: aqi_label(entry.main.aqi).to_string(),
        components: entry.components,
    })
}

fn local_hm(ts: i64) -> Option<String> {
    Local
        .timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%H:%M").to_string())
}

#[async_trait]
impl WeatherProvider for OpenWeatherMapProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeatherMap
    }

    async fn fetch_weather(
        &self,
        lat: f64,
        lon: f64,
        _place_hint: &str,
    ) -> Option<ProviderReading> {
        let api_key = self.api_key.as_deref()?;

        match self.fetch(api_key, lat, lon).await {
            Ok(reading) => Some(reading),
            Err(error) => {
                tracing::warn!("[{}] request failed: {error:#}", self.id());
                None
            }
        }
    }

    async fn fetch_air_quality(&self, lat: f64, lon: f64) -> Option<AirQuality> {
        let api_key = self.api_key.as_deref()?;

        match self.fetch_air(api_key, lat, lon).await {
            Ok(air) => Some(air),
            Err(error) => {
                tracing::warn!("[{}] air pollution request failed: {error:#}", self.id());
                None
            }
        }
    }

    async fn validate_key(&self) -> bool {
        match self.api_key.as_deref() {
            // Probe with a throwaway point; any authorized answer counts.
            Some(api_key) => self.fetch(api_key, 0.0, 0.0).await.is_ok(),
            None => false,
        }
    }
}
