use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::model::{ForecastDay, ProviderReading};

use super::{ProviderId, REQUEST_TIMEOUT, WeatherProvider, truncate_body};

const BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Keyless community source. Also the only one that ships a multi-day
/// forecast, which the aggregator lifts into the report.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    http: Client,
    base_url: String,
}

impl OpenMeteoProvider {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            base_url: BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn fetch(&self, lat: f64, lon: f64) -> Result<ProviderReading> {
        let res = self
            .http
            .get(&self.base_url)
            .timeout(REQUEST_TIMEOUT)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,surface_pressure,wind_speed_10m,weather_code"
                        .to_string(),
                ),
                (
                    "daily",
                    "temperature_2m_max,temperature_2m_min,precipitation_sum".to_string(),
                ),
                ("timezone", "auto".to_string()),
                ("forecast_days", "7".to_string()),
            ])
            .send()
            .await
            .context("Failed to send request to Open-Meteo")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("Failed to read Open-Meteo response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "Open-Meteo request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        parse_reading(&body)
    }
}

impl Default for OpenMeteoProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// WMO weather code to Spanish description. Unknown codes fall back to a
/// generic string rather than an error.
pub fn describe_weather_code(code: i64) -> &'static str {
    match code {
        0 => "Cielo despejado",
        1 => "Mayormente despejado",
        2 => "Parcialmente nublado",
        3 => "Nublado",
        45 | 48 => "Niebla",
        51 | 53 | 55 => "Llovizna ligera",
        56 | 57 => "Llovizna helada",
        61 => "Lluvia ligera",
        63 | 65 | 66 | 67 => "Lluvia",
        71 | 73 | 75 | 77 => "Nieve",
        80..=82 => "Chubascos ligeros",
        85 | 86 => "Chubascos de nieve",
        95 | 96 | 99 => "Tormenta",
        _ => "Clima variable",
    }
}

#[derive(Debug, Deserialize)]
struct OmCurrent {
    temperature_2m: Option<f64>,
    relative_humidity_2m: Option<f64>,
    surface_pressure: Option<f64>,
    wind_speed_10m: Option<f64>,
    weather_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OmDaily {
    time: Vec<String>,
    temperature_2m_max: Vec<f64>,
    temperature_2m_min: Vec<f64>,
    precipitation_sum: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    current: OmCurrent,
    daily: Option<OmDaily>,
}

fn parse_reading(body: &str) -> Result<ProviderReading> {
    let parsed: OmResponse =
        serde_json::from_str(body).context("Failed to parse Open-Meteo JSON")?;

    let current = parsed.current;
    let forecast = parsed.daily.map(forecast_days).unwrap_or_default();

    Ok(ProviderReading {
        source: ProviderId::OpenMeteo.display_name().to_string(),
        temperature_c: current.temperature_2m,
        humidity_pct: current.relative_humidity_2m,
        // Open-Meteo already reports wind in km/h.
        wind_kmh: current.wind_speed_10m,
        pressure_hpa: current.surface_pressure,
        description: current
            .weather_code
            .map(|code| describe_weather_code(code).to_string()),
        sunrise: None,
        sunset: None,
        forecast,
    })
}

fn forecast_days(daily: OmDaily) -> Vec<ForecastDay> {
    let mut days = Vec::with_capacity(daily.time.len());

    for (i, date) in daily.time.iter().enumerate() {
        let (Some(max), Some(min), Some(precip)) = (
            daily.temperature_2m_max.get(i),
            daily.temperature_2m_min.get(i),
            daily.precipitation_sum.get(i),
        ) else {
            break;
        };

        days.push(ForecastDay {
            date: date.clone(),
            temp_max_c: *max,
            temp_min_c: *min,
            precipitation_mm: *precip,
        });
    }

    days
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenMeteo
    }

    async fn fetch_weather(
        &self,
        lat: f64,
        lon: f64,
        _place_hint: &str,
    ) -> Option<ProviderReading> {
        match self.fetch(lat, lon).await {
            Ok(reading) => Some(reading),
            Err(error) => {
                tracing::warn!("[{}] request failed: {error:#}", self.id());
                None
            }
        }
    }

    async fn validate_key(&self) -> bool {
        // No credential required.
        true
    }
}
