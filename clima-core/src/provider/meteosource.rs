use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::model::ProviderReading;

use super::{ProviderId, REQUEST_TIMEOUT, WeatherProvider, truncate_body};

const BASE_URL: &str = "https://www.meteosource.com/api/v1/free/point";

/// Keyed source on the free tier, queried by place id when a place hint is
/// available, by raw coordinates otherwise.
#[derive(Debug, Clone)]
pub struct MeteosourceProvider {
    api_key: Option<String>,
    http: Client,
    base_url: String,
}

impl MeteosourceProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            http: Client::new(),
            base_url: BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key,
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn fetch(
        &self,
        api_key: &str,
        lat: f64,
        lon: f64,
        place_hint: &str,
    ) -> Result<ProviderReading> {
        let place_id = if place_hint.is_empty() {
            format!("{lat},{lon}")
        } else {
            place_hint.to_lowercase()
        };

        let res = self
            .http
            .get(&self.base_url)
            .timeout(REQUEST_TIMEOUT)
            .query(&[
                ("key", api_key),
                ("place_id", place_id.as_str()),
                ("sections", "current"),
                ("language", "es"),
            ])
            .send()
            .await
            .context("Failed to send request to Meteosource")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("Failed to read Meteosource response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "Meteosource request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        parse_reading(&body)
    }
}

#[derive(Debug, Deserialize)]
struct MsWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct MsCurrent {
    temperature: f64,
    wind: MsWind,
    pressure: Option<f64>,
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MsResponse {
    current: MsCurrent,
}

fn parse_reading(body: &str) -> Result<ProviderReading> {
    let parsed: MsResponse =
        serde_json::from_str(body).context("Failed to parse Meteosource JSON")?;

    let current = parsed.current;

    Ok(ProviderReading {
        source: ProviderId::Meteosource.display_name().to_string(),
        temperature_c: Some(current.temperature),
        // The free point endpoint does not expose humidity.
        humidity_pct: None,
        wind_kmh: Some(current.wind.speed),
        pressure_hpa: current.pressure,
        description: current.summary,
        sunrise: None,
        sunset: None,
        forecast: Vec::new(),
    })
}

#[async_trait]
impl WeatherProvider for MeteosourceProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Meteosource
    }

    async fn fetch_weather(
        &self,
        lat: f64,
        lon: f64,
        place_hint: &str,
    ) -> Option<ProviderReading> {
        let api_key = self.api_key.as_deref()?;

        match self.fetch(api_key, lat, lon, place_hint).await {
            Ok(reading) => Some(reading),
            Err(error) => {
                tracing::warn!("[{}] request failed: {error:#}", self.id());
                None
            }
        }
    }

    async fn validate_key(&self) -> bool {
        match self.api_key.as_deref() {
            // Fixed well-known point so the probe stays cheap and cacheable
            // upstream.
            Some(api_key) => self.fetch(api_key, 4.7, -74.0, "bogota").await.is_ok(),
            None => false,
        }
    }
}
