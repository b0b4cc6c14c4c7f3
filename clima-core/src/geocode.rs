//! Free-text place resolution backed by the Open-Meteo geocoding API, with
//! its own cache so repeated lookups of the same name stay off the network
//! for an hour.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::Deserialize;

use crate::cache::TtlCache;
use crate::provider::{REQUEST_TIMEOUT, truncate_body};

const GEOCODE_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const CACHE_TTL: Duration = Duration::from_secs(3600);
const CACHE_CAPACITY: usize = 100;

/// Top geocoding match for a place name.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug)]
pub struct Geocoder {
    http: Client,
    base_url: String,
    cache: TtlCache<String, ResolvedLocation>,
}

impl Geocoder {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            base_url: GEOCODE_URL.to_string(),
            cache: TtlCache::new(CACHE_CAPACITY, CACHE_TTL),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            cache: TtlCache::new(CACHE_CAPACITY, CACHE_TTL),
        }
    }

    /// Resolve a place name to coordinates. Cache first (exact,
    /// case-sensitive string match); on a miss, a single upstream lookup.
    /// Any failure or empty result set is `None`, with no retry.
    pub async fn resolve(&self, place: &str) -> Option<ResolvedLocation> {
        if let Some(hit) = self.cache.get(&place.to_string()) {
            tracing::debug!("geocoding cache hit for '{place}'");
            return Some(hit);
        }

        match self.lookup(place).await {
            Ok(Some(location)) => {
                self.cache.put(place.to_string(), location.clone());
                Some(location)
            }
            Ok(None) => {
                tracing::warn!("no geocoding match for '{place}'");
                None
            }
            Err(error) => {
                tracing::warn!("geocoding failed for '{place}': {error:#}");
                None
            }
        }
    }

    async fn lookup(&self, place: &str) -> Result<Option<ResolvedLocation>> {
        let res = self
            .http
            .get(&self.base_url)
            .timeout(REQUEST_TIMEOUT)
            .query(&[("name", place), ("count", "1"), ("language", "es")])
            .send()
            .await
            .context("Failed to send geocoding request")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("Failed to read geocoding response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "Geocoding request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        parse_top_match(&body)
    }
}

impl Default for Geocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct GeoResult {
    name: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    #[serde(default)]
    results: Vec<GeoResult>,
}

fn parse_top_match(body: &str) -> Result<Option<ResolvedLocation>> {
    let parsed: GeoResponse =
        serde_json::from_str(body).context("Failed to parse geocoding JSON")?;

    Ok(parsed.results.into_iter().next().map(|top| ResolvedLocation {
        name: top.name,
        latitude: top.latitude,
        longitude: top.longitude,
    }))
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const FIXTURE: &str = r#"{
        "results": [
            {"name": "Bogotá", "latitude": 4.60971, "longitude": -74.08175, "country": "Colombia"}
        ]
    }"#;

    #[test]
    fn parse_picks_top_match() {
        let location = parse_top_match(FIXTURE).expect("parse").expect("match");
        assert_eq!(location.name, "Bogotá");
        assert_eq!(location.latitude, 4.60971);
    }

    #[test]
    fn parse_handles_missing_results_field() {
        assert_eq!(parse_top_match("{}").expect("parse"), None);
        assert_eq!(parse_top_match(r#"{"results": []}"#).expect("parse"), None);
    }

    #[tokio::test]
    async fn resolve_caches_and_hits_upstream_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("name", "Bogotá"))
            .and(query_param("count", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(FIXTURE, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let geocoder = Geocoder::with_base_url(server.uri());

        let first = geocoder.resolve("Bogotá").await.expect("first resolve");
        let second = geocoder.resolve("Bogotá").await.expect("second resolve");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn resolve_is_case_sensitive_on_the_cache_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(FIXTURE, "application/json"))
            .expect(2)
            .mount(&server)
            .await;

        let geocoder = Geocoder::with_base_url(server.uri());
        geocoder.resolve("Bogotá").await.expect("resolve");
        geocoder.resolve("bogotá").await.expect("resolve");
    }

    #[tokio::test]
    async fn resolve_returns_none_on_empty_result_set() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(r#"{"results": []}"#, "application/json"),
            )
            .mount(&server)
            .await;

        let geocoder = Geocoder::with_base_url(server.uri());
        assert_eq!(geocoder.resolve("Nowhereville").await, None);
    }

    #[tokio::test]
    async fn resolve_returns_none_on_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let geocoder = Geocoder::with_base_url(server.uri());
        assert_eq!(geocoder.resolve("Bogotá").await, None);
    }
}
