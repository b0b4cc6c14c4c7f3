use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One provider's normalized view of current conditions.
///
/// Every numeric field is optional because the upstream sources disagree on
/// what they expose; a missing field simply does not contribute to the
/// consensus summary. Wire keys follow the public API contract, which
/// predates this crate and is Spanish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderReading {
    /// Human-readable source name, e.g. "Open-Meteo".
    #[serde(rename = "fuente")]
    pub source: String,

    /// Temperature in degrees Celsius.
    #[serde(rename = "temperatura")]
    pub temperature_c: Option<f64>,

    /// Relative humidity in percent.
    #[serde(rename = "humedad")]
    pub humidity_pct: Option<f64>,

    /// Wind speed in km/h.
    #[serde(rename = "viento_velocidad")]
    pub wind_kmh: Option<f64>,

    /// Surface pressure in hPa.
    #[serde(rename = "presion")]
    pub pressure_hpa: Option<f64>,

    /// Textual conditions in the upstream's own words (or a mapped code).
    #[serde(rename = "descripcion")]
    pub description: Option<String>,

    /// Local sunrise time formatted "HH:MM", where the source provides it.
    #[serde(rename = "amanecer", skip_serializing_if = "Option::is_none")]
    pub sunrise: Option<String>,

    /// Local sunset time formatted "HH:MM", where the source provides it.
    #[serde(rename = "atardecer", skip_serializing_if = "Option::is_none")]
    pub sunset: Option<String>,

    /// Multi-day forecast, only for sources that offer one.
    #[serde(
        rename = "pronostico_diario",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub forecast: Vec<ForecastDay>,
}

/// A single day of forecast data, chronological within its list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    #[serde(rename = "fecha")]
    pub date: String,
    #[serde(rename = "temp_max")]
    pub temp_max_c: f64,
    #[serde(rename = "temp_min")]
    pub temp_min_c: f64,
    #[serde(rename = "precipitacion")]
    pub precipitation_mm: f64,
}

/// Air quality snapshot from the one source that reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQuality {
    /// Ordinal index 1 (best) to 5 (worst).
    #[serde(rename = "aqi")]
    pub index: u8,
    #[serde(rename = "aqi_label")]
    pub label: String,
    /// Component concentrations (µg/m³), keyed by pollutant code.
    #[serde(rename = "componentes")]
    pub components: BTreeMap<String, f64>,
}

/// Geographic point carried in the aggregated report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Consensus across all sources that answered.
///
/// Each numeric field is the arithmetic mean of the non-null provider
/// values: temperature and wind rounded to one decimal, humidity and
/// pressure to the nearest integer. Null when no source supplied the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(rename = "temperatura")]
    pub temperature_c: Option<f64>,
    #[serde(rename = "humedad")]
    pub humidity_pct: Option<i64>,
    #[serde(rename = "viento")]
    pub wind_kmh: Option<f64>,
    #[serde(rename = "presion")]
    pub pressure_hpa: Option<i64>,
    #[serde(rename = "descripcion")]
    pub description: String,
}

/// Forecast section of the aggregated report.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DailyForecast {
    #[serde(rename = "diario")]
    pub days: Vec<ForecastDay>,
}

/// The unified answer for one location, suitable for direct serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedReport {
    #[serde(rename = "ciudad")]
    pub city: String,
    #[serde(rename = "coordenadas")]
    pub coordinates: Coordinates,
    /// Number of sources that actually answered this request.
    #[serde(rename = "total_fuentes")]
    pub total_sources: usize,
    #[serde(rename = "resumen")]
    pub summary: Summary,
    /// Per-source readings keyed by provider name; absent key means the
    /// provider did not answer.
    #[serde(rename = "fuentes")]
    pub readings: BTreeMap<String, ProviderReading>,
    #[serde(rename = "calidad_aire")]
    pub air_quality: Option<AirQuality>,
    #[serde(rename = "pronostico")]
    pub forecast: DailyForecast,
    /// When this report was computed; cached hits return it unchanged.
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_reading() -> ProviderReading {
        ProviderReading {
            source: "Open-Meteo".to_string(),
            temperature_c: Some(18.4),
            humidity_pct: Some(72.0),
            wind_kmh: Some(11.2),
            pressure_hpa: Some(1016.0),
            description: Some("Nublado".to_string()),
            sunrise: None,
            sunset: None,
            forecast: vec![ForecastDay {
                date: "2026-08-07".to_string(),
                temp_max_c: 20.1,
                temp_min_c: 9.8,
                precipitation_mm: 0.4,
            }],
        }
    }

    #[test]
    fn report_serializes_with_wire_keys() {
        let mut readings = BTreeMap::new();
        readings.insert("open_meteo".to_string(), sample_reading());

        let report = AggregatedReport {
            city: "Bogotá".to_string(),
            coordinates: Coordinates {
                latitude: 4.711,
                longitude: -74.072,
            },
            total_sources: 1,
            summary: Summary {
                temperature_c: Some(18.4),
                humidity_pct: Some(72),
                wind_kmh: Some(11.2),
                pressure_hpa: Some(1016),
                description: "Nublado".to_string(),
            },
            readings,
            air_quality: None,
            forecast: DailyForecast::default(),
            timestamp: Utc::now(),
        };

        let value = serde_json::to_value(&report).expect("serialize");
        assert_eq!(value["ciudad"], "Bogotá");
        assert_eq!(value["total_fuentes"], 1);
        assert_eq!(value["resumen"]["temperatura"], 18.4);
        assert_eq!(value["resumen"]["humedad"], 72);
        assert_eq!(value["fuentes"]["open_meteo"]["fuente"], "Open-Meteo");
        assert_eq!(
            value["fuentes"]["open_meteo"]["pronostico_diario"][0]["fecha"],
            "2026-08-07"
        );
        assert_eq!(value["coordenadas"]["latitude"], 4.711);
        assert!(value["calidad_aire"].is_null());
        assert_eq!(value["pronostico"]["diario"], serde_json::json!([]));
    }

    #[test]
    fn reading_omits_absent_extras() {
        let mut reading = sample_reading();
        reading.forecast.clear();

        let value = serde_json::to_value(&reading).expect("serialize");
        let map = value.as_object().expect("object");
        assert!(!map.contains_key("amanecer"));
        assert!(!map.contains_key("atardecer"));
        assert!(!map.contains_key("pronostico_diario"));
        // Null numeric fields stay present so consumers see every column.
        assert!(map.contains_key("humedad"));
    }

    #[test]
    fn reading_roundtrips_through_json() {
        let reading = sample_reading();
        let json = serde_json::to_string(&reading).expect("serialize");
        let back: ProviderReading = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, reading);
    }
}
