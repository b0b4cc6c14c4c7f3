//! Static registry of the IDEAM weather radar stations published through
//! AWS Open Data. Lookup-only; nothing here talks to the network.

use serde::Serialize;

/// A fixed radar station.
///
/// Uses `&'static str` fields so the registry can live in a static array;
/// it is serialize-only, lookups go through [`radar_by_name`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RadarStation {
    #[serde(rename = "nombre")]
    pub name: &'static str,
    #[serde(rename = "codigo")]
    pub code: &'static str,
    #[serde(rename = "ubicacion")]
    pub location: &'static str,
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "cobertura_km")]
    pub coverage_km: u32,
    #[serde(rename = "tipo")]
    pub band: &'static str,
    #[serde(rename = "estado")]
    pub status: &'static str,
}

static RADARS: [RadarStation; 4] = [
    RadarStation {
        name: "Barrancabermeja",
        code: "BAR",
        location: "Barrancabermeja, Santander",
        lat: 7.0653,
        lon: -73.8547,
        coverage_km: 240,
        band: "Banda C",
        status: "activo",
    },
    RadarStation {
        name: "Guaviare",
        code: "GUA",
        location: "San José del Guaviare",
        lat: 2.5694,
        lon: -72.6411,
        coverage_km: 240,
        band: "Banda C",
        status: "activo",
    },
    RadarStation {
        name: "Munchique",
        code: "MUN",
        location: "Popayán, Cauca",
        lat: 2.5458,
        lon: -76.9631,
        coverage_km: 240,
        band: "Banda C",
        status: "activo",
    },
    RadarStation {
        name: "Carimagua",
        code: "CAR",
        location: "Puerto Gaitán, Meta",
        lat: 4.5694,
        lon: -71.3292,
        coverage_km: 240,
        band: "Banda C",
        status: "activo",
    },
];

/// Every known station, in registry order.
pub fn all_radars() -> &'static [RadarStation] {
    &RADARS
}

/// Find a station by name or code, case-insensitively.
pub fn radar_by_name(query: &str) -> Option<&'static RadarStation> {
    RADARS.iter().find(|radar| {
        radar.name.eq_ignore_ascii_case(query) || radar.code.eq_ignore_ascii_case(query)
    })
}
