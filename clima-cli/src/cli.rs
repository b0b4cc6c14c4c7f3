use anyhow::Context;
use clap::{Parser, Subcommand};

use clima_core::{
    AggregatedReport, Config, ProviderId, WeatherAggregator, all_radars, radar_by_name,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "clima", version, about = "Multi-source weather aggregator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show aggregated weather for a place.
    Show {
        /// Place name, e.g. "Bogotá".
        place: String,

        /// Explicit latitude; skips geocoding when given with --lon.
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Explicit longitude.
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Print the raw JSON report instead of the text summary.
        #[arg(long)]
        json: bool,
    },

    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "openweathermap" or "meteosource".
        provider: String,
    },

    /// Probe each provider's credential and report the outcome.
    Validate,

    /// List the radar stations, or look one up by name or code.
    Radars {
        /// Optional station name or code, e.g. "Guaviare" or "GUA".
        name: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Show {
                place,
                lat,
                lon,
                json,
            } => show(&place, lat.zip(lon), json).await,
            Command::Configure { provider } => configure(&provider),
            Command::Validate => validate().await,
            Command::Radars { name } => radars(name.as_deref()),
        }
    }
}

async fn show(place: &str, coordinates: Option<(f64, f64)>, json: bool) -> anyhow::Result<()> {
    let config = Config::load_with_env()?;
    let aggregator = WeatherAggregator::from_config(&config);

    let report = aggregator.get_weather(place, coordinates).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &AggregatedReport) {
    println!(
        "{} ({:.3}, {:.3})",
        report.city, report.coordinates.latitude, report.coordinates.longitude
    );
    println!("Fuentes que respondieron: {}", report.total_sources);

    let summary = &report.summary;
    println!("  {}", summary.description);
    if let Some(temperature) = summary.temperature_c {
        println!("  Temperatura: {temperature:.1} °C");
    }
    if let Some(humidity) = summary.humidity_pct {
        println!("  Humedad: {humidity}%");
    }
    if let Some(wind) = summary.wind_kmh {
        println!("  Viento: {wind:.1} km/h");
    }
    if let Some(pressure) = summary.pressure_hpa {
        println!("  Presión: {pressure} hPa");
    }

    if let Some(air) = &report.air_quality {
        println!("  Calidad del aire: {} ({})", air.label, air.index);
    }

    if !report.readings.is_empty() {
        println!("Por fuente:");
        for (name, reading) in &report.readings {
            match reading.temperature_c {
                Some(temperature) => println!("  {name}: {temperature:.1} °C"),
                None => println!("  {name}: sin temperatura"),
            }
        }
    }

    if !report.forecast.days.is_empty() {
        println!("Pronóstico:");
        for day in &report.forecast.days {
            println!(
                "  {}  {:.1} / {:.1} °C  {:.1} mm",
                day.date, day.temp_max_c, day.temp_min_c, day.precipitation_mm
            );
        }
    }
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;

    if id == ProviderId::OpenMeteo {
        println!("{id} does not use an API key; nothing to configure.");
        return Ok(());
    }

    let api_key = inquire::Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let mut config = Config::load()?;
    config.upsert_provider_api_key(id, api_key);
    config.save()?;

    println!("Stored API key for {id}.");
    Ok(())
}

async fn validate() -> anyhow::Result<()> {
    let config = Config::load_with_env()?;
    let aggregator = WeatherAggregator::from_config(&config);

    for (name, ok) in aggregator.validate_keys().await {
        let verdict = if ok { "ok" } else { "sin credencial o sin respuesta" };
        println!("{name:<16} {verdict}");
    }

    Ok(())
}

fn radars(name: Option<&str>) -> anyhow::Result<()> {
    match name {
        Some(query) => match radar_by_name(query) {
            Some(station) => println!("{}", serde_json::to_string_pretty(station)?),
            None => anyhow::bail!("Unknown radar station '{query}'"),
        },
        None => {
            for station in all_radars() {
                println!(
                    "{:<18} {}  {}",
                    station.name, station.code, station.location
                );
            }
        }
    }

    Ok(())
}
