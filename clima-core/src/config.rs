use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use crate::provider::ProviderId;

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

/// Top-level configuration stored on disk.
///
/// A provider missing from the map (or with an empty key) is simply
/// disabled; the aggregator still runs with whatever remains.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Example TOML:
    /// [providers.openweathermap]
    /// api_key = "..."
    pub providers: HashMap<String, ProviderConfig>,
}

/// Environment variable that overrides a provider's configured key, for
/// the providers that take one.
fn env_var(id: ProviderId) -> Option<&'static str> {
    match id {
        ProviderId::OpenMeteo => None,
        ProviderId::OpenWeatherMap => Some("OPENWEATHERMAP_API_KEY"),
        ProviderId::Meteosource => Some("METEOSOURCE_API_KEY"),
    }
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    /// Load config from disk and apply environment overrides on top.
    pub fn load_with_env() -> Result<Self> {
        let mut cfg = Self::load()?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "clima", "clima-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set or replace a provider API key.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers
            .insert(provider_id.as_str().to_string(), ProviderConfig { api_key });
    }

    /// Returns the API key for a provider, if a non-empty one is present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers
            .get(provider_id.as_str())
            .map(|cfg| cfg.api_key.as_str())
            .filter(|key| !key.is_empty())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some()
    }

    fn apply_env_overrides(&mut self) {
        for id in ProviderId::all() {
            let Some(var) = env_var(*id) else { continue };

            if let Ok(value) = std::env::var(var)
                && !value.is_empty()
            {
                self.upsert_provider_api_key(*id, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_api_key_for_provider() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::OpenWeatherMap, "OWM_KEY".into());

        let key = cfg.provider_api_key(ProviderId::OpenWeatherMap);
        assert_eq!(key, Some("OWM_KEY"));
        assert!(cfg.is_provider_configured(ProviderId::OpenWeatherMap));
        assert!(!cfg.is_provider_configured(ProviderId::Meteosource));
    }

    #[test]
    fn empty_api_key_counts_as_unconfigured() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::Meteosource, String::new());

        assert_eq!(cfg.provider_api_key(ProviderId::Meteosource), None);
        assert!(!cfg.is_provider_configured(ProviderId::Meteosource));
    }

    #[test]
    fn upsert_replaces_existing_key() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::OpenWeatherMap, "OLD".into());
        cfg.upsert_provider_api_key(ProviderId::OpenWeatherMap, "NEW".into());

        assert_eq!(
            cfg.provider_api_key(ProviderId::OpenWeatherMap),
            Some("NEW")
        );
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeatherMap, "OWM_KEY".into());
        cfg.upsert_provider_api_key(ProviderId::Meteosource, "MS_KEY".into());
        cfg.save_to(&path).expect("save");

        let loaded = Config::load_from(&path).expect("load");
        assert_eq!(
            loaded.provider_api_key(ProviderId::OpenWeatherMap),
            Some("OWM_KEY")
        );
        assert_eq!(
            loaded.provider_api_key(ProviderId::Meteosource),
            Some("MS_KEY")
        );
    }

    #[test]
    fn load_from_missing_file_returns_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_from(&dir.path().join("absent.toml")).expect("load");
        assert!(cfg.providers.is_empty());
    }

    #[test]
    fn env_override_wins_over_file_value() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::Meteosource, "FROM_FILE".into());

        // SAFETY: this test owns METEOSOURCE_API_KEY; no other test reads it.
        unsafe { std::env::set_var("METEOSOURCE_API_KEY", "FROM_ENV") };
        cfg.apply_env_overrides();
        unsafe { std::env::remove_var("METEOSOURCE_API_KEY") };

        assert_eq!(
            cfg.provider_api_key(ProviderId::Meteosource),
            Some("FROM_ENV")
        );
    }
}
