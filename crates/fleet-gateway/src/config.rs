//! Layered application settings
//!
//! Defaults come from the serde `default` functions below, a `fleet.toml`
//! next to the binary overrides them, and `FLEET__`-prefixed environment
//! variables override both (`FLEET__GATEWAY__REFRESH_INTERVAL_SECS=10`).

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Backing database settings
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

/// Ingestion endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct HubSettings {
    /// Registration service base URL
    #[serde(default)]
    pub endpoint: String,

    /// Group enrollment key (base64); device keys are derived from it
    #[serde(default)]
    pub enrollment_key: String,

    /// Device template model ID sent with each registration
    #[serde(default)]
    pub model_id: String,

    /// MQTT port on the assigned host
    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,
}

/// Synthetic data generator settings
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Seconds between generation rounds
    #[serde(default = "default_generation_interval")]
    pub generation_interval_secs: u64,

    /// Number of stations to generate data for
    #[serde(default = "default_station_count")]
    pub station_count: u32,
}

/// Gateway polling settings
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between polling cycles
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Devices provisioned or connected concurrently per batch
    #[serde(default = "default_concurrency")]
    pub concurrent_connection_limit: usize,

    /// Telemetry messages in flight concurrently per batch
    #[serde(default = "default_concurrency")]
    pub concurrent_message_limit: usize,
}

/// Root settings tree
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub hub: HubSettings,
    #[serde(default)]
    pub generator: GeneratorSettings,
    #[serde(default)]
    pub gateway: GatewaySettings,
}

impl Settings {
    /// Load settings from `fleet.toml` (optional) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("fleet").required(false))
            .add_source(Environment::with_prefix("FLEET").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.gateway.refresh_interval_secs)
    }

    pub fn generation_interval(&self) -> Duration {
        Duration::from_secs(self.generator.generation_interval_secs)
    }
}

fn default_database_url() -> String {
    "sqlite://fleet.db?mode=rwc".to_string()
}

fn default_mqtt_port() -> u16 {
    8883
}

fn default_generation_interval() -> u64 {
    60
}

fn default_station_count() -> u32 {
    300
}

fn default_refresh_interval() -> u64 {
    60
}

fn default_concurrency() -> usize {
    100
}

fn default_true() -> bool {
    true
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            enrollment_key: String::new(),
            model_id: String::new(),
            mqtt_port: default_mqtt_port(),
        }
    }
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            generation_interval_secs: default_generation_interval(),
            station_count: default_station_count(),
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_interval_secs: default_refresh_interval(),
            concurrent_connection_limit: default_concurrency(),
            concurrent_message_limit: default_concurrency(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseSettings::default(),
            hub: HubSettings::default(),
            generator: GeneratorSettings::default(),
            gateway: GatewaySettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let settings = Settings::default();
        assert!(settings.gateway.enabled);
        assert!(!settings.generator.enabled);
        assert_eq!(settings.gateway.refresh_interval_secs, 60);
        assert_eq!(settings.gateway.concurrent_connection_limit, 100);
        assert_eq!(settings.gateway.concurrent_message_limit, 100);
        assert_eq!(settings.generator.station_count, 300);
        assert_eq!(settings.hub.mqtt_port, 8883);
    }
}
