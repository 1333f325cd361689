use ntc_core::{Bus, Route};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Longest a reserve, cancel or trip write waits for its bus lock.
    pub lock_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { lock_timeout_ms: 2000 }
    }
}

impl EngineConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub requests: i64,
    pub window_seconds: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 100,
            window_seconds: 60,
        }
    }
}

/// Reference data loaded into the in-memory directory.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SeedConfig {
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub buses: Vec<Bus>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `NTC__DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("NTC").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Parses a single TOML document, without environment overrides.
    pub fn from_toml(source: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 8080

            [auth]
            jwt_secret = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert!(config.database.url.is_none());
        assert_eq!(config.database.max_connections, 5);
        assert!(config.redis.url.is_none());
        assert_eq!(config.engine.lock_timeout(), Duration::from_secs(2));
        assert_eq!(config.rate_limit.requests, 100);
        assert!(config.seed.buses.is_empty());
    }

    #[test]
    fn test_seed_data_parses() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 3000

            [auth]
            jwt_secret = "secret"

            [engine]
            lock_timeout_ms = 250

            [[seed.routes]]
            id = "6f1c2b8e-4d1a-4a8e-9a57-0d3f6b1c2a01"
            start_point = "Colombo"
            end_point = "Kandy"
            distance_km = 115.0
            fare_per_seat = 600

            [[seed.buses]]
            id = "a3e4c1d2-7b8f-4e6a-9c0d-1f2e3d4c5b01"
            bus_number = "NB-1234"
            capacity = 50
            route_id = "6f1c2b8e-4d1a-4a8e-9a57-0d3f6b1c2a01"
            owner_id = "operator-1"
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.lock_timeout(), Duration::from_millis(250));
        assert_eq!(config.seed.routes[0].fare_per_seat, 600);
        assert_eq!(config.seed.buses[0].capacity, 50);
        assert_eq!(config.seed.buses[0].route_id, config.seed.routes[0].id);
    }
}
