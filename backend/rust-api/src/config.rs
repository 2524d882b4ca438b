use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bind_address: String,
    /// Period of one countdown tick. One second in production; tests shorten it.
    pub tick_interval_ms: u64,
    pub match_idle_ttl_seconds: u64,
    pub reaper_interval_seconds: u64,
    /// `username:password` expected on `/metrics`.
    pub metrics_auth: String,
    /// Browser origin allowed by CORS. `None` allows any origin.
    pub cors_origin: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
            tick_interval_ms: 1000,
            match_idle_ttl_seconds: 1800,
            reaper_interval_seconds: 60,
            metrics_auth: "admin:changeme".to_string(),
            cors_origin: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load environment variables from root .env file (two levels up)
        // Try root .env first, then fallback to local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let defaults = Config::default();

        let bind_address = settings
            .get_string("server.bind_address")
            .or_else(|_| env::var("BIND_ADDRESS"))
            .unwrap_or(defaults.bind_address);

        let tick_interval_ms = positive(&settings, "game.tick_interval_ms", "TICK_INTERVAL_MS")
            .unwrap_or(defaults.tick_interval_ms);

        let match_idle_ttl_seconds = positive(
            &settings,
            "game.match_idle_ttl_seconds",
            "MATCH_IDLE_TTL_SECONDS",
        )
        .unwrap_or(defaults.match_idle_ttl_seconds);

        let reaper_interval_seconds = positive(
            &settings,
            "game.reaper_interval_seconds",
            "REAPER_INTERVAL_SECONDS",
        )
        .unwrap_or(defaults.reaper_interval_seconds);

        let metrics_auth = settings
            .get_string("metrics.auth")
            .or_else(|_| env::var("METRICS_AUTH"))
            .unwrap_or_else(|_| {
                if app_env == "prod" {
                    tracing::warn!("METRICS_AUTH not set in production, using default credentials");
                }
                defaults.metrics_auth
            });

        let cors_origin = settings
            .get_string("server.cors_origin")
            .or_else(|_| env::var("CORS_ORIGIN"))
            .ok()
            .filter(|origin| !origin.is_empty());

        Ok(Config {
            bind_address,
            tick_interval_ms,
            match_idle_ttl_seconds,
            reaper_interval_seconds,
            metrics_auth,
            cors_origin,
        })
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn match_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.match_idle_ttl_seconds)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_seconds)
    }
}

/// Reads a positive integer from the settings tree, falling back to a plain
/// environment variable. Zero and unparsable values count as unset.
fn positive(settings: &config::Config, key: &str, env_key: &str) -> Option<u64> {
    settings
        .get_int(key)
        .ok()
        .and_then(|v| u64::try_from(v).ok())
        .or_else(|| env::var(env_key).ok().and_then(|v| v.parse::<u64>().ok()))
        .filter(|v| *v > 0)
}
