//! Server configuration.

use std::path::PathBuf;

/// Orchestrator service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP API bind address.
    pub bind_addr: String,

    /// Base URL of the generation provider API.
    pub provider_base_url: String,

    /// API key for the provider.
    pub provider_api_key: String,

    /// Root directory for stored images (models/, garments/, results/).
    pub upload_root: PathBuf,

    /// Reconciliation tick interval in seconds.
    pub poll_interval_secs: u64,

    /// Successful polls a task may accumulate without reaching a
    /// terminal state before it is failed as stale.
    pub stale_poll_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            provider_base_url: "https://api.fitroom.app".to_string(),
            provider_api_key: String::new(),
            upload_root: PathBuf::from("./uploads"),
            poll_interval_secs: 5,
            // One hour at the 5s tick.
            stale_poll_limit: 720,
        }
    }
}

impl Config {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_string("TRYON_BIND_ADDR", defaults.bind_addr),
            provider_base_url: env_string("TRYON_PROVIDER_BASE_URL", defaults.provider_base_url),
            provider_api_key: env_string("TRYON_PROVIDER_API_KEY", defaults.provider_api_key),
            upload_root: PathBuf::from(env_string(
                "TRYON_UPLOAD_PATH",
                defaults.upload_root.to_string_lossy().into_owned(),
            )),
            poll_interval_secs: env_parse("TRYON_POLL_INTERVAL_SECS", defaults.poll_interval_secs),
            stale_poll_limit: env_parse("TRYON_STALE_POLL_LIMIT", defaults.stale_poll_limit),
        }
    }
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
