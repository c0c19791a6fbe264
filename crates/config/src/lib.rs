use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "beacon.toml",
    "config/beacon.toml",
    "crates/config/beacon.toml",
    "../beacon.toml",
    "../config/beacon.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub hub: HubConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7070,
        }
    }
}

/// Tuning for the presence hub.
///
/// ```
/// use beacon_config::HubConfig;
///
/// let hub = HubConfig::default();
/// assert_eq!(hub.heartbeat_interval_ms, 30_000);
/// assert_eq!(hub.max_clients, 1000);
/// assert!(!hub.reap_empty_rooms);
/// assert!(!hub.enforce_room_membership);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Advisory connection cap; exceeding it is logged, never refused.
    #[serde(default = "HubConfig::default_max_clients")]
    pub max_clients: usize,
    #[serde(default = "HubConfig::default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,
    /// Capacity of the recent-message ring reported in stats.
    #[serde(default = "HubConfig::default_message_buffer_size")]
    pub message_buffer_size: usize,
    #[serde(default)]
    pub reap_empty_rooms: bool,
    #[serde(default)]
    pub enforce_room_membership: bool,
}

impl HubConfig {
    const fn default_max_clients() -> usize {
        1000
    }

    const fn default_heartbeat_interval() -> u64 {
        30_000
    }

    const fn default_message_buffer_size() -> usize {
        100
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_clients: Self::default_max_clients(),
            heartbeat_interval_ms: Self::default_heartbeat_interval(),
            message_buffer_size: Self::default_message_buffer_size(),
            reap_empty_rooms: false,
            enforce_room_membership: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "AuthConfig::default_session_ttl")]
    pub session_ttl_seconds: u64,
    /// Long-lived tokens mapped to the user id they authenticate as.
    #[serde(default)]
    pub static_tokens: HashMap<String, String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_seconds: Self::default_session_ttl(),
            static_tokens: HashMap::new(),
        }
    }
}

impl AuthConfig {
    fn default_session_ttl() -> u64 {
        86_400
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use beacon_config::load;
///
/// std::env::remove_var("BEACON_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let session_ttl = i64::try_from(defaults.auth.session_ttl_seconds).unwrap_or(i64::MAX);
    let heartbeat = i64::try_from(defaults.hub.heartbeat_interval_ms).unwrap_or(i64::MAX);
    let max_clients = i64::try_from(defaults.hub.max_clients).unwrap_or(i64::MAX);
    let buffer_size = i64::try_from(defaults.hub.message_buffer_size).unwrap_or(i64::MAX);

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("hub.max_clients", max_clients)?
        .set_default("hub.heartbeat_interval_ms", heartbeat)?
        .set_default("hub.message_buffer_size", buffer_size)?
        .set_default("hub.reap_empty_rooms", defaults.hub.reap_empty_rooms)?
        .set_default(
            "hub.enforce_room_membership",
            defaults.hub.enforce_room_membership,
        )?
        .set_default("auth.session_ttl_seconds", session_ttl)?;

    let environment_overrides = config::Environment::with_prefix("BEACON").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("BEACON_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(%path, "loading configuration via BEACON_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.hub.heartbeat_interval_ms == 0 {
        anyhow::bail!("invalid configuration: hub.heartbeat_interval_ms must be positive");
    }

    if config.auth.session_ttl_seconds > i64::MAX as u64 {
        config.auth.session_ttl_seconds = i64::MAX as u64;
    }

    debug!(?config, "loaded beacon configuration");
    Ok(config)
}
