//! Portal configuration.
//!
//! Read from `~/.config/makerspace/config.toml` (or the file named by
//! `MAKERSPACE_CONFIG`), then overridden by `MAKERSPACE__SECTION__KEY`
//! environment variables. Durations are written the human way: `"15s"`, `"1m"`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{PortalError, PortalResult};
use crate::heartbeat::HeartbeatConfig;
use crate::recurrence::RecurrenceHorizon;
use crate::session::Actor;
use crate::watcher::WatcherConfig;

const CONFIG_PATH_ENV: &str = "MAKERSPACE_CONFIG";
const ENV_PREFIX: &str = "MAKERSPACE";

fn default_store_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(15)
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_write_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_port() -> u16 {
    4096
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Rest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Base URL of the REST API, e.g. `https://<project>.supabase.co/rest/v1`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_store_timeout", with = "human_duration")]
    pub timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            backend: StoreBackend::default(),
            url: None,
            api_key: None,
            timeout: default_store_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    #[serde(default = "default_heartbeat_interval", with = "human_duration")]
    pub heartbeat_interval: Duration,
    /// No default on purpose: views disagree on how fresh "online" is.
    #[serde(default, with = "human_duration_opt")]
    pub liveness_threshold: Option<Duration>,
    #[serde(default = "default_refresh_interval", with = "human_duration")]
    pub refresh_interval: Duration,
    #[serde(default = "default_write_timeout", with = "human_duration")]
    pub write_timeout: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        PresenceConfig {
            heartbeat_interval: default_heartbeat_interval(),
            liveness_threshold: None,
            refresh_interval: default_refresh_interval(),
            write_timeout: default_write_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub session: Option<Actor>,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub recurrence: RecurrenceHorizon,
    #[serde(default)]
    pub server: ServerConfig,
}

impl PortalConfig {
    pub fn config_path() -> PortalResult<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(shellexpand::tilde(&path).into_owned()));
        }

        let config_dir = dirs::config_dir()
            .ok_or_else(|| PortalError::Config("Could not determine config directory".into()))?
            .join("makerspace");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the user's config, writing a commented default file on first use.
    pub fn load() -> PortalResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> PortalResult<Self> {
        let config: PortalConfig = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| PortalError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| PortalError::Config(e.to_string()))?;

        config.recurrence.validate()?;
        Ok(config)
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> PortalResult<()> {
        let contents = "\
# MakerSpace portal configuration

[store]
# backend = \"rest\"             # \"memory\" keeps everything in process
# url = \"https://<project>.supabase.co/rest/v1\"
# api_key = \"<anon key>\"
# timeout = \"10s\"

# Who this machine acts as:
# [session]
# user_id = \"<user uuid>\"
# username = \"ada\"
# role = \"member\"              # or \"admin\"

[presence]
# heartbeat_interval = \"15s\"
# liveness_threshold = \"30s\"   # required for `online`, no default
# refresh_interval = \"5s\"
# write_timeout = \"10s\"

[recurrence]
# daily_days = 30
# weekly_weeks = 12
# monthly_months = 6

[server]
# bind = \"127.0.0.1\"
# port = 4096
";

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PortalError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| PortalError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }

    /// The configured session identity.
    pub fn session(&self) -> PortalResult<&Actor> {
        self.session.as_ref().ok_or_else(|| {
            PortalError::Config("No [session] configured (user_id, username, role)".into())
        })
    }

    /// Resolve the liveness threshold, preferring an explicit override.
    pub fn liveness_threshold(&self, explicit: Option<Duration>) -> PortalResult<Duration> {
        explicit
            .or(self.presence.liveness_threshold)
            .ok_or_else(|| {
                PortalError::Config(
                    "No liveness threshold given; set presence.liveness_threshold or pass one explicitly"
                        .into(),
                )
            })
    }

    pub fn heartbeat(&self) -> HeartbeatConfig {
        HeartbeatConfig {
            interval: self.presence.heartbeat_interval,
            write_timeout: self.presence.write_timeout,
        }
    }

    pub fn watcher(&self, threshold: Duration) -> WatcherConfig {
        WatcherConfig {
            threshold,
            refresh_interval: self.presence.refresh_interval,
        }
    }
}

/// Parse a human duration such as `"30s"` or `"1m 30s"`.
pub fn parse_duration(s: &str) -> PortalResult<Duration> {
    humantime::parse_duration(s.trim())
        .map_err(|e| PortalError::Parse(format!("Invalid duration '{}': {}", s, e)))
}

mod human_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
    }
}

mod human_duration_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_str(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom))
            .transpose()
    }
}
