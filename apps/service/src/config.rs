use std::time::Duration;
use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

/// Commented configuration written on first launch
pub const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

const MAX_INTERVAL_SECONDS: u64 = 86_400;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub twilio: Twilio,
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct General {
    /// Seconds between two check cycles
    pub query_interval: u64,
    /// Milliseconds a single check may take before it counts as a failure
    pub query_timeout: u64,
    pub send_back_online_alert: bool,
    /// Alert when the very first check of a service fails
    pub alert_on_initial_offline: bool,
}

impl Default for General {
    fn default() -> Self {
        Self {
            query_interval: 30,
            query_timeout: 6000,
            send_back_online_alert: true,
            alert_on_initial_offline: true,
        }
    }
}

impl General {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.query_interval)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.query_interval == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "query_interval",
                reason: "must be at least 1 second".into(),
            });
        }

        if self.query_interval > MAX_INTERVAL_SECONDS {
            return Err(ConfigError::InvalidSetting {
                field: "query_interval",
                reason: format!("must not exceed {MAX_INTERVAL_SECONDS} seconds"),
            });
        }

        if self.query_timeout == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "query_timeout",
                reason: "must be at least 1 millisecond".into(),
            });
        }

        if self.timeout() > self.interval() {
            warn!(
                "query_timeout ({}ms) is longer than query_interval ({}s); \
                 slow services will skip cycles",
                self.query_timeout, self.query_interval
            );
        }

        Ok(())
    }
}

/// Credentials for the Twilio messaging API, passed through to every send
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Twilio {
    pub account_sid: String,
    pub auth_token: String,
    pub from_phone_number: String,
    /// Overrides `https://api.twilio.com`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

/// One `[[servers]]` entry as written by the operator. Validated by `ServiceRegistry`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerEntry {
    pub name: Option<String>,
    pub hostname: Option<String>,
    pub port: Option<u16>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub unexpected_content: Option<Vec<String>>,
    pub trigger_alert_for_blank_page: Option<bool>,
    pub send_alert_to: Option<Vec<String>>,
}

/// What `Config::from_config` found on disk
#[derive(Debug)]
pub enum ConfigSource {
    Existing(Config),
    /// No file existed; a default one was written here and must be edited first
    Created(path::PathBuf),
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/servertracker/config.toml or
/// $HOME/.config/...)
pub fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::PathUnavailable);
    };

    Ok(path.join("servertracker/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        writeln!(f, "Current Configuration:")?;
        write_title_1(f, "General")?;
        write_1(f, "Query Interval (s)", &self.general.query_interval)?;
        write_1(f, "Query Timeout (ms)", &self.general.query_timeout)?;
        write_1(f, "Back Online Alerts", &self.general.send_back_online_alert)?;
        write_1(f, "Alert On Initial Offline", &self.general.alert_on_initial_offline)?;
        write_title_1(f, "Twilio")?;
        write_1(f, "Account SID", &self.twilio.account_sid)?;
        write_1(f, "From", &self.twilio.from_phone_number)?;
        write_title_1(f, "Servers")?;
        for server in &self.servers {
            let name = server.name.as_deref().unwrap_or("<unnamed>");
            let host = server.hostname.as_deref().unwrap_or("?");
            let port = server.port.map(|p| p.to_string()).unwrap_or_else(|| "?".into());
            write_1(f, name, &format!("{host}:{port}"))?;
            write_2(f, "Type", &server.kind.as_deref().unwrap_or("tcp"))?;
            write_2(f, "Recipients", &server.send_alert_to.as_ref().map_or(0, Vec::len))?;
        }

        Ok(())
    }
}

impl Config {
    /// Load the configuration, creating a default one if none exists
    ///
    /// Looks in ~/.config/servertracker/config.toml unless a path is given.
    /// A freshly written default is reported as `ConfigSource::Created` so the
    /// caller can stop and let the operator fill it in.
    ///
    /// ```no_run
    /// use servertracker::config::{Config, ConfigSource};
    ///
    /// if let ConfigSource::Existing(cfg) = Config::from_config(None::<&std::path::Path>)? {
    ///     println!("{}", cfg);
    /// }
    /// # Ok::<(), servertracker::error::ConfigError>(())
    /// ```
    pub fn from_config(
        optional_path: Option<impl AsRef<path::Path>>,
    ) -> Result<ConfigSource, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::Read { path: config_path.clone(), source })?;
            Self::from_toml_str(&raw_string, &config_path).map(ConfigSource::Existing)
        } else {
            write_default_config(&config_path)?;
            Ok(ConfigSource::Created(config_path))
        }
    }

    /// Parse and validate the global settings. `origin` is only used in error messages.
    pub fn from_toml_str(raw: &str, origin: &path::Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source: Box::new(source),
        })?;

        config.general.validate()?;

        if config.servers.is_empty() {
            warn!("{} declares no servers; nothing will be monitored", origin.display());
        }

        Ok(config)
    }
}

/// Write the commented default configuration, creating parent directories
pub fn write_default_config(path: &path::Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|source| ConfigError::Write { path: parent.to_path_buf(), source })?;
    }

    fs::write(path, DEFAULT_CONFIG)
        .map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })
}
