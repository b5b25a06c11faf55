use std::io::Error as IoError;
use std::path::PathBuf;

use thiserror::Error;

/// Problems found while loading or validating the configuration. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine a configuration directory (XDG_CONFIG_HOME and HOME unset)")]
    PathUnavailable,
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: IoError },
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: IoError },
    #[error("failed to parse {}: {source}", path.display())]
    Parse { path: PathBuf, source: Box<toml::de::Error> },
    #[error("invalid [general] setting `{field}`: {reason}")]
    InvalidSetting { field: &'static str, reason: String },
    #[error("server {service} is missing required field `{field}`")]
    MissingField { service: String, field: &'static str },
    #[error("server {service} has an empty `{field}`")]
    BlankField { service: String, field: &'static str },
    #[error("server {service} has invalid port 0")]
    InvalidPort { service: String },
    #[error("server {service} has no recipients in `send_alert_to`")]
    NoRecipients { service: String },
    #[error("http server {service} must declare `unexpected_content` (an empty list is allowed)")]
    MissingUnexpectedContent { service: String },
    #[error("server name `{name}` is used more than once")]
    DuplicateService { name: String },
}

/// Why a single SMS could not be delivered
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid phone number `{0}`")]
    InvalidNumber(String),
    #[error("provider rejected message ({status}): {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler is already running")]
    AlreadyRunning,
}
