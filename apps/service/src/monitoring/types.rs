use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Protocol spoken by a monitored service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Tcp,
    Http,
    Game,
}

impl Protocol {
    /// Parse the `type` field of a server entry.
    ///
    /// Matching is case-insensitive and anything unrecognised is a plain TCP check.
    pub fn from_config(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("http") => Protocol::Http,
            Some("minecraft") | Some("game") => Protocol::Game,
            _ => Protocol::Tcp,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Http => write!(f, "http"),
            Protocol::Game => write!(f, "minecraft"),
        }
    }
}

/// Reachability of a service as seen by the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Unknown,
    Online,
    Offline,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Unknown => write!(f, "unknown"),
            Status::Online => write!(f, "online"),
            Status::Offline => write!(f, "offline"),
        }
    }
}

/// Outcome of a single probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub success: bool,

    /// Why the check failed, or what it observed when it succeeded
    pub message: Option<String>,

    /// Time from launch to completion
    pub elapsed: Duration,
}

impl ProbeResult {
    pub fn success() -> Self {
        Self { success: true, message: None, elapsed: Duration::ZERO }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, message: Some(message.into()), elapsed: Duration::ZERO }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Status this result moves the service to
    pub fn status(&self) -> Status {
        if self.success { Status::Online } else { Status::Offline }
    }
}

/// A detected transition that should be announced to the service's recipients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEvent {
    pub service: String,
    pub status: Status,
    pub recipients: Vec<String>,
    pub message: String,
    pub detected_at: DateTime<Utc>,
}
