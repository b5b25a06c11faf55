//! The fixed set of monitored services.
//!
//! Built once from the `[[servers]]` entries of the configuration. Construction
//! is where every per-service rule is enforced, so the rest of the engine can
//! rely on names being unique and recipients being present.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use crate::config::ServerEntry;
use crate::error::ConfigError;
use crate::monitoring::types::Protocol;

/// A monitored endpoint and the people to text about it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub name: String,
    pub hostname: String,
    pub port: u16,
    pub protocol: Protocol,
    pub recipients: Vec<String>,
    /// Strings whose presence in an HTTP body means the page is broken
    pub unexpected_content: Vec<String>,
    /// Treat an empty HTTP body as a failure
    pub alert_on_blank_page: bool,
}

impl Service {
    /// `hostname:port`, as used for connecting and in messages
    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    fn from_entry(index: usize, entry: &ServerEntry) -> Result<Self, ConfigError> {
        let label = entry.name.clone().unwrap_or_else(|| format!("#{}", index + 1));

        let name = required(&label, "name", entry.name.as_deref())?;
        let hostname = required(&label, "hostname", entry.hostname.as_deref())?;
        let port = entry
            .port
            .ok_or_else(|| ConfigError::MissingField { service: label.clone(), field: "port" })?;
        if port == 0 {
            return Err(ConfigError::InvalidPort { service: label });
        }

        let recipients: Vec<String> = entry
            .send_alert_to
            .as_ref()
            .ok_or_else(|| ConfigError::MissingField {
                service: label.clone(),
                field: "send_alert_to",
            })?
            .iter()
            .map(|number| number.trim().to_string())
            .filter(|number| !number.is_empty())
            .collect();
        if recipients.is_empty() {
            return Err(ConfigError::NoRecipients { service: label });
        }

        let protocol = Protocol::from_config(entry.kind.as_deref());
        let (unexpected_content, alert_on_blank_page) = match protocol {
            Protocol::Http => {
                let markers = entry.unexpected_content.clone().ok_or_else(|| {
                    ConfigError::MissingUnexpectedContent { service: label.clone() }
                })?;
                let markers: Vec<String> = markers.into_iter().filter(|m| !m.is_empty()).collect();
                (markers, entry.trigger_alert_for_blank_page.unwrap_or(false))
            }
            // Content rules only mean something for HTTP
            Protocol::Tcp | Protocol::Game => (Vec::new(), false),
        };

        Ok(Self {
            name,
            hostname,
            port,
            protocol,
            recipients,
            unexpected_content,
            alert_on_blank_page,
        })
    }
}

fn required(label: &str, field: &'static str, value: Option<&str>) -> Result<String, ConfigError> {
    let value =
        value.ok_or_else(|| ConfigError::MissingField { service: label.to_string(), field })?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::BlankField { service: label.to_string(), field });
    }
    Ok(trimmed.to_string())
}

/// Immutable collection of services keyed by name
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: BTreeMap<String, Arc<Service>>,
}

impl ServiceRegistry {
    /// Validate every entry and build the registry. The first invalid entry aborts construction.
    pub fn from_entries(entries: &[ServerEntry]) -> Result<Self, ConfigError> {
        let mut services = BTreeMap::new();

        for (index, entry) in entries.iter().enumerate() {
            let service = Service::from_entry(index, entry)?;
            match services.entry(service.name.clone()) {
                Entry::Occupied(_) => {
                    return Err(ConfigError::DuplicateService { name: service.name });
                }
                Entry::Vacant(slot) => {
                    slot.insert(Arc::new(service));
                }
            }
        }

        Ok(Self { services })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Service>> {
        self.services.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Service>> {
        self.services.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
