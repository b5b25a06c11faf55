//! Per-service reachability state machine.
//!
//! Each service owns its own mutex, created once from the registry, so checks
//! for unrelated services never contend. The scheduler guarantees a single
//! writer per service; the lock only makes the read-modify-write atomic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::types::{AlertEvent, ProbeResult, Status};
use crate::config::General;
use crate::registry::{Service, ServiceRegistry};

/// Longest failure reason copied into an SMS body
const MAX_REASON_CHARS: usize = 80;

/// Which transitions are worth a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    /// OFFLINE -> ONLINE produces an event
    pub send_back_online: bool,
    /// UNKNOWN -> OFFLINE produces an event
    pub alert_on_initial_offline: bool,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self { send_back_online: true, alert_on_initial_offline: true }
    }
}

impl From<&General> for AlertPolicy {
    fn from(general: &General) -> Self {
        Self {
            send_back_online: general.send_back_online_alert,
            alert_on_initial_offline: general.alert_on_initial_offline,
        }
    }
}

impl AlertPolicy {
    fn is_alert_worthy(&self, previous: Status, next: Status) -> bool {
        match (previous, next) {
            (Status::Unknown, Status::Offline) => self.alert_on_initial_offline,
            (Status::Online, Status::Offline) => true,
            (Status::Offline, Status::Online) => self.send_back_online,
            // First success has no "was offline" baseline; repeats confirm the state
            _ => false,
        }
    }
}

pub struct StatusTracker {
    registry: Arc<ServiceRegistry>,
    states: HashMap<String, Mutex<Status>>,
    policy: AlertPolicy,
}

impl StatusTracker {
    /// Create a tracker with every registered service in `Status::Unknown`
    pub fn new(registry: Arc<ServiceRegistry>, policy: AlertPolicy) -> Self {
        let states =
            registry.names().map(|name| (name.to_string(), Mutex::new(Status::Unknown))).collect();

        Self { registry, states, policy }
    }

    /// Apply a probe result and return the event to announce, if the change is alert-worthy
    pub fn record(&self, service_name: &str, result: &ProbeResult) -> Option<AlertEvent> {
        let Some(slot) = self.states.get(service_name) else {
            warn!(service = %service_name, "Ignoring result for unregistered service");
            return None;
        };

        let next = result.status();
        let previous = {
            let mut current = slot.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, next)
        };

        if previous == next {
            debug!(service = %service_name, status = %next, "Status confirmed");
            return None;
        }

        match next {
            Status::Offline => warn!(
                service = %service_name,
                from = %previous,
                reason = result.message.as_deref().unwrap_or("unknown"),
                "Service went offline"
            ),
            _ => info!(
                service = %service_name,
                from = %previous,
                to = %next,
                "Service status changed"
            ),
        }

        if !self.policy.is_alert_worthy(previous, next) {
            return None;
        }

        let service = self.registry.get(service_name)?;
        Some(build_event(service, next, result))
    }

    pub fn status(&self, service_name: &str) -> Option<Status> {
        self.states
            .get(service_name)
            .map(|slot| *slot.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Current status of every service, sorted by name
    pub fn snapshot(&self) -> Vec<(String, Status)> {
        let mut all: Vec<(String, Status)> = self
            .states
            .iter()
            .map(|(name, slot)| {
                (name.clone(), *slot.lock().unwrap_or_else(PoisonError::into_inner))
            })
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

fn build_event(service: &Service, status: Status, result: &ProbeResult) -> AlertEvent {
    let detected_at = Utc::now();
    let when = detected_at.format("%Y-%m-%d %H:%M UTC");

    let message = match status {
        Status::Offline => {
            let reason = result.message.as_deref().unwrap_or("no response");
            let reason: String = reason.chars().take(MAX_REASON_CHARS).collect();
            format!(
                "[ServerTracker] {} ({}) is DOWN as of {}: {}",
                service.name,
                service.address(),
                when,
                reason
            )
        }
        _ => format!(
            "[ServerTracker] {} ({}) is back UP as of {}",
            service.name,
            service.address(),
            when
        ),
    };

    AlertEvent {
        service: service.name.clone(),
        status,
        recipients: service.recipients.clone(),
        message,
        detected_at,
    }
}
