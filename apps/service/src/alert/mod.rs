/// Alert module - turns status transitions into text messages
///
/// Every recipient of an event gets its own message. Sends run concurrently
/// and independently; one failing number never stops the others, and nothing
/// is retried.
pub mod sms;

pub use sms::{SmsTransport, TwilioTransport};

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::error::SendError;
use crate::monitoring::types::AlertEvent;

const MIN_DIGITS: usize = 7;
const MAX_DIGITS: usize = 15;

/// Result of sending one event to one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub recipient: String,
    pub result: Result<(), SendError>,
}

/// Aggregate view over all deliveries of one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchSummary {
    Delivered,
    Partial,
    Failed,
}

/// Per-recipient report for one dispatched event, in recipient order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub service: String,
    pub deliveries: Vec<Delivery>,
}

impl DispatchOutcome {
    pub fn succeeded(&self) -> usize {
        self.deliveries.iter().filter(|d| d.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.deliveries.len() - self.succeeded()
    }

    pub fn summary(&self) -> DispatchSummary {
        match (self.succeeded(), self.failed()) {
            (_, 0) => DispatchSummary::Delivered,
            (0, _) => DispatchSummary::Failed,
            _ => DispatchSummary::Partial,
        }
    }
}

/// Normalise a phone number for sending, or explain why it cannot be used
///
/// Spaces, dashes, dots and parentheses are dropped; what remains must be an
/// optional leading `+` followed by 7 to 15 digits.
pub fn normalize_number(raw: &str) -> Result<String, SendError> {
    let cleaned: String =
        raw.chars().filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')')).collect();
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);

    let valid = digits.chars().all(|c| c.is_ascii_digit())
        && (MIN_DIGITS..=MAX_DIGITS).contains(&digits.len());
    if valid { Ok(cleaned) } else { Err(SendError::InvalidNumber(raw.to_string())) }
}

pub struct AlertDispatcher {
    transport: Arc<dyn SmsTransport>,
}

impl AlertDispatcher {
    pub fn new(transport: Arc<dyn SmsTransport>) -> Self {
        Self { transport }
    }

    /// Send the event's message to each of its recipients once
    pub async fn dispatch(&self, event: &AlertEvent) -> DispatchOutcome {
        let sends = event.recipients.iter().map(|recipient| async move {
            let result = match normalize_number(recipient) {
                Ok(number) => self.transport.send(&number, &event.message).await,
                Err(e) => Err(e),
            };
            Delivery { recipient: recipient.clone(), result }
        });

        let deliveries = join_all(sends).await;
        for delivery in &deliveries {
            if let Err(e) = &delivery.result {
                warn!(
                    service = %event.service,
                    recipient = %delivery.recipient,
                    error = %e,
                    "Failed to send alert"
                );
            }
        }

        let outcome = DispatchOutcome { service: event.service.clone(), deliveries };
        info!(
            service = %event.service,
            status = %event.status,
            sent = outcome.succeeded(),
            failed = outcome.failed(),
            "Alert dispatched"
        );
        outcome
    }
}
