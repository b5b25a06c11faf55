//! Outbound SMS transports.

use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use tracing::debug;

use crate::config::Twilio;
use crate::error::SendError;

const TWILIO_API_BASE: &str = "https://api.twilio.com";

/// Twilio error codes that mean the destination number itself is unusable
const INVALID_NUMBER_CODES: [u32; 3] = [21211, 21612, 21614];

/// Something able to deliver one text message to one phone number
#[async_trait::async_trait]
pub trait SmsTransport: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<(), SendError>;
}

/// Error body returned by the Twilio REST API
#[derive(Debug, Deserialize)]
struct TwilioError {
    code: Option<u32>,
    message: Option<String>,
}

/// Twilio Programmable Messaging transport
pub struct TwilioTransport {
    client: reqwest::Client,
    messages_url: String,
    account_sid: String,
    auth_token: String,
    from: String,
}

impl TwilioTransport {
    /// Credentials are passed through to Twilio untouched
    pub fn new(credentials: &Twilio, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base = credentials.api_base.as_deref().unwrap_or(TWILIO_API_BASE).trim_end_matches('/');

        Ok(Self {
            client,
            messages_url: format!(
                "{}/2010-04-01/Accounts/{}/Messages.json",
                base, credentials.account_sid
            ),
            account_sid: credentials.account_sid.clone(),
            auth_token: credentials.auth_token.clone(),
            from: credentials.from_phone_number.clone(),
        })
    }

    pub fn messages_url(&self) -> &str {
        &self.messages_url
    }
}

#[async_trait::async_trait]
impl SmsTransport for TwilioTransport {
    async fn send(&self, to: &str, body: &str) -> Result<(), SendError> {
        let response = self
            .client
            .post(&self.messages_url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from.as_str()), ("Body", body)])
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(to = %to, status = status.as_u16(), "Twilio accepted message");
            return Ok(());
        }

        let raw = response.text().await.unwrap_or_default();
        Err(classify_rejection(to, status.as_u16(), &raw))
    }
}

fn classify_rejection(to: &str, status: u16, raw: &str) -> SendError {
    let parsed: Option<TwilioError> = serde_json::from_str(raw).ok();
    let code = parsed.as_ref().and_then(|e| e.code);

    if code.is_some_and(|code| INVALID_NUMBER_CODES.contains(&code)) {
        return SendError::InvalidNumber(to.to_string());
    }

    let message = parsed.and_then(|e| e.message).unwrap_or_else(|| {
        if raw.is_empty() { "no response body".into() } else { raw.to_string() }
    });
    let message = match code {
        Some(code) => format!("{message} (code {code})"),
        None => message,
    };

    SendError::Rejected { status, message }
}
