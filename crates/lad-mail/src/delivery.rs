//! Delivery services
//!
//! - `postmark`: Postmark HTTP API (`POST /email`)
//! - `log`: keeps messages in memory and logs them; nothing leaves the process

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::message::{Message, Receipt};
use crate::{MailError, MailResult};

/// Default Postmark endpoint
pub const POSTMARK_ENDPOINT: &str = "https://api.postmarkapp.com/email";

/// A mail-delivery service
pub trait Delivery: fmt::Debug + Send + Sync {
    /// Service name (`"postmark"`, `"log"`)
    fn service(&self) -> &str;

    /// Transmit a compiled message
    fn deliver(&self, message: &Message) -> MailResult<Receipt>;
}

/// Service credentials
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// API token (Postmark server token)
    pub token: Option<String>,

    /// Override the service endpoint
    pub endpoint: Option<String>,

    /// Request timeout in seconds
    pub timeout_seconds: Option<u64>,
}

/// Construct the delivery for a named service
pub fn delivery_for(service: &str, credentials: &Credentials) -> MailResult<Box<dyn Delivery>> {
    match service.to_ascii_lowercase().as_str() {
        "postmark" => {
            let token = credentials
                .token
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| MailError::MissingCredentials(service.to_string()))?;
            let mut delivery = PostmarkDelivery::new(token)?;
            if let Some(endpoint) = &credentials.endpoint {
                delivery = delivery.with_endpoint(endpoint.clone());
            }
            if let Some(seconds) = credentials.timeout_seconds {
                delivery = delivery.with_timeout(Duration::from_secs(seconds))?;
            }
            Ok(Box::new(delivery))
        }
        "log" => Ok(Box::new(LogDelivery::new())),
        other => Err(MailError::UnknownService(other.to_string())),
    }
}

/// In-memory delivery for development and tests
#[derive(Debug, Default)]
pub struct LogDelivery {
    sent: Mutex<Vec<Message>>,
}

impl LogDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Delivery for LogDelivery {
    fn service(&self) -> &str {
        "log"
    }

    fn deliver(&self, message: &Message) -> MailResult<Receipt> {
        let message_id = format!("<{}@lad.local>", uuid::Uuid::new_v4());
        info!(
            message_id = %message_id,
            to = %message.to.join(", "),
            subject = %message.subject,
            "message captured by log delivery"
        );
        self.sent
            .lock()
            .map_err(|_| MailError::Delivery("log delivery lock poisoned".to_string()))?
            .push(message.clone());

        Ok(Receipt {
            message_id,
            service: self.service().to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkEmail<'a> {
    from: &'a str,
    to: String,
    subject: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html_body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text_body: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkResponse {
    #[serde(rename = "MessageID", default)]
    message_id: Option<String>,
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    message: String,
}

/// Postmark HTTP API delivery
#[derive(Debug)]
pub struct PostmarkDelivery {
    token: String,
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl PostmarkDelivery {
    pub fn new(token: impl Into<String>) -> MailResult<Self> {
        Ok(Self {
            token: token.into(),
            endpoint: POSTMARK_ENDPOINT.to_string(),
            client: Self::client(Duration::from_secs(30))?,
        })
    }

    fn client(timeout: Duration) -> MailResult<reqwest::blocking::Client> {
        reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailError::Delivery(format!("cannot build HTTP client: {e}")))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> MailResult<Self> {
        self.client = Self::client(timeout)?;
        Ok(self)
    }
}

impl Delivery for PostmarkDelivery {
    fn service(&self) -> &str {
        "postmark"
    }

    fn deliver(&self, message: &Message) -> MailResult<Receipt> {
        let from = message
            .from
            .as_deref()
            .ok_or_else(|| MailError::InvalidMessage("missing sender".to_string()))?;
        let payload = PostmarkEmail {
            from,
            to: message.to.join(", "),
            subject: &message.subject,
            html_body: message.html.as_deref(),
            text_body: message.text.as_deref(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .header("X-Postmark-Server-Token", &self.token)
            .json(&payload)
            .send()
            .map_err(|e| MailError::Delivery(format!("postmark request failed: {e}")))?;

        let status = response.status();
        let body: PostmarkResponse = response
            .json()
            .map_err(|e| MailError::Delivery(format!("postmark returned {status}: {e}")))?;

        if !status.is_success() || body.error_code != 0 {
            return Err(MailError::Delivery(format!(
                "postmark error {} ({status}): {}",
                body.error_code, body.message
            )));
        }

        Ok(Receipt {
            message_id: body
                .message_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            service: self.service().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_service() {
        let err = delivery_for("carrier-pigeon", &Credentials::default()).unwrap_err();
        assert!(matches!(err, MailError::UnknownService(_)));
    }

    #[test]
    fn test_postmark_requires_token() {
        let err = delivery_for("postmark", &Credentials::default()).unwrap_err();
        assert!(matches!(err, MailError::MissingCredentials(_)));
    }

    #[test]
    fn test_postmark_with_token() {
        let credentials = Credentials {
            token: Some("server-token".to_string()),
            ..Credentials::default()
        };
        let delivery = delivery_for("Postmark", &credentials).unwrap();
        assert_eq!(delivery.service(), "postmark");
    }

    #[test]
    fn test_log_delivery_records() {
        let delivery = LogDelivery::new();
        let message = Message::new("a@example.com", "Hi")
            .with_from("noreply@example.com")
            .with_text("hello");

        let receipt = delivery.deliver(&message).unwrap();

        assert_eq!(receipt.service, "log");
        assert!(receipt.message_id.ends_with("@lad.local>"));
        assert_eq!(delivery.sent(), vec![message]);
    }
}
