//! Outgoing message and delivery receipt

use serde::{Deserialize, Serialize};

use crate::{MailError, MailResult};

/// An outgoing message, already rendered by the template layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Sender; filled from transport defaults when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// Recipients
    pub to: Vec<String>,

    pub subject: String,

    /// HTML body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    /// Plain-text body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Message {
    /// Create a message with a single recipient
    pub fn new(to: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            from: None,
            to: vec![to.into()],
            subject: subject.into(),
            html: None,
            text: None,
        }
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Check the message is deliverable
    pub fn validate(&self) -> MailResult<()> {
        if self.from.as_deref().map_or(true, str::is_empty) {
            return Err(MailError::InvalidMessage("missing sender".to_string()));
        }
        if self.to.is_empty() || self.to.iter().any(|t| t.trim().is_empty()) {
            return Err(MailError::InvalidMessage("missing recipient".to_string()));
        }
        if self.html.is_none() && self.text.is_none() {
            return Err(MailError::InvalidMessage("message has no body".to_string()));
        }
        Ok(())
    }
}

/// Result of a successful delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// Message id assigned by the service (or generated locally)
    pub message_id: String,

    /// Service that accepted the message
    pub service: String,
}
