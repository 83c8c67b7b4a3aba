//! Mail transport: message defaults, pre-send transforms, delivery

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::delivery::Delivery;
use crate::message::{Message, Receipt};
use crate::MailResult;

/// A pre-send body rewrite.
///
/// Runs on every body part (HTML and text) of every outgoing message,
/// after template rendering and before delivery.
pub trait Transform: Send + Sync {
    /// Stable name, for logging
    fn name(&self) -> &'static str;

    /// Rewrite one body part
    fn apply(&self, body: &str) -> MailResult<String>;
}

/// Values applied to every message before the transforms run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageDefaults {
    /// Sender used when a message has none
    pub from: Option<String>,

    /// Prepended to every subject
    pub subject_prefix: String,
}

/// Outbound transport.
///
/// Built once at startup and shared read-only (`Arc<MailTransport>`).
pub struct MailTransport {
    delivery: Arc<dyn Delivery>,
    transforms: Vec<Box<dyn Transform>>,
    defaults: MessageDefaults,
}

impl fmt::Debug for MailTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailTransport")
            .field("service", &self.delivery.service())
            .field("transforms", &self.transform_names())
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl MailTransport {
    /// Start building a transport over `delivery`
    pub fn builder(delivery: Arc<dyn Delivery>) -> MailTransportBuilder {
        MailTransportBuilder {
            delivery,
            transforms: Vec::new(),
            defaults: MessageDefaults::default(),
        }
    }

    /// Delivery service name
    pub fn service(&self) -> &str {
        self.delivery.service()
    }

    /// Transform names in execution order
    pub fn transform_names(&self) -> Vec<&'static str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    pub fn defaults(&self) -> &MessageDefaults {
        &self.defaults
    }

    /// Apply defaults and run every transform over the message bodies.
    ///
    /// The first failing transform aborts compilation.
    pub fn compile(&self, mut message: Message) -> MailResult<Message> {
        if message.from.is_none() {
            message.from = self.defaults.from.clone();
        }
        if !self.defaults.subject_prefix.is_empty()
            && !message.subject.starts_with(&self.defaults.subject_prefix)
        {
            message.subject = format!("{}{}", self.defaults.subject_prefix, message.subject);
        }
        message.validate()?;

        for transform in &self.transforms {
            debug!(transform = transform.name(), "running pre-send transform");
            if let Some(html) = &message.html {
                message.html = Some(transform.apply(html)?);
            }
            if let Some(text) = &message.text {
                message.text = Some(transform.apply(text)?);
            }
        }

        Ok(message)
    }

    /// Compile and deliver a message.
    ///
    /// Nothing is handed to the delivery service if compilation fails.
    pub fn send(&self, message: Message) -> MailResult<Receipt> {
        let compiled = match self.compile(message) {
            Ok(compiled) => compiled,
            Err(e) => {
                warn!(service = self.service(), error = %e, "message not sent");
                return Err(e);
            }
        };

        let receipt = self.delivery.deliver(&compiled)?;
        info!(
            service = %receipt.service,
            message_id = %receipt.message_id,
            recipients = compiled.to.len(),
            "message sent"
        );
        Ok(receipt)
    }
}

/// Builder for [`MailTransport`]
pub struct MailTransportBuilder {
    delivery: Arc<dyn Delivery>,
    transforms: Vec<Box<dyn Transform>>,
    defaults: MessageDefaults,
}

impl MailTransportBuilder {
    /// Append a transform; transforms run in insertion order
    pub fn transform(mut self, transform: impl Transform + 'static) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    pub fn defaults(mut self, defaults: MessageDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn build(self) -> MailTransport {
        MailTransport {
            delivery: self.delivery,
            transforms: self.transforms,
            defaults: self.defaults,
        }
    }
}
