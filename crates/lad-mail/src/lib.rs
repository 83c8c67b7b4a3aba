//! Lad outbound mail
//!
//! A [`MailTransport`] owns a delivery service and an ordered list of
//! pre-send [`Transform`]s. Every `send` runs the transforms once, in order,
//! over each body part and only then hands the message to the service:
//!
//! ```text
//! rendered message -> CssInliner -> Base64ToStorage -> Delivery
//! ```
//!
//! A transform error aborts the send before anything reaches the service.

pub mod css;
pub mod delivery;
pub mod images;
pub mod message;
pub mod store;
pub mod transport;

use thiserror::Error;

pub use css::CssInliner;
pub use delivery::{delivery_for, Credentials, Delivery, LogDelivery, PostmarkDelivery};
pub use images::Base64ToStorage;
pub use message::{Message, Receipt};
pub use store::{FsObjectStore, MemoryObjectStore, ObjectStore, StoreError};
pub use transport::{MailTransport, MailTransportBuilder, MessageDefaults, Transform};

/// Mail errors
#[derive(Debug, Error)]
pub enum MailError {
    #[error("image upload failed: {0}")]
    Upload(#[from] StoreError),

    #[error("stylesheet error: {0}")]
    Stylesheet(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("unknown mail service: {0}")]
    UnknownService(String),

    #[error("missing credentials for mail service '{0}'")]
    MissingCredentials(String),
}

/// Result type for mail operations
pub type MailResult<T> = Result<T, MailError>;
