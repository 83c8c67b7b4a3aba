//! Configuration errors
//!
//! Everything here is a startup defect: the process logs it and exits.

use lad_i18n::I18nError;
use lad_mail::{MailError, StoreError};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVariable(String),

    #[error("environment variable {name} must be {expected}")]
    InvalidVariable { name: String, expected: &'static str },

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("malformed overlay for environment '{environment}': {reason}")]
    MalformedOverlay { environment: String, reason: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("derivation of '{path}' failed: {reason}")]
    Derivation { path: String, reason: String },

    #[error("slot error: {0}")]
    Slot(String),

    #[error("localization error: {0}")]
    Localization(#[from] I18nError),

    #[error("mail transport error: {0}")]
    Transport(#[from] MailError),

    #[error("object store error: {0}")]
    Store(#[from] StoreError),

    #[error("logger error: {0}")]
    Logger(String),
}

impl ConfigError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::MissingVariable(_) | ConfigError::InvalidVariable { .. } => 2,
            ConfigError::IoError(_) | ConfigError::ParseError(_) => 3,
            ConfigError::MalformedOverlay { .. } | ConfigError::ValidationError(_) => 4,
            ConfigError::Derivation { .. } => 5,
            ConfigError::Slot(_) => 6,
            ConfigError::Localization(_) => 7,
            ConfigError::Transport(_) | ConfigError::Store(_) => 8,
            ConfigError::Logger(_) => 1,
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_variable_display() {
        let e = ConfigError::MissingVariable("APP_NAME".into());
        assert!(e.to_string().contains("APP_NAME"));
        assert_eq!(e.exit_code(), 2);
    }

    #[test]
    fn test_wrapped_errors_convert() {
        let e: ConfigError = MailError::UnknownService("pigeon".into()).into();
        assert!(e.to_string().contains("pigeon"));
        assert_eq!(e.exit_code(), 8);
    }
}
