//! Validation of the merged, derived tree
//!
//! Runs before augmentation so a bad overlay is reported as a validation
//! error instead of surfacing later as a collaborator failure.

use serde_json::Value;

use super::error::{ConfigError, ConfigResult};
use super::path::{require_str, require_str_list, require_u64};

/// Accepted values for `logger.level`
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Accepted values for `email.images.store`
pub const IMAGE_STORES: &[&str] = &["fs", "memory"];

/// Validate configuration values
pub fn validate_config(config: &Value) -> ConfigResult<()> {
    let invalid = ConfigError::ValidationError;

    // port must be in [1, 65535]
    let port = require_u64(config, "port").map_err(invalid)?;
    if port == 0 || port > u64::from(u16::MAX) {
        return Err(ConfigError::ValidationError(format!(
            "port must be in [1, 65535], got {port}"
        )));
    }

    let level = require_str(config, "logger.level").map_err(invalid)?;
    if !LOG_LEVELS.contains(&level) {
        return Err(ConfigError::ValidationError(format!(
            "logger.level must be one of {LOG_LEVELS:?}, got '{level}'"
        )));
    }

    let from = require_str(config, "email.from").map_err(invalid)?;
    if from.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "email.from must not be empty".to_string(),
        ));
    }

    let store = require_str(config, "email.images.store").map_err(invalid)?;
    if !IMAGE_STORES.contains(&store) {
        return Err(ConfigError::ValidationError(format!(
            "email.images.store must be one of {IMAGE_STORES:?}, got '{store}'"
        )));
    }

    // default_locale must be one of the supported locales
    let locales = require_str_list(config, "i18n.locales").map_err(invalid)?;
    if locales.is_empty() {
        return Err(ConfigError::ValidationError(
            "i18n.locales must list at least one locale".to_string(),
        ));
    }
    let default_locale = require_str(config, "i18n.default_locale").map_err(invalid)?;
    if !locales.iter().any(|l| l == default_locale) {
        return Err(ConfigError::ValidationError(format!(
            "i18n.default_locale '{default_locale}' is not in i18n.locales {locales:?}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> Value {
        json!({
            "port": 3000,
            "logger": {"level": "info"},
            "email": {"from": "noreply@example.com", "images": {"store": "fs"}},
            "i18n": {"locales": ["en", "es"], "default_locale": "en"}
        })
    }

    #[test]
    fn test_valid_config() {
        validate_config(&config()).unwrap();
    }

    #[test]
    fn test_validation_port() {
        let mut c = config();
        c["port"] = json!(70000);
        let err = validate_config(&c).unwrap_err();
        assert!(err.to_string().contains("port"));

        c["port"] = json!("3000");
        assert!(validate_config(&c).is_err());
    }

    #[test]
    fn test_validation_log_level() {
        let mut c = config();
        c["logger"]["level"] = json!("loud");
        assert!(validate_config(&c).unwrap_err().to_string().contains("logger.level"));
    }

    #[test]
    fn test_validation_image_store() {
        let mut c = config();
        c["email"]["images"]["store"] = json!("s3");
        assert!(validate_config(&c).is_err());
    }

    #[test]
    fn test_validation_default_locale() {
        let mut c = config();
        c["i18n"]["default_locale"] = json!("fr");
        let err = validate_config(&c).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("fr"));
    }
}
