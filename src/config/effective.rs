//! Provenance of the effective configuration
//!
//! Records which sources contributed to the final tree and a digest of
//! its canonical JSON form, so two processes can tell whether they run
//! with the same configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::error::{ConfigError, ConfigResult};

/// Schema version for provenance records
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "lad-config/provenance@1";

/// Marker written in place of secret values
pub const REDACTED: &str = "[REDACTED]";

/// Keys that contain secrets and should be redacted
const SECRET_KEYS: &[&str] = &[
    "password",
    "token",
    "secret",
    "private_key",
    "api_key",
    "credential",
];

/// Origin of a configuration source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    /// Base definition plus environment map
    Base,
    /// Built-in overlay table
    Builtin,
    /// Overlay loaded from a TOML file
    File,
    /// Overlay registered in code
    Inline,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigSource {
    /// Origin of this source
    pub origin: ConfigOrigin,

    /// Environment the overlay belongs to (None for the base)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    /// File path (None unless loaded from disk)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None unless loaded from disk)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ConfigSource {
    pub fn base() -> Self {
        Self {
            origin: ConfigOrigin::Base,
            environment: None,
            path: None,
            digest: None,
        }
    }

    pub fn builtin(environment: &str) -> Self {
        Self {
            origin: ConfigOrigin::Builtin,
            environment: Some(environment.to_string()),
            path: None,
            digest: None,
        }
    }
}

/// Where the effective configuration came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// Selected environment
    pub environment: String,

    /// When this config was computed
    pub created_at: DateTime<Utc>,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,

    /// Whether an overlay was applied for the environment
    pub overlay_applied: bool,

    /// SHA-256 of the canonical JSON of the final tree
    pub digest: String,
}

impl Provenance {
    /// Record provenance for a finished tree
    pub fn record(
        environment: &str,
        sources: Vec<ConfigSource>,
        overlay_applied: bool,
        tree: &Value,
    ) -> ConfigResult<Self> {
        Ok(Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            environment: environment.to_string(),
            created_at: Utc::now(),
            sources,
            overlay_applied,
            digest: digest(tree)?,
        })
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// SHA-256 (hex) of the JCS canonical form of `tree`
pub fn digest(tree: &Value) -> ConfigResult<String> {
    let canonical = serde_json_canonicalizer::to_vec(tree)
        .map_err(|e| ConfigError::ParseError(format!("canonical JSON failed: {e}")))?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

/// Redact secrets in the config, returning list of redacted paths
pub fn redact_secrets(value: &mut Value) -> Vec<String> {
    let mut redactions = Vec::new();
    redact_recursive(value, String::new(), &mut redactions);
    redactions
}

fn redact_recursive(value: &mut Value, path: String, redactions: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                let key_lower = key.to_lowercase();
                let current_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };

                let is_secret = SECRET_KEYS.iter().any(|s| key_lower.contains(s));

                // Unset secrets stay null so "not configured" remains visible
                if is_secret && !val.is_object() && !val.is_array() && !val.is_null() {
                    *val = Value::String(REDACTED.to_string());
                    redactions.push(current_path);
                } else {
                    redact_recursive(val, current_path, redactions);
                }
            }
        }
        Value::Array(arr) => {
            for (i, val) in arr.iter_mut().enumerate() {
                let current_path = format!("{}[{}]", path, i);
                redact_recursive(val, current_path, redactions);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_digest_ignores_key_order() {
        let a = json!({"app_name": "Lad", "port": 3000, "email": {"send": false, "from": "x"}});
        let b = json!({"email": {"from": "x", "send": false}, "port": 3000, "app_name": "Lad"});
        assert_eq!(digest(&a).unwrap(), digest(&b).unwrap());
        assert_ne!(digest(&a).unwrap(), digest(&json!({"port": 3001})).unwrap());
    }

    #[test]
    fn test_redact_secrets() {
        let mut tree = json!({
            "email": {
                "auth": {"token": "pm-123", "username": "lad"},
                "from": "noreply@example.com"
            },
            "oauth": {"client_secret": null}
        });

        let redactions = redact_secrets(&mut tree);

        assert_eq!(redactions, vec!["email.auth.token"]);
        assert_eq!(tree["email"]["auth"]["token"], REDACTED);
        assert_eq!(tree["email"]["auth"]["username"], "lad");
        assert!(tree["oauth"]["client_secret"].is_null());
    }

    #[test]
    fn test_provenance_serializes() {
        let sources = vec![ConfigSource::base(), ConfigSource::builtin("test")];
        let provenance = Provenance::record("test", sources, true, &json!({"a": 1})).unwrap();

        let json = provenance.to_json().unwrap();
        assert!(json.contains("\"origin\": \"builtin\""));
        assert!(json.contains(SCHEMA_ID));
        assert_eq!(provenance.digest.len(), 64);
    }
}
