//! Per-environment overlays (stage 2 input)
//!
//! Overlays come from the built-in table or from a directory holding one
//! `<environment>.toml` per environment. Only objects are accepted; a
//! scalar or array overlay is rejected when it is registered.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::effective::{ConfigOrigin, ConfigSource};
use super::error::{ConfigError, ConfigResult};
use super::merge::deep_merge;

/// Environment name -> partial configuration tree
#[derive(Debug, Clone, Default)]
pub struct OverlaySet {
    overlays: BTreeMap<String, Value>,
    sources: BTreeMap<String, Vec<ConfigSource>>,
}

impl OverlaySet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in overlays for `development`, `test` and `production`
    pub fn builtin() -> Self {
        let mut set = Self::new();
        let table = [
            (
                "development",
                json!({
                    "logger": {"level": "debug"},
                    "email": {"send": false}
                }),
            ),
            (
                "test",
                json!({
                    "logger": {"level": "warn"},
                    "email": {
                        "send": false,
                        "images": {"store": "memory"}
                    }
                }),
            ),
            (
                "production",
                json!({
                    "email": {"send": true},
                    "views": {"cache": true}
                }),
            ),
        ];
        for (environment, overlay) in table {
            set.put(environment, overlay, ConfigSource::builtin(environment));
        }
        set
    }

    /// Register an overlay. Overlays registered for the same environment
    /// are deep-merged, later ones winning.
    pub fn insert(&mut self, environment: impl Into<String>, overlay: Value) -> ConfigResult<()> {
        let environment = environment.into();
        Self::check(&environment, &overlay)?;
        let source = ConfigSource {
            origin: ConfigOrigin::Inline,
            environment: Some(environment.clone()),
            path: None,
            digest: None,
        };
        self.put(&environment, overlay, source);
        Ok(())
    }

    /// Builder form of [`OverlaySet::insert`]
    pub fn with(mut self, environment: impl Into<String>, overlay: Value) -> ConfigResult<Self> {
        self.insert(environment, overlay)?;
        Ok(self)
    }

    /// Load every `*.toml` file in `dir`; the file stem names the environment
    pub fn load_dir(dir: &Path) -> ConfigResult<Self> {
        let entries = fs::read_dir(dir)
            .map_err(|e| ConfigError::IoError(format!("cannot read {}: {e}", dir.display())))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| ConfigError::IoError(e.to_string()))?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("toml") {
                paths.push(path);
            }
        }
        // Directory order is unspecified
        paths.sort();

        let mut set = Self::new();
        for path in paths {
            let Some(environment) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let (overlay, digest) = Self::load_toml_file(&path)?;
            Self::check(&environment, &overlay)?;
            debug!(environment = %environment, path = %path.display(), "loaded overlay file");
            let source = ConfigSource {
                origin: ConfigOrigin::File,
                environment: Some(environment.clone()),
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            };
            set.put(&environment, overlay, source);
        }
        Ok(set)
    }

    /// Merge `other` over this set
    pub fn extend(&mut self, other: OverlaySet) {
        let OverlaySet { overlays, mut sources } = other;
        for (environment, overlay) in overlays {
            let merged = match self.overlays.remove(&environment) {
                Some(existing) => deep_merge(existing, overlay),
                None => overlay,
            };
            self.overlays.insert(environment.clone(), merged);
            if let Some(added) = sources.remove(&environment) {
                self.sources.entry(environment).or_default().extend(added);
            }
        }
    }

    /// Overlay for an environment
    pub fn get(&self, environment: &str) -> Option<&Value> {
        self.overlays.get(environment)
    }

    /// Sources that contributed to an environment's overlay, in order
    pub fn sources_for(&self, environment: &str) -> &[ConfigSource] {
        self.sources
            .get(environment)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Environment names with an overlay
    pub fn environments(&self) -> impl Iterator<Item = &str> {
        self.overlays.keys().map(String::as_str)
    }

    fn put(&mut self, environment: &str, overlay: Value, source: ConfigSource) {
        let merged = match self.overlays.remove(environment) {
            Some(existing) => deep_merge(existing, overlay),
            None => overlay,
        };
        self.overlays.insert(environment.to_string(), merged);
        self.sources.entry(environment.to_string()).or_default().push(source);
    }

    fn check(environment: &str, overlay: &Value) -> ConfigResult<()> {
        if environment.trim().is_empty() {
            return Err(ConfigError::MalformedOverlay {
                environment: environment.to_string(),
                reason: "environment name is empty".to_string(),
            });
        }
        if !overlay.is_object() {
            return Err(ConfigError::MalformedOverlay {
                environment: environment.to_string(),
                reason: format!("overlay must be a table, got {overlay}"),
            });
        }
        Ok(())
    }

    /// Load and parse a TOML file, returning the value and digest
    fn load_toml_file(path: &Path) -> ConfigResult<(Value, String)> {
        let bytes = fs::read(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let digest = hex::encode(Sha256::digest(&bytes));

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;

        let toml_value: toml::Value = toml::from_str(&contents).map_err(|e| {
            ConfigError::ParseError(format!("TOML parse error in {}: {}", path.display(), e))
        })?;

        Ok((toml_to_json(toml_value), digest))
    }
}

/// Convert TOML Value to JSON Value
pub fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            Value::Object(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_environments() {
        let set = OverlaySet::builtin();
        let names: Vec<&str> = set.environments().collect();
        assert_eq!(names, vec!["development", "production", "test"]);
        assert_eq!(set.get("test").unwrap()["email"]["images"]["store"], "memory");
        assert_eq!(set.sources_for("test")[0].origin, ConfigOrigin::Builtin);
    }

    #[test]
    fn test_insert_rejects_scalar_overlay() {
        let mut set = OverlaySet::new();
        let err = set.insert("production", json!(true)).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedOverlay { .. }));
        assert!(set.get("production").is_none());
    }

    #[test]
    fn test_insert_same_environment_merges() {
        let set = OverlaySet::new()
            .with("test", json!({"email": {"send": false, "from": "a@example.com"}}))
            .unwrap()
            .with("test", json!({"email": {"from": "b@example.com"}}))
            .unwrap();

        let overlay = set.get("test").unwrap();
        assert_eq!(overlay["email"]["send"], false);
        assert_eq!(overlay["email"]["from"], "b@example.com");
        assert_eq!(set.sources_for("test").len(), 2);
    }

    #[test]
    fn test_load_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("staging.toml"),
            "port = 8080\n[email]\nsend = true\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let set = OverlaySet::load_dir(dir.path()).unwrap();

        let overlay = set.get("staging").unwrap();
        assert_eq!(overlay["port"], 8080);
        assert_eq!(overlay["email"]["send"], true);
        let source = &set.sources_for("staging")[0];
        assert_eq!(source.origin, ConfigOrigin::File);
        assert_eq!(source.digest.as_ref().unwrap().len(), 64);
        assert_eq!(set.environments().count(), 1);
    }

    #[test]
    fn test_load_dir_parse_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("production.toml"), "port = = 1").unwrap();

        let err = OverlaySet::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_extend_layers_file_over_builtin() {
        let mut set = OverlaySet::builtin();
        set.extend(OverlaySet::new().with("production", json!({"views": {"cache": false}})).unwrap());

        let production = set.get("production").unwrap();
        assert_eq!(production["views"]["cache"], false);
        assert_eq!(production["email"]["send"], true);
        assert_eq!(set.sources_for("production").len(), 2);
    }

    #[test]
    fn test_toml_to_json() {
        let value: toml::Value = toml::from_str("a = 1.5\nb = [\"x\"]\n[c]\nd = true").unwrap();
        let json = toml_to_json(value);
        assert_eq!(json["a"], 1.5);
        assert_eq!(json["b"][0], "x");
        assert_eq!(json["c"]["d"], true);
    }
}
