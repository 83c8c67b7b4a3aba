//! Phrase catalog files
//!
//! A catalog is a flat JSON object mapping phrase ids to translated strings.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::{I18nError, I18nResult};

/// One locale's phrases
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    phrases: HashMap<String, String>,
}

impl Catalog {
    /// Read and parse a catalog file
    pub fn load(path: &Path) -> I18nResult<Self> {
        let raw = fs::read_to_string(path).map_err(|source| I18nError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw).map_err(|reason| I18nError::Invalid {
            path: path.display().to_string(),
            reason,
        })
    }

    /// Parse catalog JSON. Every value must be a string.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        let Value::Object(map) = value else {
            return Err("catalog must be a JSON object".to_string());
        };

        let mut phrases = HashMap::with_capacity(map.len());
        for (key, value) in map {
            match value {
                Value::String(s) => {
                    phrases.insert(key, s);
                }
                other => {
                    return Err(format!("phrase '{key}' is not a string: {other}"));
                }
            }
        }
        Ok(Self { phrases })
    }

    /// Look up a phrase
    pub fn get(&self, key: &str) -> Option<&str> {
        self.phrases.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_object() {
        let catalog = Catalog::parse(r#"{"Hello": "Hola"}"#).unwrap();
        assert_eq!(catalog.get("Hello"), Some("Hola"));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_rejects_non_string_phrase() {
        let err = Catalog::parse(r#"{"count": 3}"#).unwrap_err();
        assert!(err.contains("count"));
    }

    #[test]
    fn test_rejects_array_root() {
        assert!(Catalog::parse(r#"["Hello"]"#).is_err());
    }
}
