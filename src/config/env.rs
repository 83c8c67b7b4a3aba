//! Resolved environment variables
//!
//! The pipeline reads environment values through [`EnvironmentMap`] only;
//! it never touches the process environment itself.

use std::collections::BTreeMap;

use serde_json::{Number, Value};

use super::error::{ConfigError, ConfigResult};

/// A typed environment value
#[derive(Debug, Clone, PartialEq)]
pub enum EnvValue {
    String(String),
    Number(Number),
    Bool(bool),
}

impl EnvValue {
    /// Type a raw string: `true`/`false` become booleans, integers that
    /// print back identically become numbers, everything else stays a string.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "true" => return EnvValue::Bool(true),
            "false" => return EnvValue::Bool(false),
            _ => {}
        }
        if let Ok(n) = raw.parse::<i64>() {
            if n.to_string() == raw {
                return EnvValue::Number(n.into());
            }
        }
        EnvValue::String(raw.to_string())
    }

    /// String form of any value
    pub fn to_text(&self) -> String {
        match self {
            EnvValue::String(s) => s.clone(),
            EnvValue::Number(n) => n.to_string(),
            EnvValue::Bool(b) => b.to_string(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            EnvValue::String(s) => Value::String(s.clone()),
            EnvValue::Number(n) => Value::Number(n.clone()),
            EnvValue::Bool(b) => Value::Bool(*b),
        }
    }
}

impl From<&str> for EnvValue {
    fn from(s: &str) -> Self {
        EnvValue::String(s.to_string())
    }
}

impl From<String> for EnvValue {
    fn from(s: String) -> Self {
        EnvValue::String(s)
    }
}

impl From<bool> for EnvValue {
    fn from(b: bool) -> Self {
        EnvValue::Bool(b)
    }
}

impl From<i64> for EnvValue {
    fn from(n: i64) -> Self {
        EnvValue::Number(n.into())
    }
}

impl From<u64> for EnvValue {
    fn from(n: u64) -> Self {
        EnvValue::Number(n.into())
    }
}

/// Immutable name -> value map, resolved before the pipeline starts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentMap {
    vars: BTreeMap<String, EnvValue>,
}

impl EnvironmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from already-typed pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<EnvValue>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Build from raw strings, typing each value with [`EnvValue::parse`]
    pub fn from_strings<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: AsRef<str>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), EnvValue::parse(v.as_ref())))
                .collect(),
        }
    }

    /// Snapshot of the process environment
    pub fn from_process() -> Self {
        Self::from_strings(std::env::vars())
    }

    /// Add or replace a variable
    pub fn with(mut self, name: impl Into<String>, value: impl Into<EnvValue>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&EnvValue> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Non-empty value or `MissingVariable`
    pub fn require_str(&self, name: &str) -> ConfigResult<String> {
        self.optional_str(name)
            .ok_or_else(|| ConfigError::MissingVariable(name.to_string()))
    }

    /// Non-empty value, if set
    pub fn optional_str(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(EnvValue::to_text)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn str_or(&self, name: &str, default: &str) -> String {
        self.optional_str(name).unwrap_or_else(|| default.to_string())
    }

    /// Boolean value; strings other than `true`/`false`/`1`/`0` are rejected
    pub fn bool_or(&self, name: &str, default: bool) -> ConfigResult<bool> {
        match self.get(name) {
            None => Ok(default),
            Some(EnvValue::Bool(b)) => Ok(*b),
            Some(EnvValue::Number(n)) if n.as_i64() == Some(1) => Ok(true),
            Some(EnvValue::Number(n)) if n.as_i64() == Some(0) => Ok(false),
            Some(EnvValue::String(s)) if s.trim().is_empty() => Ok(default),
            Some(_) => Err(ConfigError::InvalidVariable {
                name: name.to_string(),
                expected: "a boolean",
            }),
        }
    }

    /// Unsigned integer value
    pub fn u64_or(&self, name: &str, default: u64) -> ConfigResult<u64> {
        match self.get(name) {
            None => Ok(default),
            Some(EnvValue::Number(n)) => n.as_u64().ok_or_else(|| ConfigError::InvalidVariable {
                name: name.to_string(),
                expected: "an unsigned integer",
            }),
            Some(EnvValue::String(s)) if s.trim().is_empty() => Ok(default),
            Some(_) => Err(ConfigError::InvalidVariable {
                name: name.to_string(),
                expected: "an unsigned integer",
            }),
        }
    }

    /// Comma-separated list
    pub fn list_or(&self, name: &str, default: &[&str]) -> Vec<String> {
        match self.optional_str(name) {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => default.iter().map(|s| s.to_string()).collect(),
        }
    }
}
