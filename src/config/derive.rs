//! Derived fields (stage 3)
//!
//! Every derivation reads the same snapshot of the merged tree; results
//! are written only after all derivations succeed, so no derivation can
//! observe another's output.

use std::collections::HashSet;
use std::fmt;

use serde_json::{Map, Value};
use tracing::debug;

use super::base::THIRD_PARTY_PROVIDERS;
use super::error::{ConfigError, ConfigResult};
use super::meta::{template_vars, PageMeta};
use super::path::{require_bool, require_object, set_path};

/// Pure computation over the merged tree
pub type Compute = Box<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

/// A field computed from the merged configuration
pub struct DerivedField {
    pub path: String,
    compute: Compute,
}

impl fmt::Debug for DerivedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedField").field("path", &self.path).finish()
    }
}

impl DerivedField {
    pub fn new<F>(path: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            path: path.into(),
            compute: Box::new(compute),
        }
    }

    /// Run the computation against `snapshot`
    pub fn compute(&self, snapshot: &Value) -> ConfigResult<Value> {
        (self.compute)(snapshot).map_err(|reason| ConfigError::Derivation {
            path: self.path.clone(),
            reason,
        })
    }
}

/// `auth.has_third_party_providers`: true if any named provider is enabled
pub fn has_third_party_providers(providers: &[&str]) -> DerivedField {
    let providers: Vec<String> = providers.iter().map(|p| p.to_string()).collect();
    DerivedField::new("auth.has_third_party_providers", move |tree| {
        let mut any = false;
        // Every flag is read so a missing one is reported even after a hit
        for provider in &providers {
            any |= require_bool(tree, &format!("auth.providers.{provider}"))?;
        }
        Ok(Value::Bool(any))
    })
}

/// `meta.pages`: every template in `meta.templates`, rendered
pub fn seo_pages() -> DerivedField {
    DerivedField::new("meta.pages", |tree| {
        let vars = template_vars(tree)?;
        let templates = require_object(tree, "meta.templates")?;
        let mut pages = Map::new();
        for (key, template) in templates {
            let page = PageMeta::from_value(template)
                .map_err(|reason| format!("meta.templates['{key}']: {reason}"))?;
            pages.insert(key.clone(), page.render(&vars).to_value());
        }
        Ok(Value::Object(pages))
    })
}

/// `meta.fallback`: `meta.default`, rendered
pub fn seo_fallback() -> DerivedField {
    DerivedField::new("meta.fallback", |tree| {
        let vars = template_vars(tree)?;
        Ok(PageMeta::from_tree(tree, "meta.default")?.render(&vars).to_value())
    })
}

/// Derivations every configuration gets
pub fn standard_derivations() -> Vec<DerivedField> {
    vec![
        has_third_party_providers(THIRD_PARTY_PROVIDERS),
        seo_pages(),
        seo_fallback(),
    ]
}

/// Compute every field against a snapshot of `tree`, then write them all.
///
/// Two derivations targeting the same path is a configuration defect.
pub fn apply_derivations(mut tree: Value, fields: &[DerivedField]) -> ConfigResult<Value> {
    let mut seen = HashSet::new();
    for field in fields {
        if !seen.insert(field.path.as_str()) {
            return Err(ConfigError::Derivation {
                path: field.path.clone(),
                reason: "more than one derivation targets this path".to_string(),
            });
        }
    }

    let results = fields
        .iter()
        .map(|field| Ok((field.path.as_str(), field.compute(&tree)?)))
        .collect::<ConfigResult<Vec<_>>>()?;

    for (path, value) in results {
        debug!(path, "derived field");
        set_path(&mut tree, path, value).map_err(|reason| ConfigError::Derivation {
            path: path.to_string(),
            reason,
        })?;
    }
    Ok(tree)
}
