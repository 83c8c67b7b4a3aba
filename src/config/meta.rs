//! SEO page metadata
//!
//! Templates under `meta.templates` use `{name}` placeholders filled from
//! `meta.vars`. Unknown placeholders are left as written.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::path::{require_object, require_str};

/// Page key used for the site root
pub const HOME_PAGE: &str = "home";

/// Title and description for one page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageMeta {
    pub title: String,
    pub description: String,
}

impl PageMeta {
    /// Read a `{title, description}` record at `path`
    pub fn from_tree(tree: &Value, path: &str) -> Result<Self, String> {
        Ok(Self {
            title: require_str(tree, &format!("{path}.title"))?.to_string(),
            description: require_str(tree, &format!("{path}.description"))?.to_string(),
        })
    }

    /// Read a `{title, description}` record from the value itself.
    ///
    /// Page keys may contain dots, so map entries are parsed here rather
    /// than re-read through a dotted path.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| format!("missing string field '{name}'"))
        };
        Ok(Self {
            title: field("title")?,
            description: field("description")?,
        })
    }

    /// Substitute `vars` into both fields
    pub fn render(&self, vars: &BTreeMap<String, String>) -> Self {
        Self {
            title: render_template(&self.title, vars),
            description: render_template(&self.description, vars),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({"title": self.title, "description": self.description})
    }
}

/// Replace each `{name}` in `template` with `vars[name]`
pub fn render_template(template: &str, vars: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match vars.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Template variables from `meta.vars`; non-string scalars are stringified
pub fn template_vars(tree: &Value) -> Result<BTreeMap<String, String>, String> {
    let vars = require_object(tree, "meta.vars")?;
    vars.iter()
        .map(|(name, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return Err(format!("meta var '{name}' must be a scalar")),
            };
            Ok((name.clone(), text))
        })
        .collect()
}

/// Map a request path or page key to a page key: `/` is home, slashes trimmed
pub fn page_key(page: &str) -> &str {
    match page.trim_matches('/') {
        "" => HOME_PAGE,
        key => key,
    }
}

/// Rendered SEO metadata for every known page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeoMeta {
    pages: BTreeMap<String, PageMeta>,
    fallback: PageMeta,
}

impl SeoMeta {
    /// Read the derived `meta.pages` and `meta.fallback` from a tree
    pub fn from_tree(tree: &Value) -> Result<Self, String> {
        let pages = require_object(tree, "meta.pages")?
            .iter()
            .map(|(key, value)| {
                let page = PageMeta::from_value(value)
                    .map_err(|reason| format!("meta.pages['{key}']: {reason}"))?;
                Ok((key.clone(), page))
            })
            .collect::<Result<BTreeMap<_, _>, String>>()?;
        Ok(Self {
            pages,
            fallback: PageMeta::from_tree(tree, "meta.fallback")?,
        })
    }

    /// Metadata for a page; unknown pages get the fallback record
    pub fn page(&self, page: &str) -> &PageMeta {
        self.pages.get(page_key(page)).unwrap_or(&self.fallback)
    }

    pub fn contains(&self, page: &str) -> bool {
        self.pages.contains_key(page_key(page))
    }

    pub fn fallback(&self) -> &PageMeta {
        &self.fallback
    }

    pub fn page_keys(&self) -> impl Iterator<Item = &str> {
        self.pages.keys().map(String::as_str)
    }

    pub fn to_value(&self) -> Value {
        let pages: Map<String, Value> = self
            .pages
            .iter()
            .map(|(k, v)| (k.clone(), v.to_value()))
            .collect();
        serde_json::json!({"pages": pages, "fallback": self.fallback.to_value()})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("app".to_string(), "Lad".to_string()),
            ("url".to_string(), "https://lad.sh".to_string()),
        ])
    }

    #[test]
    fn test_render_template() {
        assert_eq!(render_template("{app} — Home", &vars()), "Lad — Home");
        assert_eq!(render_template("{app} at {url}", &vars()), "Lad at https://lad.sh");
        assert_eq!(render_template("{nope} {app}", &vars()), "{nope} Lad");
        assert_eq!(render_template("unclosed {app", &vars()), "unclosed {app");
        assert_eq!(render_template("", &vars()), "");
    }

    #[test]
    fn test_page_key() {
        assert_eq!(page_key("/"), "home");
        assert_eq!(page_key(""), "home");
        assert_eq!(page_key("/about/"), "about");
        assert_eq!(page_key("privacy"), "privacy");
    }

    #[test]
    fn test_template_vars() {
        let tree = json!({"meta": {"vars": {"app": "Lad", "year": 2026}}});
        let vars = template_vars(&tree).unwrap();
        assert_eq!(vars["year"], "2026");

        let bad = json!({"meta": {"vars": {"app": ["Lad"]}}});
        assert!(template_vars(&bad).is_err());
    }

    #[test]
    fn test_seo_meta_lookup_and_fallback() {
        let tree = json!({
            "meta": {
                "pages": {"home": {"title": "Lad — Home", "description": "Home page"}},
                "fallback": {"title": "Lad", "description": "Lad — https://lad.sh"}
            }
        });
        let seo = SeoMeta::from_tree(&tree).unwrap();

        assert_eq!(seo.page("/").title, "Lad — Home");
        assert!(seo.contains("home"));
        assert_eq!(seo.page("/missing"), seo.fallback());
        assert_eq!(seo.to_value()["pages"]["home"]["title"], "Lad — Home");
    }

    #[test]
    fn test_seo_meta_dotted_page_key() {
        let tree = json!({
            "meta": {
                "pages": {"docs.v2": {"title": "Docs v2", "description": "Second edition"}},
                "fallback": {"title": "Lad", "description": "Lad"}
            }
        });
        let seo = SeoMeta::from_tree(&tree).unwrap();

        assert!(seo.contains("docs.v2"));
        assert_eq!(seo.page("/docs.v2").title, "Docs v2");
    }

    #[test]
    fn test_page_meta_from_value() {
        let page = PageMeta::from_value(&json!({"title": "T", "description": "D"})).unwrap();
        assert_eq!(page.title, "T");

        let err = PageMeta::from_value(&json!({"title": "T"})).unwrap_err();
        assert!(err.contains("description"));
    }
}
