//! The finished application configuration
//!
//! Read-only after [`ConfigBuilder::build`](crate::ConfigBuilder::build)
//! returns. Values are copied out through the accessors; handles are
//! shared through `Arc`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use lad_i18n::Localizer;
use lad_mail::MailTransport;
use serde_json::Value;

use crate::config::path::{lookup, require_bool, require_str};
use crate::config::{
    redact_secrets, render_template, ConfigError, ConfigResult, Handle, Handles, PageMeta,
    Provenance, SeoMeta, TranslateFilter,
};

/// Immutable configuration plus live collaborator handles
pub struct AppConfig {
    environment: String,
    tree: Value,
    handles: Handles,
    translate: TranslateFilter,
    transport: Arc<MailTransport>,
    localizer: Arc<Localizer>,
    seo: SeoMeta,
    vars: BTreeMap<String, String>,
    app_name: String,
    third_party: bool,
    provenance: Provenance,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("environment", &self.environment)
            .field("app_name", &self.app_name)
            .field("handles", &self.handles)
            .field("digest", &self.provenance.digest)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    pub(crate) fn assemble(
        environment: String,
        tree: Value,
        handles: Handles,
        localizer: Arc<Localizer>,
        provenance: Provenance,
    ) -> ConfigResult<Self> {
        let derived = |path: &str, reason: String| ConfigError::Derivation {
            path: path.to_string(),
            reason,
        };

        let seo = SeoMeta::from_tree(&tree).map_err(|r| derived("meta.pages", r))?;
        let vars = crate::config::template_vars(&tree).map_err(|r| derived("meta.vars", r))?;
        let third_party = require_bool(&tree, "auth.has_third_party_providers")
            .map_err(|r| derived("auth.has_third_party_providers", r))?;
        let app_name = require_str(&tree, "app_name")
            .map_err(ConfigError::ValidationError)?
            .to_string();
        let (translate, transport) = handles.clone().into_parts()?;

        Ok(Self {
            environment,
            tree,
            handles,
            translate,
            transport,
            localizer,
            seo,
            vars,
            app_name,
            third_party,
            provenance,
        })
    }

    /// Selected environment name
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// The whole tree; reserved slots read as `null`
    pub fn tree(&self) -> &Value {
        &self.tree
    }

    /// Get a config value by path (dot-separated)
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.tree, path)
    }

    /// Get a config value as u64
    pub fn get_u64(&self, path: &str) -> Option<u64> {
        self.get(path).and_then(|v| v.as_u64())
    }

    /// Get a config value as string
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }

    /// Get a config value as bool
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(|v| v.as_bool())
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Whether any third-party sign-in provider is enabled
    pub fn has_third_party_providers(&self) -> bool {
        self.third_party
    }

    pub fn meta(&self) -> &SeoMeta {
        &self.seo
    }

    /// SEO metadata for a page key or request path; unknown pages get the default
    pub fn page_meta(&self, page: &str) -> &PageMeta {
        self.seo.page(page)
    }

    /// SEO metadata with the templates translated into `locale` before rendering
    pub fn page_meta_localized(&self, page: &str, locale: &str) -> PageMeta {
        let key = crate::config::page_key(page);
        let template = self
            .tree
            .get("meta")
            .and_then(|m| m.get("templates"))
            .and_then(|t| t.get(key))
            .or_else(|| self.get("meta.default"))
            .and_then(|v| serde_json::from_value::<PageMeta>(v.clone()).ok());

        match template {
            Some(template) => PageMeta {
                title: render_template(&self.translate(&template.title, locale, &[]), &self.vars),
                description: render_template(
                    &self.translate(&template.description, locale, &[]),
                    &self.vars,
                ),
            },
            None => self.page_meta(page).clone(),
        }
    }

    /// Translate `key` into `locale`
    pub fn translate(&self, key: &str, locale: &str, args: &[&str]) -> String {
        (self.translate)(key, locale, args)
    }

    /// The filter attached at `views.locals.filters.t`
    pub fn translate_filter(&self) -> TranslateFilter {
        Arc::clone(&self.translate)
    }

    pub fn localizer(&self) -> &Arc<Localizer> {
        &self.localizer
    }

    /// The transport attached at `email.transport`
    pub fn transport(&self) -> Arc<MailTransport> {
        Arc::clone(&self.transport)
    }

    /// Handle attached at a reserved slot path
    pub fn handle(&self, path: &str) -> Option<Handle> {
        self.handles.get(path)
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Copy of the tree with secret values replaced for display
    pub fn redacted(&self) -> Value {
        let mut tree = self.tree.clone();
        redact_secrets(&mut tree);
        tree
    }
}
