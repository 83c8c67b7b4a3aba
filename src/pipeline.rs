//! Configuration pipeline
//!
//! Runs the four stages once, in order:
//! - Base definition from the environment map
//! - Environment overlay
//! - Derived fields, then validation
//! - Augmentation (localizer and mail transport)
//!
//! There is no reload; a new configuration means a new build.

use std::path::PathBuf;
use std::sync::Arc;

use lad_mail::{Delivery, ObjectStore};
use serde_json::Value;
use tracing::{debug, info};

use crate::app::AppConfig;
use crate::augment::{augment, MailOverrides};
use crate::config::{
    apply_derivations, apply_overlay, standard_derivations, validate_config, BaseDefinition,
    ConfigResult, ConfigSource, DerivedField, EnvironmentMap, OverlaySet, Provenance,
};

/// Variable selecting the environment overlay
pub const ENVIRONMENT_VAR: &str = "LAD_ENV";

/// Environment used when [`ENVIRONMENT_VAR`] is unset
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Output of the pure stages: the frozen tree before augmentation
#[derive(Debug, Clone)]
pub struct Composed {
    pub tree: Value,
    pub sources: Vec<ConfigSource>,
    pub overlay_applied: bool,
}

/// Builds an [`AppConfig`]
pub struct ConfigBuilder {
    env: EnvironmentMap,
    environment: String,
    overlays: OverlaySet,
    derivations: Vec<DerivedField>,
    root: PathBuf,
    mail: MailOverrides,
}

impl ConfigBuilder {
    /// Builder for an explicit environment, with the built-in overlays and
    /// standard derivations
    pub fn new(env: EnvironmentMap, environment: impl Into<String>) -> Self {
        Self {
            env,
            environment: environment.into(),
            overlays: OverlaySet::builtin(),
            derivations: standard_derivations(),
            root: PathBuf::from("."),
            mail: MailOverrides::default(),
        }
    }

    /// Builder whose environment comes from `LAD_ENV` in the map
    pub fn from_env(env: EnvironmentMap) -> Self {
        let environment = env
            .optional_str(ENVIRONMENT_VAR)
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
        Self::new(env, environment)
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Merge more overlays over the built-in ones
    pub fn overlays(mut self, overlays: OverlaySet) -> Self {
        self.overlays.extend(overlays);
        self
    }

    /// Use exactly these overlays, dropping the built-in ones
    pub fn replace_overlays(mut self, overlays: OverlaySet) -> Self {
        self.overlays = overlays;
        self
    }

    /// Add a derivation after the standard ones
    pub fn derivation(mut self, field: DerivedField) -> Self {
        self.derivations.push(field);
        self
    }

    /// Directory relative configuration paths resolve under
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Deliver through `delivery` instead of the configured service
    pub fn delivery(mut self, delivery: Arc<dyn Delivery>) -> Self {
        self.mail.delivery = Some(delivery);
        self
    }

    /// Offload images to `store` instead of the configured one
    pub fn object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.mail.object_store = Some(store);
        self
    }

    /// Run the side-effect-free stages: base, overlay, derivation, validation
    pub fn compose(&self) -> ConfigResult<Composed> {
        let environment = self.environment.as_str();

        // Stage 1: base definition
        let base = BaseDefinition::from_env(&self.env)?.to_value(environment)?;
        let mut sources = vec![ConfigSource::base()];

        // Stage 2: overlay
        let (merged, overlay_applied) = apply_overlay(base, &self.overlays, environment);
        if overlay_applied {
            sources.extend(self.overlays.sources_for(environment).iter().cloned());
        }

        // Stage 3: derivations
        let tree = apply_derivations(merged, &self.derivations)?;
        validate_config(&tree)?;
        debug!(environment, derivations = self.derivations.len(), "configuration composed");

        Ok(Composed {
            tree,
            sources,
            overlay_applied,
        })
    }

    /// Run every stage and return the finished configuration
    pub fn build(self) -> ConfigResult<AppConfig> {
        let Composed {
            tree,
            sources,
            overlay_applied,
        } = self.compose()?;

        // Stage 4: augmentation
        let augmented = augment(&tree, &self.root, &self.mail)?;

        let provenance = Provenance::record(&self.environment, sources, overlay_applied, &tree)?;
        info!(
            environment = %self.environment,
            overlay_applied,
            digest = %provenance.digest,
            "configuration ready"
        );

        AppConfig::assemble(
            self.environment,
            tree,
            augmented.handles,
            augmented.localizer,
            provenance,
        )
    }
}
