//! Configuration composition
//!
//! The configuration tree is built in fixed stages:
//! 1. Base definition from the environment map
//! 2. Environment overlay (deep merge)
//! 3. Derived fields
//! 4. Augmentation: live handles attached to reserved slots

mod base;
mod derive;
mod effective;
mod env;
mod error;
mod merge;
mod meta;
mod overlay;
pub mod path;
mod slots;
mod validate;

pub use base::{BaseDefinition, PHRASES, THIRD_PARTY_PROVIDERS};
pub use derive::{
    apply_derivations, has_third_party_providers, seo_fallback, seo_pages,
    standard_derivations, DerivedField,
};
pub use effective::{
    digest, redact_secrets, ConfigOrigin, ConfigSource, Provenance, REDACTED, SCHEMA_ID,
    SCHEMA_VERSION,
};
pub use env::{EnvValue, EnvironmentMap};
pub use error::{ConfigError, ConfigResult};
pub use merge::{apply_overlay, deep_merge};
pub use meta::{page_key, render_template, template_vars, PageMeta, SeoMeta, HOME_PAGE};
pub use overlay::{toml_to_json, OverlaySet};
pub use slots::{
    Handle, Handles, TranslateFilter, RESERVED_SLOTS, TRANSLATE_SLOT, TRANSPORT_SLOT,
};
pub use validate::{validate_config, IMAGE_STORES, LOG_LEVELS};
