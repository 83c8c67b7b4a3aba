//! Lad configuration layer
//!
//! Builds one immutable application configuration from the environment:
//! a base definition, a per-environment overlay, derived fields, and the
//! live handles (translate filter and mail transport) attached to it.

pub mod app;
pub mod augment;
pub mod config;
pub mod logger;
pub mod pipeline;

pub use app::AppConfig;
pub use config::{ConfigError, ConfigResult, EnvironmentMap, OverlaySet};
pub use pipeline::{ConfigBuilder, DEFAULT_ENVIRONMENT, ENVIRONMENT_VAR};
