//! Configuration merge logic
//!
//! Implements the base + overlay merge with:
//! - Objects: deep-merge by key
//! - Arrays: REPLACE (overlay wins)
//! - Scalars: override (overlay wins)

use serde_json::Value;
use tracing::debug;

use super::overlay::OverlaySet;

/// Deep merge two JSON values.
///
/// Merge semantics:
/// - Objects: deep-merge by key (recursive)
/// - Arrays: REPLACE (second wins entirely)
/// - Scalars: override (second wins)
/// - Null: override (null can override any value)
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        // Both objects: deep merge
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = if let Some(base_value) = base_map.remove(&key) {
                    deep_merge(base_value, overlay_value)
                } else {
                    overlay_value
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }

        // Arrays: REPLACE (no concatenation)
        (Value::Array(_), overlay @ Value::Array(_)) => overlay,

        // Scalars and any other case: overlay wins
        (_, overlay) => overlay,
    }
}

/// Apply the overlay registered for `environment`, if any.
///
/// Returns the merged tree and whether an overlay was applied. A missing
/// overlay leaves the base untouched.
pub fn apply_overlay(base: Value, overlays: &OverlaySet, environment: &str) -> (Value, bool) {
    match overlays.get(environment) {
        Some(overlay @ Value::Object(_)) => {
            debug!(environment, "applying environment overlay");
            (deep_merge(base, overlay.clone()), true)
        }
        _ => {
            debug!(environment, "no overlay for environment");
            (base, false)
        }
    }
}
