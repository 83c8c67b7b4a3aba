//! Localization augmentation

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use lad_i18n::{I18nConfig, Localizer};
use serde_json::Value;
use tracing::info;

use crate::config::path::{require_object, require_str, require_str_list};
use crate::config::{ConfigError, ConfigResult, TranslateFilter};

/// Localizer input from the `i18n` subtree; relative directories resolve under `root`
pub fn i18n_config(tree: &Value, root: &Path) -> ConfigResult<I18nConfig> {
    let invalid = ConfigError::ValidationError;

    let phrases = require_object(tree, "i18n.phrases")
        .map_err(invalid)?
        .iter()
        .map(|(key, value)| {
            value
                .as_str()
                .map(|s| (key.clone(), s.to_string()))
                .ok_or_else(|| ConfigError::ValidationError(format!("phrase '{key}' must be a string")))
        })
        .collect::<ConfigResult<BTreeMap<_, _>>>()?;

    Ok(I18nConfig {
        locales: require_str_list(tree, "i18n.locales").map_err(invalid)?,
        default_locale: require_str(tree, "i18n.default_locale").map_err(invalid)?.to_string(),
        directory: root.join(require_str(tree, "i18n.directory").map_err(invalid)?),
        phrases,
    })
}

/// Load every catalog named by the configuration
pub fn build_localizer(tree: &Value, root: &Path) -> ConfigResult<Arc<Localizer>> {
    let config = i18n_config(tree, root)?;
    let localizer = Localizer::new(config)?;
    info!(
        locales = %localizer.locales().join(","),
        default_locale = localizer.default_locale(),
        "localizer ready"
    );
    Ok(Arc::new(localizer))
}

/// Template filter `t(key, locale, args)` backed by `localizer`
pub fn translate_filter(localizer: Arc<Localizer>) -> TranslateFilter {
    Arc::new(move |key: &str, locale: &str, args: &[&str]| localizer.translate(key, locale, args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> Value {
        json!({
            "i18n": {
                "locales": ["en", "es"],
                "default_locale": "en",
                "directory": "locales",
                "phrases": {"HELLO": "Hello"}
            }
        })
    }

    fn write_catalogs(root: &Path) {
        let dir = root.join("locales");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("en.json"), r#"{"Hello": "Hello", "Welcome %s": "Welcome %s"}"#).unwrap();
        fs::write(dir.join("es.json"), r#"{"Hello": "Hola", "Welcome %s": "Bienvenido %s"}"#).unwrap();
    }

    #[test]
    fn test_i18n_config_resolves_directory() {
        let root = TempDir::new().unwrap();
        let config = i18n_config(&tree(), root.path()).unwrap();
        assert_eq!(config.directory, root.path().join("locales"));
        assert_eq!(config.phrases["HELLO"], "Hello");
    }

    #[test]
    fn test_translate_filter() {
        let root = TempDir::new().unwrap();
        write_catalogs(root.path());

        let t = translate_filter(build_localizer(&tree(), root.path()).unwrap());

        assert_eq!(t("Hello", "es", &[]), "Hola");
        assert_eq!(t("Hello", "fr", &[]), "Hello");
        assert_eq!(t("Welcome %s", "es", &["Ana"]), "Bienvenido Ana");
        assert_eq!(t("HELLO", "es", &[]), "Hello");
    }

    #[test]
    fn test_missing_catalog_is_fatal() {
        let root = TempDir::new().unwrap();
        let err = build_localizer(&tree(), root.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Localization(_)));
    }
}
