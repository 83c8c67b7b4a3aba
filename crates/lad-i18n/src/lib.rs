//! Lad localization
//!
//! Loads one JSON phrase catalog per supported locale and exposes
//! [`Localizer::translate`], the lookup behind the `t` template filter.
//!
//! Lookup order for `translate(key, locale, args)`:
//! 1. catalog of the requested locale (or its base language, `es-MX` -> `es`)
//! 2. catalog of the default locale
//! 3. built-in phrases from configuration
//! 4. the key itself

pub mod catalog;
pub mod format;

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, trace};

pub use catalog::Catalog;
pub use format::format_phrase;

/// Localization errors. All of them are raised at construction time.
#[derive(Debug, Error)]
pub enum I18nError {
    #[error("no locales configured")]
    NoLocales,

    #[error("default locale '{0}' is not in the supported locale list")]
    UnknownDefaultLocale(String),

    #[error("cannot read phrase catalog {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid phrase catalog {path}: {reason}")]
    Invalid { path: String, reason: String },
}

/// Result type for localization operations
pub type I18nResult<T> = Result<T, I18nError>;

/// Localizer construction input
#[derive(Debug, Clone)]
pub struct I18nConfig {
    /// Supported locales, e.g. `["en", "es", "zh"]`
    pub locales: Vec<String>,

    /// Locale used when the requested one is unsupported or lacks a key
    pub default_locale: String,

    /// Directory holding `<locale>.json` catalogs
    pub directory: PathBuf,

    /// Built-in phrases, keyed by phrase id
    pub phrases: BTreeMap<String, String>,
}

/// Phrase lookup over the loaded catalogs.
///
/// Immutable after construction and safe to share between threads.
#[derive(Debug)]
pub struct Localizer {
    default_locale: String,
    locales: Vec<String>,
    catalogs: HashMap<String, Catalog>,
    phrases: BTreeMap<String, String>,
}

impl Localizer {
    /// Load every catalog named by `config.locales`.
    ///
    /// A missing or malformed catalog is an error; nothing is loaded lazily.
    pub fn new(config: I18nConfig) -> I18nResult<Self> {
        if config.locales.is_empty() {
            return Err(I18nError::NoLocales);
        }
        if !config.locales.contains(&config.default_locale) {
            return Err(I18nError::UnknownDefaultLocale(config.default_locale));
        }

        let mut catalogs = HashMap::with_capacity(config.locales.len());
        for locale in &config.locales {
            let path = config.directory.join(format!("{locale}.json"));
            let catalog = Catalog::load(&path)?;
            debug!(locale = %locale, phrases = catalog.len(), path = %path.display(), "loaded phrase catalog");
            catalogs.insert(locale.clone(), catalog);
        }

        Ok(Self {
            default_locale: config.default_locale,
            locales: config.locales,
            catalogs,
            phrases: config.phrases,
        })
    }

    /// Translate `key` for `locale`, substituting positional `args`.
    ///
    /// Never fails: unknown locales fall back to the default locale and
    /// unknown keys render as themselves.
    pub fn translate(&self, key: &str, locale: &str, args: &[&str]) -> String {
        let locale = self.resolve_locale(locale);

        let phrase = self
            .catalogs
            .get(locale)
            .and_then(|c| c.get(key))
            .or_else(|| {
                trace!(key, locale, "phrase missing, trying default locale");
                self.catalogs
                    .get(&self.default_locale)
                    .and_then(|c| c.get(key))
            })
            .or_else(|| self.phrases.get(key).map(String::as_str))
            .unwrap_or(key);

        format_phrase(phrase, args)
    }

    /// Map a requested locale onto a supported one.
    ///
    /// Exact matches win, then the language part of a region tag
    /// (`es-MX`, `es_MX`), then the default locale.
    pub fn resolve_locale<'a>(&'a self, locale: &str) -> &'a str {
        if let Some(found) = self.locales.iter().find(|l| l.as_str() == locale) {
            return found;
        }
        let language = locale.split(['-', '_']).next().unwrap_or(locale);
        if let Some(found) = self
            .locales
            .iter()
            .find(|l| l.eq_ignore_ascii_case(language))
        {
            return found;
        }
        &self.default_locale
    }

    /// Default locale
    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// Supported locales in configuration order
    pub fn locales(&self) -> &[String] {
        &self.locales
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn catalog_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("en.json"),
            r#"{"Hello": "Hello", "Welcome %s": "Welcome %s", "Only English": "Only English"}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("es.json"),
            r#"{"Hello": "Hola", "Welcome %s": "Bienvenido %s"}"#,
        )
        .unwrap();
        dir
    }

    fn localizer(dir: &TempDir) -> Localizer {
        Localizer::new(I18nConfig {
            locales: vec!["en".into(), "es".into()],
            default_locale: "en".into(),
            directory: dir.path().to_path_buf(),
            phrases: BTreeMap::from([("TAGLINE".to_string(), "Build fast".to_string())]),
        })
        .unwrap()
    }

    #[test]
    fn test_translates_spanish() {
        let dir = catalog_dir();
        let i18n = localizer(&dir);
        assert_eq!(i18n.translate("Hello", "es", &[]), "Hola");
    }

    #[test]
    fn test_unsupported_locale_falls_back_to_default() {
        let dir = catalog_dir();
        let i18n = localizer(&dir);
        assert_eq!(i18n.translate("Hello", "fr", &[]), "Hello");
    }

    #[test]
    fn test_missing_key_in_locale_uses_default_catalog() {
        let dir = catalog_dir();
        let i18n = localizer(&dir);
        assert_eq!(i18n.translate("Only English", "es", &[]), "Only English");
    }

    #[test]
    fn test_builtin_phrases_then_key() {
        let dir = catalog_dir();
        let i18n = localizer(&dir);
        assert_eq!(i18n.translate("TAGLINE", "es", &[]), "Build fast");
        assert_eq!(i18n.translate("Not translated", "es", &[]), "Not translated");
    }

    #[test]
    fn test_args_substituted() {
        let dir = catalog_dir();
        let i18n = localizer(&dir);
        assert_eq!(i18n.translate("Welcome %s", "es", &["Ana"]), "Bienvenido Ana");
    }

    #[test]
    fn test_region_tag_resolves_to_language() {
        let dir = catalog_dir();
        let i18n = localizer(&dir);
        assert_eq!(i18n.resolve_locale("es-MX"), "es");
        assert_eq!(i18n.resolve_locale("pt-BR"), "en");
    }

    #[test]
    fn test_missing_catalog_is_fatal() {
        let dir = catalog_dir();
        let result = Localizer::new(I18nConfig {
            locales: vec!["en".into(), "zh".into()],
            default_locale: "en".into(),
            directory: dir.path().to_path_buf(),
            phrases: BTreeMap::new(),
        });
        assert!(matches!(result, Err(I18nError::Read { .. })));
    }

    #[test]
    fn test_default_locale_must_be_supported() {
        let dir = catalog_dir();
        let result = Localizer::new(I18nConfig {
            locales: vec!["es".into()],
            default_locale: "en".into(),
            directory: dir.path().to_path_buf(),
            phrases: BTreeMap::new(),
        });
        assert!(matches!(result, Err(I18nError::UnknownDefaultLocale(_))));
    }
}
