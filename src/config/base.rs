//! Base definition (stage 1)
//!
//! Literal defaults plus values sourced from the environment map. The
//! resulting tree also reserves the slots that augmentation fills with
//! live handles (`null` at [`TRANSLATE_SLOT`] and [`TRANSPORT_SLOT`]).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::env::EnvironmentMap;
use super::error::ConfigResult;
use super::slots::{TRANSLATE_SLOT, TRANSPORT_SLOT};

/// Providers whose flags feed `auth.has_third_party_providers`
pub const THIRD_PARTY_PROVIDERS: &[&str] = &["google", "github"];

/// Built-in phrases, used when no catalog has the key
pub const PHRASES: &[(&str, &str)] = &[
    ("HELLO", "Hello"),
    ("TAGLINE", "Web application boilerplate"),
    ("INVALID_EMAIL", "Email address was invalid."),
    ("INVALID_PASSWORD", "Password was invalid."),
    ("LOGGED_IN", "You have successfully logged in."),
    ("LOGGED_OUT", "You have successfully logged out."),
    ("PAGE_NOT_FOUND", "Page not found"),
    ("SERVER_ERROR", "An unexpected error occurred"),
];

/// Environment-sourced base values
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BaseDefinition {
    /// Application name (`APP_NAME`, required)
    pub app_name: String,

    /// Public web URL (`WEB_URL`, required)
    pub web_url: String,

    /// API URL (`API_URL`, default: web URL)
    pub api_url: String,

    /// Listen port (`WEB_PORT`, default: 3000)
    pub web_port: u64,

    /// Log level (`LAD_LOG_LEVEL`, default: "info")
    pub log_level: String,

    /// Default sender (`EMAIL_DEFAULT_FROM`, required)
    pub email_from: String,

    /// Deliver through the real service (`SEND_EMAIL`, default: false)
    pub send_email: bool,

    /// Delivery service name (`EMAIL_SERVICE`, default: "postmark")
    pub email_service: String,

    /// Service token (`POSTMARK_API_TOKEN`)
    pub email_token: Option<String>,

    /// Stylesheet root for CSS inlining (`EMAIL_JUICE_ROOT`, default: "build")
    pub juice_root: String,

    /// Object store kind for offloaded images (`EMAIL_IMAGES_STORE`, default: "fs")
    pub images_store: String,

    /// Local bucket root for the fs store (`EMAIL_IMAGES_DIR`, default: "build/uploads")
    pub images_directory: String,

    /// Bucket name (`AWS_S3_BUCKET`, default: "lad-email-images")
    pub images_bucket: String,

    /// Public URL of the bucket (`EMAIL_IMAGES_URL`, default: `<web_url>/uploads`)
    pub images_public_url: String,

    /// CDN domain in front of the bucket (`AWS_CLOUDFRONT_DOMAIN`)
    pub cdn_domain: Option<String>,

    /// Supported locales (`SUPPORTED_LOCALES`, default: "en,es,zh")
    pub locales: Vec<String>,

    /// Default locale (`DEFAULT_LOCALE`, default: "en")
    pub default_locale: String,

    /// Catalog directory (`LOCALES_DIR`, default: "locales")
    pub locales_directory: String,

    /// Google sign-in (`AUTH_GOOGLE_ENABLED`, default: false)
    pub google_enabled: bool,

    /// GitHub sign-in (`AUTH_GITHUB_ENABLED`, default: false)
    pub github_enabled: bool,
}

impl BaseDefinition {
    /// Resolve every base value from the environment map.
    ///
    /// Fails on the first missing required variable or mistyped value.
    pub fn from_env(env: &EnvironmentMap) -> ConfigResult<Self> {
        let web_url = env.require_str("WEB_URL")?.trim_end_matches('/').to_string();

        Ok(Self {
            app_name: env.require_str("APP_NAME")?,
            api_url: env.str_or("API_URL", &web_url),
            web_port: env.u64_or("WEB_PORT", 3000)?,
            log_level: env.str_or("LAD_LOG_LEVEL", "info"),
            email_from: env.require_str("EMAIL_DEFAULT_FROM")?,
            send_email: env.bool_or("SEND_EMAIL", false)?,
            email_service: env.str_or("EMAIL_SERVICE", "postmark"),
            email_token: env.optional_str("POSTMARK_API_TOKEN"),
            juice_root: env.str_or("EMAIL_JUICE_ROOT", "build"),
            images_store: env.str_or("EMAIL_IMAGES_STORE", "fs"),
            images_directory: env.str_or("EMAIL_IMAGES_DIR", "build/uploads"),
            images_bucket: env.str_or("AWS_S3_BUCKET", "lad-email-images"),
            images_public_url: env.str_or("EMAIL_IMAGES_URL", &format!("{web_url}/uploads")),
            cdn_domain: env.optional_str("AWS_CLOUDFRONT_DOMAIN"),
            locales: env.list_or("SUPPORTED_LOCALES", &["en", "es", "zh"]),
            default_locale: env.str_or("DEFAULT_LOCALE", "en"),
            locales_directory: env.str_or("LOCALES_DIR", "locales"),
            google_enabled: env.bool_or("AUTH_GOOGLE_ENABLED", false)?,
            github_enabled: env.bool_or("AUTH_GITHUB_ENABLED", false)?,
            web_url,
        })
    }

    /// Convert to the base configuration tree
    pub fn to_value(&self, environment: &str) -> ConfigResult<Value> {
        let phrases: serde_json::Map<String, Value> = PHRASES
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();

        let mut tree = json!({
            "app_name": self.app_name,
            "env": environment,
            "port": self.web_port,
            "urls": {
                "web": self.web_url,
                "api": self.api_url
            },
            "logger": {
                "level": self.log_level
            },
            "email": {
                "send": self.send_email,
                "from": self.email_from,
                "subject_prefix": "",
                "service": self.email_service,
                "auth": {
                    "token": self.email_token
                },
                "juice": {
                    "root": self.juice_root,
                    "preserve_important": true
                },
                "images": {
                    "store": self.images_store,
                    "directory": self.images_directory,
                    "bucket": self.images_bucket,
                    "public_url": self.images_public_url,
                    "cdn_domain": self.cdn_domain,
                    "key_prefix": "email/"
                }
            },
            "i18n": {
                "default_locale": self.default_locale,
                "locales": self.locales,
                "directory": self.locales_directory,
                "phrases": phrases
            },
            "auth": {
                "providers": {
                    "google": self.google_enabled,
                    "github": self.github_enabled
                }
            },
            "meta": {
                "vars": {
                    "app": self.app_name,
                    "url": self.web_url
                },
                "templates": {
                    "home": {
                        "title": "{app} — Home",
                        "description": "{app} is a web application boilerplate."
                    },
                    "about": {
                        "title": "About — {app}",
                        "description": "Learn more about {app}."
                    },
                    "privacy": {
                        "title": "Privacy Policy — {app}",
                        "description": "How {app} handles your data."
                    },
                    "404": {
                        "title": "Page Not Found — {app}",
                        "description": "The page you requested does not exist."
                    },
                    "500": {
                        "title": "Server Error — {app}",
                        "description": "An unexpected error occurred."
                    }
                },
                "default": {
                    "title": "{app}",
                    "description": "{app} — {url}"
                }
            },
            "views": {
                "root": "app/views",
                "extension": "pug",
                "cache": false,
                "locals": {
                    "filters": {}
                }
            }
        });

        // Reserved slots for live handles
        for slot in [TRANSLATE_SLOT, TRANSPORT_SLOT] {
            super::slots::reserve(&mut tree, slot)?;
        }

        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::error::ConfigError;

    fn env() -> EnvironmentMap {
        EnvironmentMap::from_strings([
            ("APP_NAME", "Lad"),
            ("WEB_URL", "http://localhost:3000/"),
            ("EMAIL_DEFAULT_FROM", "Lad <noreply@example.com>"),
        ])
    }

    #[test]
    fn test_defaults() {
        let base = BaseDefinition::from_env(&env()).unwrap();
        assert_eq!(base.app_name, "Lad");
        assert_eq!(base.web_url, "http://localhost:3000");
        assert_eq!(base.api_url, "http://localhost:3000");
        assert_eq!(base.web_port, 3000);
        assert_eq!(base.locales, vec!["en", "es", "zh"]);
        assert!(!base.send_email);
        assert_eq!(base.images_public_url, "http://localhost:3000/uploads");
    }

    #[test]
    fn test_missing_required_variable() {
        let env = EnvironmentMap::from_strings([("APP_NAME", "Lad"), ("WEB_URL", "http://x")]);
        let err = BaseDefinition::from_env(&env).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVariable(ref name) if name == "EMAIL_DEFAULT_FROM"));
    }

    #[test]
    fn test_to_value_reserves_slots() {
        let value = BaseDefinition::from_env(&env()).unwrap().to_value("test").unwrap();

        assert_eq!(value["env"], "test");
        assert_eq!(value["meta"]["templates"]["home"]["title"], "{app} — Home");
        assert!(value["email"]["transport"].is_null());
        assert!(value["views"]["locals"]["filters"]["t"].is_null());
        assert!(value["views"]["locals"]["filters"].as_object().unwrap().contains_key("t"));
    }

    #[test]
    fn test_env_values_flow_into_tree() {
        let env = env()
            .with("AUTH_GITHUB_ENABLED", true)
            .with("WEB_PORT", 8080u64)
            .with("POSTMARK_API_TOKEN", "tok");
        let value = BaseDefinition::from_env(&env).unwrap().to_value("production").unwrap();

        assert_eq!(value["auth"]["providers"]["github"], true);
        assert_eq!(value["auth"]["providers"]["google"], false);
        assert_eq!(value["port"], 8080);
        assert_eq!(value["email"]["auth"]["token"], "tok");
    }
}
