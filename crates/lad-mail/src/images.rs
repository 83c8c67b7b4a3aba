//! Inline base64 image offloading
//!
//! Rewrites `data:image/...;base64,...` URIs in a message body to public
//! URLs of the same bytes in object storage. Objects are keyed by the
//! SHA-256 of the decoded payload, so repeated images upload once and a
//! rewritten body contains no data URIs, which makes a second pass a no-op.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use base64::Engine;
use regex_lite::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::store::ObjectStore;
use crate::transport::Transform;
use crate::MailResult;

fn data_uri() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Payloads may be wrapped across lines, MIME style
        Regex::new(
            r"data:(image/[A-Za-z0-9.+-]+);base64,([A-Za-z0-9+/]+(?:\r?\n[ \t]*[A-Za-z0-9+/]+)*(?:(?:\r?\n[ \t]*)?={1,2})?)",
        )
        .expect("data uri pattern is valid")
    })
}

/// File extension for an image content type
pub fn extension_for(content_type: &str) -> String {
    match content_type.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg".to_string(),
        "image/svg+xml" => "svg".to_string(),
        "image/x-icon" | "image/vnd.microsoft.icon" => "ico".to_string(),
        other => other
            .trim_start_matches("image/")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect(),
    }
}

/// Compile-stage transform that moves inline images to object storage
pub struct Base64ToStorage {
    store: Arc<dyn ObjectStore>,
    cdn_domain: Option<String>,
    key_prefix: String,
}

impl Base64ToStorage {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            cdn_domain: None,
            key_prefix: String::new(),
        }
    }

    /// Serve uploaded objects from `https://<domain>/<key>` instead of the
    /// store's own URL
    pub fn with_cdn_domain(mut self, domain: impl Into<String>) -> Self {
        let domain = domain.into();
        self.cdn_domain = (!domain.trim().is_empty()).then_some(domain);
        self
    }

    /// Prefix for object keys, e.g. `"email/"`
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn upload(&self, content_type: &str, bytes: &[u8]) -> MailResult<String> {
        let digest = hex::encode(Sha256::digest(bytes));
        let key = format!("{}{}.{}", self.key_prefix, digest, extension_for(content_type));

        let stored_url = self.store.upload(&key, content_type, bytes)?;
        debug!(bucket = self.store.bucket(), key = %key, bytes = bytes.len(), "offloaded inline image");

        Ok(match &self.cdn_domain {
            Some(domain) => format!("https://{}/{}", domain.trim_end_matches('/'), key),
            None => stored_url,
        })
    }
}

impl Transform for Base64ToStorage {
    fn name(&self) -> &'static str {
        "base64-to-storage"
    }

    fn apply(&self, body: &str) -> MailResult<String> {
        if !body.contains("data:image/") {
            return Ok(body.to_string());
        }

        let engine = base64::engine::general_purpose::STANDARD;
        let mut uploaded: HashMap<String, String> = HashMap::new();
        let mut output = String::with_capacity(body.len());
        let mut last = 0;

        for caps in data_uri().captures_iter(body) {
            let (Some(whole), Some(content_type), Some(payload)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };

            let compact: String = payload
                .as_str()
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect();

            let url = match uploaded.get(&compact) {
                Some(url) => url.clone(),
                None => {
                    let bytes = match engine.decode(&compact) {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            warn!(error = %e, "leaving undecodable inline image in place");
                            continue;
                        }
                    };
                    let url = self.upload(content_type.as_str(), &bytes)?;
                    uploaded.insert(compact, url.clone());
                    url
                }
            };

            output.push_str(&body[last..whole.start()]);
            output.push_str(&url);
            last = whole.end();
        }

        output.push_str(&body[last..]);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectStore;
    use crate::MailError;

    // 1x1 transparent PNG
    const PIXEL: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    fn html_with_pixel() -> String {
        format!(r#"<p>Hi</p><img src="data:image/png;base64,{PIXEL}" alt="logo">"#)
    }

    #[test]
    fn test_rewrites_inline_png() {
        let store = Arc::new(MemoryObjectStore::new("images", "https://bucket.example.com"));
        let transform = Base64ToStorage::new(store.clone());

        let out = transform.apply(&html_with_pixel()).unwrap();

        assert!(!out.contains("base64,"));
        assert_eq!(out.matches("https://bucket.example.com/").count(), 1);
        assert_eq!(store.keys().len(), 1);
        assert!(store.keys()[0].ends_with(".png"));
    }

    #[test]
    fn test_second_pass_is_noop() {
        let store = Arc::new(MemoryObjectStore::new("images", "https://bucket.example.com"));
        let transform = Base64ToStorage::new(store.clone());

        let once = transform.apply(&html_with_pixel()).unwrap();
        let twice = transform.apply(&once).unwrap();

        assert_eq!(once, twice);
        assert_eq!(store.attempts(), 1);
    }

    #[test]
    fn test_duplicate_payload_uploads_once() {
        let store = Arc::new(MemoryObjectStore::new("images", "https://bucket.example.com"));
        let transform = Base64ToStorage::new(store.clone());
        let body = format!("{}{}", html_with_pixel(), html_with_pixel());

        let out = transform.apply(&body).unwrap();

        assert_eq!(store.attempts(), 1);
        assert_eq!(out.matches("https://bucket.example.com/").count(), 2);
    }

    #[test]
    fn test_wrapped_payload_uploaded_whole() {
        let store = Arc::new(MemoryObjectStore::new("images", "https://bucket.example.com"));
        let transform = Base64ToStorage::new(store.clone());
        let wrapped = format!("{}\n{}", &PIXEL[..76], &PIXEL[76..]);
        let body = format!(r#"<img src="data:image/png;base64,{wrapped}" alt="logo">"#);

        let out = transform.apply(&body).unwrap();

        assert!(!out.contains(&PIXEL[76..]), "{out}");
        assert_eq!(out.matches("https://bucket.example.com/").count(), 1);
        assert!(out.ends_with(r#".png" alt="logo">"#), "{out}");
        let keys = store.keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(store.get(&keys[0]).unwrap().body.len(), 68);
    }

    #[test]
    fn test_wrapped_and_flat_payloads_share_upload() {
        let store = Arc::new(MemoryObjectStore::new("images", "https://bucket.example.com"));
        let transform = Base64ToStorage::new(store.clone());
        let wrapped = format!("{}\r\n  {}", &PIXEL[..40], &PIXEL[40..]);
        let body = format!(
            r#"<img src="data:image/png;base64,{wrapped}">{}"#,
            html_with_pixel()
        );

        let out = transform.apply(&body).unwrap();

        assert!(!out.contains("base64,"));
        assert_eq!(store.attempts(), 1);
    }

    #[test]
    fn test_cdn_domain_and_prefix() {
        let store = Arc::new(MemoryObjectStore::new("images", "https://bucket.example.com"));
        let transform = Base64ToStorage::new(store.clone())
            .with_cdn_domain("cdn.example.com")
            .with_key_prefix("email/");

        let out = transform.apply(&html_with_pixel()).unwrap();

        assert!(out.contains(r#"src="https://cdn.example.com/email/"#));
        assert!(store.keys()[0].starts_with("email/"));
    }

    #[test]
    fn test_upload_failure_propagates() {
        let store = Arc::new(MemoryObjectStore::new("images", "https://bucket.example.com"));
        store.fail_with("access denied");
        let transform = Base64ToStorage::new(store);

        let err = transform.apply(&html_with_pixel()).unwrap_err();
        assert!(matches!(err, MailError::Upload(_)));
    }

    #[test]
    fn test_external_urls_untouched() {
        let store = Arc::new(MemoryObjectStore::new("images", "https://bucket.example.com"));
        let transform = Base64ToStorage::new(store.clone());
        let body = r#"<img src="https://cdn.example.com/logo.png">"#;

        assert_eq!(transform.apply(body).unwrap(), body);
        assert_eq!(store.attempts(), 0);
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("image/svg+xml"), "svg");
    }
}
