//! Mail transport augmentation
//!
//! Transform order is fixed: CSS inlining, then base64 image offloading.
//! Offloading must see the final markup, so it always runs last.

use std::path::Path;
use std::sync::Arc;

use lad_mail::{
    delivery_for, Base64ToStorage, Credentials, CssInliner, Delivery, FsObjectStore,
    MailTransport, MemoryObjectStore, MessageDefaults, ObjectStore,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::path::{lookup, optional_str, require_bool, require_str};
use crate::config::{ConfigError, ConfigResult};

/// Service used when `email.send` is false
pub const PREVIEW_SERVICE: &str = "log";

/// Collaborators supplied by the caller instead of built from the tree
#[derive(Clone, Default)]
pub struct MailOverrides {
    pub delivery: Option<Arc<dyn Delivery>>,
    pub object_store: Option<Arc<dyn ObjectStore>>,
}

/// Object store named by `email.images.store`
pub fn build_object_store(tree: &Value, root: &Path) -> ConfigResult<Arc<dyn ObjectStore>> {
    let invalid = ConfigError::ValidationError;
    let kind = require_str(tree, "email.images.store").map_err(invalid)?;
    let bucket = require_str(tree, "email.images.bucket").map_err(invalid)?;
    let public_url = require_str(tree, "email.images.public_url").map_err(invalid)?;

    match kind {
        "fs" => {
            let directory = require_str(tree, "email.images.directory").map_err(invalid)?;
            let store = FsObjectStore::new(root.join(directory), bucket, public_url)?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(MemoryObjectStore::new(bucket, public_url))),
        other => Err(ConfigError::ValidationError(format!(
            "unknown image store '{other}'"
        ))),
    }
}

/// Delivery for `email.service`, or the log delivery in preview mode
pub fn build_delivery(tree: &Value) -> ConfigResult<Arc<dyn Delivery>> {
    let invalid = ConfigError::ValidationError;
    let send = require_bool(tree, "email.send").map_err(invalid)?;
    let configured = require_str(tree, "email.service").map_err(invalid)?;

    let service = if send {
        configured
    } else {
        if configured != PREVIEW_SERVICE {
            info!(service = configured, "email.send is false, messages go to the log delivery");
        }
        PREVIEW_SERVICE
    };

    let credentials = Credentials {
        token: optional_str(tree, "email.auth.token").map(str::to_string),
        endpoint: optional_str(tree, "email.auth.endpoint").map(str::to_string),
        timeout_seconds: lookup(tree, "email.timeout_seconds").and_then(Value::as_u64),
    };
    if send && credentials.token.is_none() && service != PREVIEW_SERVICE {
        warn!(service, "email.send is true but no service token is configured");
    }

    Ok(Arc::from(delivery_for(service, &credentials)?))
}

/// Build the transport and its transform chain
pub fn build_transport(
    tree: &Value,
    root: &Path,
    overrides: &MailOverrides,
) -> ConfigResult<MailTransport> {
    let invalid = ConfigError::ValidationError;

    let delivery = match &overrides.delivery {
        Some(delivery) => delivery.clone(),
        None => build_delivery(tree)?,
    };
    let store = match &overrides.object_store {
        Some(store) => store.clone(),
        None => build_object_store(tree, root)?,
    };

    let inliner = CssInliner::new(root.join(require_str(tree, "email.juice.root").map_err(invalid)?))
        .preserve_important(require_bool(tree, "email.juice.preserve_important").map_err(invalid)?);

    let mut offload = Base64ToStorage::new(store);
    if let Some(prefix) = optional_str(tree, "email.images.key_prefix") {
        offload = offload.with_key_prefix(prefix);
    }
    if let Some(domain) = optional_str(tree, "email.images.cdn_domain") {
        offload = offload.with_cdn_domain(domain);
    }

    let defaults = MessageDefaults {
        from: optional_str(tree, "email.from").map(str::to_string),
        subject_prefix: optional_str(tree, "email.subject_prefix")
            .unwrap_or_default()
            .to_string(),
    };

    let transport = MailTransport::builder(delivery)
        .transform(inliner)
        .transform(offload)
        .defaults(defaults)
        .build();

    info!(
        service = transport.service(),
        transforms = %transport.transform_names().join(" -> "),
        "mail transport ready"
    );
    Ok(transport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lad_mail::MailError;
    use serde_json::json;
    use tempfile::TempDir;

    fn tree(send: bool, service: &str, store: &str) -> Value {
        json!({
            "email": {
                "send": send,
                "from": "Lad <noreply@example.com>",
                "subject_prefix": "[Lad] ",
                "service": service,
                "auth": {"token": null},
                "juice": {"root": "build", "preserve_important": true},
                "images": {
                    "store": store,
                    "directory": "uploads",
                    "bucket": "lad",
                    "public_url": "http://localhost:3000/uploads",
                    "cdn_domain": null,
                    "key_prefix": "email/"
                }
            }
        })
    }

    #[test]
    fn test_preview_mode_uses_log_delivery() {
        let delivery = build_delivery(&tree(false, "postmark", "memory")).unwrap();
        assert_eq!(delivery.service(), "log");
    }

    #[test]
    fn test_postmark_without_token_fails() {
        let err = build_delivery(&tree(true, "postmark", "memory")).unwrap_err();
        assert!(matches!(err, ConfigError::Transport(MailError::MissingCredentials(_))));
    }

    #[test]
    fn test_postmark_with_token() {
        let mut t = tree(true, "postmark", "memory");
        t["email"]["auth"]["token"] = json!("server-token");
        assert_eq!(build_delivery(&t).unwrap().service(), "postmark");
    }

    #[test]
    fn test_unknown_service_fails() {
        let err = build_delivery(&tree(true, "pigeon", "memory")).unwrap_err();
        assert!(matches!(err, ConfigError::Transport(MailError::UnknownService(_))));
    }

    #[test]
    fn test_fs_store_created_under_root() {
        let root = TempDir::new().unwrap();
        let store = build_object_store(&tree(false, "log", "fs"), root.path()).unwrap();
        assert_eq!(store.bucket(), "lad");
        assert!(root.path().join("uploads").join("lad").is_dir());
    }

    #[test]
    fn test_transport_chain_order() {
        let root = TempDir::new().unwrap();
        let transport =
            build_transport(&tree(false, "log", "memory"), root.path(), &MailOverrides::default())
                .unwrap();

        assert_eq!(transport.transform_names(), vec!["css-inliner", "base64-to-storage"]);
        assert_eq!(transport.defaults().subject_prefix, "[Lad] ");
        assert_eq!(transport.service(), "log");
    }
}
