//! Reserved slots for collaborator handles
//!
//! The base definition reserves each slot as `null` at a fixed path. After
//! derivation the tree is frozen; attaching a handle to a reserved slot is
//! the only change augmentation may make.

use std::fmt;
use std::sync::Arc;

use lad_mail::MailTransport;
use serde_json::Value;

use super::error::{ConfigError, ConfigResult};
use super::path::{lookup, set_path};

/// Translate filter for templates: `t(key, locale, args)`
pub type TranslateFilter = Arc<dyn Fn(&str, &str, &[&str]) -> String + Send + Sync>;

/// Template filter slot for the translate function
pub const TRANSLATE_SLOT: &str = "views.locals.filters.t";

/// Mail transport slot
pub const TRANSPORT_SLOT: &str = "email.transport";

/// Every slot the base definition reserves
pub const RESERVED_SLOTS: &[&str] = &[TRANSLATE_SLOT, TRANSPORT_SLOT];

/// Mark `path` as a reserved slot in the tree
pub(crate) fn reserve(tree: &mut Value, path: &str) -> ConfigResult<()> {
    set_path(tree, path, Value::Null)
        .map_err(|reason| ConfigError::Slot(format!("cannot reserve '{path}': {reason}")))
}

/// A live collaborator handle
#[derive(Clone)]
pub enum Handle {
    Translate(TranslateFilter),
    Transport(Arc<MailTransport>),
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handle::Translate(_) => f.write_str("Handle::Translate(..)"),
            Handle::Transport(t) => f.debug_tuple("Handle::Transport").field(t).finish(),
        }
    }
}

/// Handles attached during augmentation
#[derive(Default, Clone)]
pub struct Handles {
    translate: Option<TranslateFilter>,
    transport: Option<Arc<MailTransport>>,
}

impl fmt::Debug for Handles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handles")
            .field("translate", &self.translate.is_some())
            .field("transport", &self.transport)
            .finish()
    }
}

impl Handles {
    /// Attach `handle` at `path`.
    ///
    /// The path must be a reserved slot that is still `null` in `tree`
    /// (an overlay assigning a value there is a configuration defect) and
    /// must not already hold a handle.
    pub fn attach(&mut self, tree: &Value, path: &str, handle: Handle) -> ConfigResult<()> {
        if !RESERVED_SLOTS.contains(&path) {
            return Err(ConfigError::Slot(format!("'{path}' is not a reserved slot")));
        }
        match lookup(tree, path) {
            Some(Value::Null) => {}
            Some(other) => {
                return Err(ConfigError::Slot(format!(
                    "reserved slot '{path}' was overwritten with {other}"
                )))
            }
            None => {
                return Err(ConfigError::Slot(format!(
                    "reserved slot '{path}' is missing from the configuration"
                )))
            }
        }

        match (path, handle) {
            (TRANSLATE_SLOT, Handle::Translate(filter)) if self.translate.is_none() => {
                self.translate = Some(filter);
                Ok(())
            }
            (TRANSPORT_SLOT, Handle::Transport(transport)) if self.transport.is_none() => {
                self.transport = Some(transport);
                Ok(())
            }
            (TRANSLATE_SLOT, Handle::Translate(_)) | (TRANSPORT_SLOT, Handle::Transport(_)) => Err(
                ConfigError::Slot(format!("slot '{path}' already has a handle")),
            ),
            (_, handle) => Err(ConfigError::Slot(format!(
                "slot '{path}' cannot hold {handle:?}"
            ))),
        }
    }

    /// Handle attached at `path`
    pub fn get(&self, path: &str) -> Option<Handle> {
        match path {
            TRANSLATE_SLOT => self.translate.clone().map(Handle::Translate),
            TRANSPORT_SLOT => self.transport.clone().map(Handle::Transport),
            _ => None,
        }
    }

    /// Split into typed handles; every reserved slot must be filled
    pub fn into_parts(self) -> ConfigResult<(TranslateFilter, Arc<MailTransport>)> {
        let translate = self.translate.ok_or_else(|| {
            ConfigError::Slot(format!("reserved slot '{TRANSLATE_SLOT}' was never attached"))
        })?;
        let transport = self.transport.ok_or_else(|| {
            ConfigError::Slot(format!("reserved slot '{TRANSPORT_SLOT}' was never attached"))
        })?;
        Ok((translate, transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lad_mail::LogDelivery;
    use serde_json::json;

    fn tree() -> Value {
        let mut tree = json!({"email": {}, "views": {"locals": {"filters": {}}}});
        for slot in RESERVED_SLOTS {
            reserve(&mut tree, slot).unwrap();
        }
        tree
    }

    fn translate() -> Handle {
        Handle::Translate(Arc::new(|key: &str, _: &str, _: &[&str]| key.to_string()))
    }

    fn transport() -> Handle {
        Handle::Transport(Arc::new(MailTransport::builder(Arc::new(LogDelivery::new())).build()))
    }

    #[test]
    fn test_reserve_under_scalar_fails() {
        let mut tree = json!({"email": true});
        let err = reserve(&mut tree, TRANSPORT_SLOT).unwrap_err();
        assert!(matches!(err, ConfigError::Slot(_)));
        assert!(err.to_string().contains(TRANSPORT_SLOT));
    }

    #[test]
    fn test_attach_reserved_slots() {
        let tree = tree();
        let mut handles = Handles::default();
        handles.attach(&tree, TRANSLATE_SLOT, translate()).unwrap();
        handles.attach(&tree, TRANSPORT_SLOT, transport()).unwrap();

        assert!(handles.get(TRANSPORT_SLOT).is_some());
        let (t, _) = handles.into_parts().unwrap();
        assert_eq!(t("Hello", "en", &[]), "Hello");
    }

    #[test]
    fn test_attach_rejects_unreserved_path() {
        let tree = tree();
        let err = Handles::default().attach(&tree, "email.from", transport()).unwrap_err();
        assert!(err.to_string().contains("not a reserved slot"));
    }

    #[test]
    fn test_attach_rejects_overwritten_slot() {
        let mut tree = tree();
        set_path(&mut tree, TRANSPORT_SLOT, json!("smtp://localhost")).unwrap();
        let err = Handles::default().attach(&tree, TRANSPORT_SLOT, transport()).unwrap_err();
        assert!(err.to_string().contains("overwritten"));
    }

    #[test]
    fn test_attach_twice_fails() {
        let tree = tree();
        let mut handles = Handles::default();
        handles.attach(&tree, TRANSPORT_SLOT, transport()).unwrap();
        assert!(handles.attach(&tree, TRANSPORT_SLOT, transport()).is_err());
    }

    #[test]
    fn test_attach_wrong_handle_kind() {
        let tree = tree();
        assert!(Handles::default().attach(&tree, TRANSPORT_SLOT, translate()).is_err());
    }

    #[test]
    fn test_unfilled_slot_detected() {
        let tree = tree();
        let mut handles = Handles::default();
        handles.attach(&tree, TRANSLATE_SLOT, translate()).unwrap();
        assert!(matches!(handles.into_parts(), Err(ConfigError::Slot(_))));
    }
}
