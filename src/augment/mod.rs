//! Side-effecting augmentation (stage 4)
//!
//! Builds the localizer and the mail transport from the frozen tree and
//! attaches them to the reserved slots. Nothing else in the tree changes.

mod i18n;
mod mail;

use std::path::Path;
use std::sync::Arc;

use lad_i18n::Localizer;
use serde_json::Value;

use crate::config::{ConfigResult, Handle, Handles, TRANSLATE_SLOT, TRANSPORT_SLOT};

pub use i18n::{build_localizer, i18n_config, translate_filter};
pub use mail::{build_delivery, build_object_store, build_transport, MailOverrides, PREVIEW_SERVICE};

/// Handles produced by augmentation
#[derive(Debug)]
pub struct Augmented {
    pub handles: Handles,
    pub localizer: Arc<Localizer>,
}

/// Construct collaborators and attach them to their slots
pub fn augment(tree: &Value, root: &Path, overrides: &MailOverrides) -> ConfigResult<Augmented> {
    let localizer = build_localizer(tree, root)?;
    let transport = build_transport(tree, root, overrides)?;

    let mut handles = Handles::default();
    handles.attach(tree, TRANSLATE_SLOT, Handle::Translate(translate_filter(localizer.clone())))?;
    handles.attach(tree, TRANSPORT_SLOT, Handle::Transport(Arc::new(transport)))?;

    Ok(Augmented { handles, localizer })
}
