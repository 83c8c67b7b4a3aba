//! Object storage for offloaded message images.
//!
//! Objects are addressed by key; keys produced by [`crate::Base64ToStorage`]
//! are content hashes, so storing the same key twice is a no-op.
//!
//! Implementations:
//! - [`FsObjectStore`]: bucket directory on local disk, served by a CDN/static host
//! - [`MemoryObjectStore`]: in-process store with failure injection for tests

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use thiserror::Error;
use tracing::debug;

/// Errors from object store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("upload rejected: {0}")]
    Rejected(String),
}

/// Upload-and-get-URL interface over a bucket
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `key` and return its public URL
    fn upload(&self, key: &str, content_type: &str, body: &[u8]) -> Result<String, StoreError>;

    /// Bucket name, for logging
    fn bucket(&self) -> &str;
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|part| part.is_empty() || part == "..")
    {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}

/// Bucket directory on local disk.
///
/// Layout: `<root>/<bucket>/<key>`. Writes go to `<root>/<bucket>/.tmp`
/// first and are renamed into place.
#[derive(Debug)]
pub struct FsObjectStore {
    bucket: String,
    bucket_dir: PathBuf,
    public_base_url: String,
}

impl FsObjectStore {
    /// Open (and create if needed) a bucket directory
    pub fn new(
        root: impl AsRef<Path>,
        bucket: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let bucket = bucket.into();
        validate_key(&bucket)?;
        let bucket_dir = root.as_ref().join(&bucket);
        fs::create_dir_all(&bucket_dir)?;

        Ok(Self {
            bucket,
            bucket_dir,
            public_base_url: public_base_url.into(),
        })
    }

    /// Path of a stored object
    pub fn object_path(&self, key: &str) -> PathBuf {
        self.bucket_dir.join(key)
    }

    fn temp_dir(&self) -> PathBuf {
        self.bucket_dir.join(".tmp")
    }
}

impl ObjectStore for FsObjectStore {
    fn upload(&self, key: &str, content_type: &str, body: &[u8]) -> Result<String, StoreError> {
        validate_key(key)?;
        let url = join_url(&self.public_base_url, key);

        let final_path = self.object_path(key);
        if final_path.exists() {
            debug!(bucket = %self.bucket, key, "object already stored");
            return Ok(url);
        }

        let temp_dir = self.temp_dir();
        fs::create_dir_all(&temp_dir)?;
        let temp_path = temp_dir.join(format!(".tmp.{}.{}", std::process::id(), uuid::Uuid::new_v4()));

        if let Err(e) = fs::write(&temp_path, body) {
            let _ = fs::remove_file(&temp_path);
            return Err(StoreError::Io(e));
        }

        if let Some(parent) = final_path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                let _ = fs::remove_file(&temp_path);
                return Err(StoreError::Io(e));
            }
        }

        if let Err(e) = fs::rename(&temp_path, &final_path) {
            let _ = fs::remove_file(&temp_path);
            // A concurrent writer stored the same content first
            if final_path.exists() {
                return Ok(url);
            }
            return Err(StoreError::Io(e));
        }

        debug!(bucket = %self.bucket, key, content_type, bytes = body.len(), "stored object");
        Ok(url)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// A stored object in [`MemoryObjectStore`]
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub content_type: String,
    pub body: Vec<u8>,
}

/// In-process object store
#[derive(Debug)]
pub struct MemoryObjectStore {
    bucket: String,
    public_base_url: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    failure: Mutex<Option<String>>,
    attempts: Mutex<u32>,
}

impl MemoryObjectStore {
    pub fn new(bucket: impl Into<String>, public_base_url: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            public_base_url: public_base_url.into(),
            objects: RwLock::new(BTreeMap::new()),
            failure: Mutex::new(None),
            attempts: Mutex::new(0),
        }
    }

    /// Make every following upload fail with `reason`
    pub fn fail_with(&self, reason: impl Into<String>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(reason.into());
        }
    }

    /// Clear an injected failure
    pub fn recover(&self) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = None;
        }
    }

    /// Number of upload calls, failed ones included
    pub fn attempts(&self) -> u32 {
        self.attempts.lock().map(|a| *a).unwrap_or(0)
    }

    /// Stored object by key
    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().ok()?.get(key).cloned()
    }

    /// Stored keys in order
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn upload(&self, key: &str, content_type: &str, body: &[u8]) -> Result<String, StoreError> {
        validate_key(key)?;
        if let Ok(mut attempts) = self.attempts.lock() {
            *attempts += 1;
        }

        if let Some(reason) = self.failure.lock().ok().and_then(|f| f.clone()) {
            return Err(StoreError::Rejected(reason));
        }

        let mut objects = self
            .objects
            .write()
            .map_err(|_| StoreError::Rejected("store lock poisoned".to_string()))?;
        objects.insert(
            key.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                body: body.to_vec(),
            },
        );

        Ok(join_url(&self.public_base_url, key))
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
