//! Object storage and record store seams.
//!
//! The pipeline never talks to a network directly. Hosts implement
//! [`ObjectStorage`] and [`RecordStore`] against their backend; the wasm
//! bindings drive the same steps from JavaScript instead.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Identifier the record store assigned to a new row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

pub trait ObjectStorage {
    fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), BackendError>;

    fn public_url(&self, bucket: &str, key: &str) -> String;

    fn remove(&self, bucket: &str, keys: &[String]) -> Result<(), BackendError>;
}

pub trait RecordStore {
    fn insert(&self, record: &NewRecord) -> Result<RecordId, BackendError>;
}

/// A row to insert once every image is uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "table", rename_all = "lowercase")]
pub enum NewRecord {
    #[serde(rename = "posts")]
    Post {
        user_id: String,
        caption: String,
        #[serde(rename = "image_path", serialize_with = "serialize_paths")]
        image_paths: Vec<String>,
    },
    #[serde(rename = "stories")]
    Story {
        user_id: String,
        image_path: String,
        expires_at: String,
    },
}

fn serialize_paths<S: serde::Serializer>(paths: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    let encoded = serde_json::to_string(paths).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&encoded)
}

impl NewRecord {
    pub fn post(user_id: impl Into<String>, caption: impl Into<String>, image_paths: Vec<String>) -> Self {
        NewRecord::Post {
            user_id: user_id.into(),
            caption: caption.into(),
            image_paths,
        }
    }

    /// Story expiring `ttl_hours` after `now`.
    pub fn story(
        user_id: impl Into<String>,
        image_path: impl Into<String>,
        now: DateTime<Utc>,
        ttl_hours: u32,
    ) -> Self {
        let expires = now + Duration::hours(i64::from(ttl_hours));
        NewRecord::Story {
            user_id: user_id.into(),
            image_path: image_path.into(),
            expires_at: expires.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            NewRecord::Post { .. } => "posts",
            NewRecord::Story { .. } => "stories",
        }
    }

    /// Storage keys the record references, in display order.
    pub fn image_keys(&self) -> Vec<String> {
        match self {
            NewRecord::Post { image_paths, .. } => image_paths.clone(),
            NewRecord::Story { image_path, .. } => vec![image_path.clone()],
        }
    }

    /// The `image_path` column as stored.
    pub fn image_path_column(&self) -> String {
        match self {
            // Serializing a list of strings cannot fail
            NewRecord::Post { image_paths, .. } => {
                serde_json::to_string(image_paths).unwrap_or_else(|_| "[]".to_string())
            }
            NewRecord::Story { image_path, .. } => image_path.clone(),
        }
    }
}

/// Object key for the image at `position` of an upload batch.
pub fn storage_key(user_id: &str, now: DateTime<Utc>, position: usize) -> String {
    format!("{}-{}-{}.jpg", user_id, now.timestamp_millis(), position)
}

/// Read a post's `image_path` column.
///
/// Newer rows hold a JSON array of keys; older rows hold a single path.
/// Blank entries are dropped.
pub fn parse_image_paths(column: &str) -> Vec<String> {
    let trimmed = column.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed.starts_with('[') {
        if let Ok(paths) = serde_json::from_str::<Vec<String>>(trimmed) {
            return paths
                .into_iter()
                .filter(|path| !path.trim().is_empty())
                .collect();
        }
    }
    vec![trimmed.to_string()]
}

/// Public URLs for every key in a post's `image_path` column.
pub fn public_urls(storage: &dyn ObjectStorage, bucket: &str, column: &str) -> Vec<String> {
    parse_image_paths(column)
        .iter()
        .map(|key| storage.public_url(bucket, key))
        .collect()
}

/// Run a side effect whose failure must not fail the caller.
///
/// Errors are logged at `warn` and dropped. Returns whether it succeeded.
pub fn best_effort<E, F>(label: &str, f: F) -> bool
where
    E: std::fmt::Display,
    F: FnOnce() -> Result<(), E>,
{
    match f() {
        Ok(()) => true,
        Err(e) => {
            log::warn!("{} failed: {}", label, e);
            false
        }
    }
}

/// Delete the stored images of a post that is being removed.
pub fn remove_post_images(storage: &dyn ObjectStorage, bucket: &str, column: &str) -> bool {
    let keys = parse_image_paths(column);
    if keys.is_empty() {
        return true;
    }
    best_effort("removing post images", || storage.remove(bucket, &keys))
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory backends for tests.

    use std::cell::RefCell;
    use std::collections::BTreeMap;

    use super::*;

    #[derive(Default)]
    pub struct MemoryStorage {
        pub objects: RefCell<BTreeMap<(String, String), Vec<u8>>>,
        pub calls: RefCell<Vec<String>>,
        /// Upload positions (by call order) that fail.
        pub fail_on_call: Option<usize>,
        pub fail_remove: bool,
    }

    impl MemoryStorage {
        pub fn keys(&self, bucket: &str) -> Vec<String> {
            self.objects
                .borrow()
                .keys()
                .filter(|(b, _)| b == bucket)
                .map(|(_, k)| k.clone())
                .collect()
        }
    }

    impl ObjectStorage for MemoryStorage {
        fn upload(
            &self,
            bucket: &str,
            key: &str,
            bytes: &[u8],
            content_type: &str,
        ) -> Result<(), BackendError> {
            let call = self.calls.borrow().len();
            self.calls
                .borrow_mut()
                .push(format!("upload {}/{} {}", bucket, key, content_type));
            if self.fail_on_call == Some(call) {
                return Err(BackendError::new("network unreachable"));
            }
            self.objects
                .borrow_mut()
                .insert((bucket.to_string(), key.to_string()), bytes.to_vec());
            Ok(())
        }

        fn public_url(&self, bucket: &str, key: &str) -> String {
            format!("https://cdn.test/{}/{}", bucket, key)
        }

        fn remove(&self, bucket: &str, keys: &[String]) -> Result<(), BackendError> {
            self.calls
                .borrow_mut()
                .push(format!("remove {}/{}", bucket, keys.join(",")));
            if self.fail_remove {
                return Err(BackendError::new("forbidden"));
            }
            let mut objects = self.objects.borrow_mut();
            for key in keys {
                objects.remove(&(bucket.to_string(), key.clone()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct MemoryRecords {
        pub rows: RefCell<Vec<NewRecord>>,
        pub fail: bool,
    }

    impl RecordStore for MemoryRecords {
        fn insert(&self, record: &NewRecord) -> Result<RecordId, BackendError> {
            if self.fail {
                return Err(BackendError::new("insert rejected"));
            }
            let mut rows = self.rows.borrow_mut();
            rows.push(record.clone());
            Ok(RecordId(format!("{}-{}", record.table(), rows.len())))
        }
    }
}
