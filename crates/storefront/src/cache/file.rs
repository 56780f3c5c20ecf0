//! Directory-backed cache: one file per key.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use url::form_urlencoded;

use super::{CacheError, LocalCache};

/// Longest path component written, leaving room for the `.json.tmp` suffix.
const MAX_COMPONENT_LEN: usize = 200;

/// Cache that stores each key as a JSON file under `dir`.
///
/// Keys are percent-encoded into file names, so any non-empty key is
/// accepted and none can escape `dir`. Encoded keys longer than one path
/// component are split across nested directories.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// reader never sees a half-written value.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Create a cache rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the cache files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, CacheError> {
        if key.is_empty() {
            return Err(CacheError::InvalidKey(key.to_string()));
        }

        let encoded = encode_key(key);
        let mut path = self.dir.clone();
        let mut rest = encoded.as_str();
        // Encoded keys are ASCII, so any byte offset is a char boundary.
        while rest.len() > MAX_COMPONENT_LEN {
            let (head, tail) = rest.split_at(MAX_COMPONENT_LEN);
            path.push(head);
            rest = tail;
        }
        path.push(format!("{rest}.json"));
        Ok(path)
    }
}

/// Map a key to ASCII `[A-Za-z0-9_+%-]`, one-to-one.
fn encode_key(key: &str) -> String {
    form_urlencoded::byte_serialize(key.as_bytes())
        .collect::<String>()
        .replace('.', "%2E")
        .replace('*', "%2A")
}

#[async_trait]
impl LocalCache for FileCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(key, bytes = value.len(), "Cache entry written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
