//! Cache store implementations
//!
//! Both stores hold exactly one [`PositionSnapshot`] per key and apply no
//! expiry of their own.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use super::snapshot::PositionSnapshot;
use crate::common::errors::{EngineError, Result};
use crate::common::traits::CacheStore;
use crate::common::types::CacheKey;

/// Process-local store, lost on restart
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<CacheKey, PositionSnapshot>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<PositionSnapshot>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &CacheKey, snapshot: &PositionSnapshot) -> Result<()> {
        self.entries.write().insert(*key, snapshot.clone());
        Ok(())
    }
}

/// One JSON document per key under a directory
///
/// Files are named `position-<market>-<user>.json`. Writes land in a
/// temporary file first and are renamed into place, so a crash mid-write
/// never leaves a truncated snapshot behind.
#[derive(Debug, Clone)]
pub struct JsonFileCacheStore {
    directory: PathBuf,
}

impl JsonFileCacheStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.directory.join(format!("{}.json", key.storage_name()))
    }
}

#[async_trait]
impl CacheStore for JsonFileCacheStore {
    #[instrument(skip_all, fields(key = %key))]
    async fn get(&self, key: &CacheKey) -> Result<Option<PositionSnapshot>> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(EngineError::Cache(format!(
                    "reading {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let snapshot: PositionSnapshot = serde_json::from_slice(&bytes)?;
        if snapshot.key() != *key {
            return Err(EngineError::Cache(format!(
                "{} holds a snapshot for {}",
                path.display(),
                snapshot.key()
            )));
        }
        Ok(Some(snapshot))
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn set(&self, key: &CacheKey, snapshot: &PositionSnapshot) -> Result<()> {
        tokio::fs::create_dir_all(&self.directory).await?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(snapshot)?;

        tokio::fs::write(&tmp, &body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("Wrote {} bytes to {}", body.len(), path.display());
        Ok(())
    }
}
