//! On-disk cache for forge API responses
//!
//! Each entry is a JSON file named by the SHA-256 of its key and stamped
//! with the time it was stored. Entries older than the expiry are ignored
//! and overwritten on the next fetch. A broken entry is treated as a miss.

pub mod paths;

pub use paths::{get_cache_root, get_responses_dir};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::CacheConfig;

#[derive(Serialize, Deserialize)]
struct CacheEntry<T> {
    /// Unix seconds
    stored_at: i64,
    data: T,
}

/// File-backed response cache
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
    expiry_secs: i64,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>, expiry_hours: u64) -> Self {
        Self {
            dir: dir.into(),
            expiry_secs: i64::try_from(expiry_hours.saturating_mul(3600)).unwrap_or(i64::MAX),
        }
    }

    /// Build the cache described by the config, or `None` when disabled.
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let root = config.dir.clone().unwrap_or_else(get_cache_root);
        Some(Self::new(get_responses_dir(&root), config.expiry_hours))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{:x}.json", digest))
    }

    /// Fresh cached value for `key`, if any.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path_for(key);
        let content = std::fs::read_to_string(&path).ok()?;
        let entry: CacheEntry<serde_json::Value> = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Invalid cache file {}: {}", path.display(), e);
                return None;
            }
        };
        if Utc::now().timestamp() - entry.stored_at > self.expiry_secs {
            debug!("Cache entry expired: {}", key);
            return None;
        }
        match serde_json::from_value(entry.data) {
            Ok(value) => {
                debug!("Cache hit: {}", key);
                Some(value)
            }
            Err(e) => {
                warn!("Cached value for {} has an unexpected shape: {}", key, e);
                None
            }
        }
    }

    /// Store a value. Failures are logged, never returned.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            warn!("Cannot create cache dir {}: {}", self.dir.display(), e);
            return;
        }
        let entry = CacheEntry {
            stored_at: Utc::now().timestamp(),
            data: value,
        };
        let path = self.path_for(key);
        let result = serde_json::to_string(&entry)
            .map_err(std::io::Error::other)
            .and_then(|json| std::fs::write(&path, json));
        if let Err(e) = result {
            warn!("Failed to write cache file {}: {}", path.display(), e);
        }
    }

    /// Remove every cached response. Returns the number of files deleted.
    pub fn clear(&self) -> std::io::Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json") {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
