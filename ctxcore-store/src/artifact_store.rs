//! The Artifact Store (§4.1): a scope-partitioned, file-backed key-value
//! store over a fixed filesystem root.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use ctxcore_core::{
    is_valid_key, sanitize_key, scope_config, Artifact, ArtifactMetadata, Scope, StoreError,
};
use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::value::StoreValue;

const MAX_VALUE_BYTES: u64 = 50 * 1024 * 1024;

/// How a caller wants a stored value decoded back on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsType {
    Auto,
    Str,
    Bytes,
    Dict,
}

/// A value read back from the store, decoded per the requested `AsType`.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievedValue {
    Str(String),
    Bytes(Vec<u8>),
    Dict(Value),
}

/// `get_metadata`'s result: the stored record plus fields computed at read
/// time rather than persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactMetadataView {
    pub artifact: Artifact,
    pub is_expired: bool,
}

/// Per-scope totals returned by `get_stats`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScopeStats {
    pub used_bytes: u64,
    pub count: usize,
    pub quota_bytes: u64,
    pub utilization: f64,
}

/// On-disk index row: the full artifact record plus the original
/// (unsanitized) key, kept so pattern search can run against it even though
/// the file on disk uses the sanitized name.
type ScopeIndex = HashMap<String, Artifact>;

pub struct ArtifactStore {
    root: PathBuf,
    /// One lock per scope, held across a put's file-write + index-update
    /// sequence so concurrent writers to the same scope never interleave.
    scope_locks: HashMap<Scope, Mutex<()>>,
}

impl ArtifactStore {
    /// Create (or open) a store rooted at `root`. Initialization is
    /// idempotent: every scope subdirectory is created if missing. Failure
    /// to create the `artifacts` subdirectory is treated as a critical
    /// invariant violation and propagated rather than tolerated.
    ///
    /// `seed_instructions` is a best-effort list of (tag, content) pairs
    /// written into the `instructions` scope if not already present; any
    /// failure here is logged and otherwise ignored.
    pub fn new(root: impl Into<PathBuf>, seed_instructions: &[(&str, &str)]) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| StoreError::KVStoreError(format!("failed to create store root: {e}")))?;

        for scope in Scope::all() {
            let dir = scope_dir(&root, scope);
            std::fs::create_dir_all(&dir).map_err(|e| {
                if scope == Scope::Artifacts {
                    StoreError::KVStoreError(format!(
                        "critical: failed to create artifacts scope directory: {e}"
                    ))
                } else {
                    StoreError::KVStoreError(format!("failed to create scope directory: {e}"))
                }
            })?;
            std::fs::create_dir_all(dir.join("data")).map_err(|e| {
                StoreError::KVStoreError(format!("failed to create scope data directory: {e}"))
            })?;
        }

        let mut scope_locks = HashMap::new();
        for scope in Scope::all() {
            scope_locks.insert(scope, Mutex::new(()));
        }

        let store = Self { root, scope_locks };

        for (tag, content) in seed_instructions {
            let key = format!("instruction_{tag}");
            if store.get_metadata(Scope::Instructions, &key).is_err() {
                if let Err(e) = store.put(
                    Scope::Instructions,
                    &key,
                    StoreValue::Text((*content).to_string()),
                    None,
                    None,
                    Some("text/plain".to_string()),
                ) {
                    tracing::warn!(tag, error = %e, "failed to seed instruction, continuing");
                }
            }
        }

        Ok(store)
    }

    fn lock_for(&self, scope: Scope) -> &Mutex<()> {
        self.scope_locks
            .get(&scope)
            .expect("all scopes have a lock by construction")
    }

    fn index_path(&self, scope: Scope) -> PathBuf {
        scope_dir(&self.root, scope).join("index.json")
    }

    fn data_path(&self, scope: Scope, sanitized_key: &str) -> PathBuf {
        scope_dir(&self.root, scope).join("data").join(sanitized_key)
    }

    fn load_index(&self, scope: Scope) -> Result<ScopeIndex, StoreError> {
        let path = self.index_path(scope);
        if !path.exists() {
            return Ok(ScopeIndex::new());
        }
        let raw = std::fs::read(&path)
            .map_err(|e| StoreError::KVStoreError(format!("failed to read index: {e}")))?;
        if raw.is_empty() {
            return Ok(ScopeIndex::new());
        }
        serde_json::from_slice(&raw)
            .map_err(|e| StoreError::KVStoreError(format!("corrupt index: {e}")))
    }

    fn save_index(&self, scope: Scope, index: &ScopeIndex) -> Result<(), StoreError> {
        let path = self.index_path(scope);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(index)
            .map_err(|e| StoreError::KVStoreError(format!("failed to encode index: {e}")))?;
        std::fs::write(&tmp, bytes)
            .map_err(|e| StoreError::KVStoreError(format!("failed to write index: {e}")))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| StoreError::KVStoreError(format!("failed to commit index: {e}")))?;
        Ok(())
    }

    /// §4.1 `put`. Returns the path written to on success.
    pub fn put(
        &self,
        scope: Scope,
        key: &str,
        value: impl Into<StoreValue>,
        ttl_hours: Option<i64>,
        metadata: Option<ArtifactMetadata>,
        content_type: Option<String>,
    ) -> Result<PathBuf, StoreError> {
        if !is_valid_key(key) {
            return Err(StoreError::ValueError {
                key: key.to_string(),
                reason: "key is empty, too long, or contains traversal components".to_string(),
            });
        }

        let value = value.into();
        let content_type = content_type.unwrap_or_else(|| value.default_content_type().to_string());
        let bytes = value.into_bytes();
        let size_bytes = bytes.len() as u64;
        if size_bytes > MAX_VALUE_BYTES {
            return Err(StoreError::ValueError {
                key: key.to_string(),
                reason: format!("value of {size_bytes} bytes exceeds the 50 MB limit"),
            });
        }

        let _guard = self.lock_for(scope).lock().unwrap_or_else(|p| p.into_inner());

        let mut index = self.load_index(scope)?;

        let existing_size = index.get(key).map(|a| a.size_bytes).unwrap_or(0);
        let used_bytes: u64 = index
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(_, a)| a.size_bytes)
            .sum();
        let quota = scope_config(scope).max_size_bytes();
        if used_bytes + size_bytes > quota {
            return Err(StoreError::QuotaError {
                scope: scope.to_string(),
                used_bytes,
                new_bytes: size_bytes,
                quota_bytes: quota,
            });
        }
        let _ = existing_size;

        let fingerprint = fingerprint_of(&bytes);
        let sanitized = sanitize_key(key);
        let path = self.data_path(scope, &sanitized);

        std::fs::write(&path, &bytes)
            .map_err(|e| StoreError::KVStoreError(format!("failed to write artifact file: {e}")))?;

        let ttl_hours = ttl_hours.unwrap_or_else(|| scope_config(scope).default_ttl_hours);
        let now = Utc::now();
        let mut metadata = metadata.unwrap_or_default();
        metadata.content_type = Some(content_type.clone());
        metadata.clamp();

        let artifact = Artifact {
            artifact_key: key.to_string(),
            scope,
            content_type,
            size_bytes,
            fingerprint,
            created_at: now,
            expires_at: now + Duration::hours(ttl_hours),
            ttl_hours,
            metadata,
        };

        index.insert(key.to_string(), artifact);

        if let Err(e) = self.save_index(scope, &index) {
            tracing::warn!(scope = %scope, key, error = %e, "index write failed after successful file write, orphan tolerated until next prune");
            return Ok(path);
        }

        Ok(path)
    }

    /// §4.1 `get`. Checks expiry (deleting an expired entry before raising
    /// `KeyError`) and verifies the fingerprint, logging on mismatch without
    /// failing the read.
    pub fn get(&self, scope: Scope, key: &str, as_type: AsType) -> Result<RetrievedValue, StoreError> {
        let artifact = self.get_and_expire(scope, key)?;
        let sanitized = sanitize_key(key);
        let path = self.data_path(scope, &sanitized);
        let bytes = std::fs::read(&path).map_err(|_| StoreError::KeyError {
            scope: scope.to_string(),
            key: key.to_string(),
        })?;

        if fingerprint_of(&bytes) != artifact.fingerprint {
            tracing::warn!(scope = %scope, key, "fingerprint mismatch on read, serving content anyway");
        }

        decode(&bytes, &artifact.content_type, as_type, key)
    }

    pub fn get_metadata(&self, scope: Scope, key: &str) -> Result<ArtifactMetadataView, StoreError> {
        let index = self.load_index(scope)?;
        let artifact = index.get(key).cloned().ok_or_else(|| StoreError::KeyError {
            scope: scope.to_string(),
            key: key.to_string(),
        })?;
        let is_expired = artifact.is_expired_at(Utc::now());
        Ok(ArtifactMetadataView { artifact, is_expired })
    }

    /// Loads the artifact, deleting it first if expired. Used by `get`.
    fn get_and_expire(&self, scope: Scope, key: &str) -> Result<Artifact, StoreError> {
        let mut index = self.load_index(scope)?;
        let artifact = index.get(key).cloned().ok_or_else(|| StoreError::KeyError {
            scope: scope.to_string(),
            key: key.to_string(),
        })?;

        if artifact.is_expired_at(Utc::now()) {
            index.remove(key);
            let _ = self.save_index(scope, &index);
            let sanitized = sanitize_key(key);
            let _ = std::fs::remove_file(self.data_path(scope, &sanitized));
            return Err(StoreError::KeyError {
                scope: scope.to_string(),
                key: key.to_string(),
            });
        }

        Ok(artifact)
    }

    pub fn delete(&self, scope: Scope, key: &str) -> Result<bool, StoreError> {
        let _guard = self.lock_for(scope).lock().unwrap_or_else(|p| p.into_inner());
        let mut index = self.load_index(scope)?;
        let Some(artifact) = index.remove(key) else {
            return Ok(false);
        };
        self.save_index(scope, &index)?;
        let sanitized = sanitize_key(&artifact.artifact_key);
        let _ = std::fs::remove_file(self.data_path(scope, &sanitized));
        Ok(true)
    }

    /// §4.1 `list_keys`. `pattern` matches against the original key.
    pub fn list_keys(
        &self,
        scope: Option<Scope>,
        pattern: Option<&Regex>,
        include_expired: bool,
    ) -> Result<Vec<Artifact>, StoreError> {
        let scopes: Vec<Scope> = scope.map(|s| vec![s]).unwrap_or_else(|| Scope::all().to_vec());
        let now = Utc::now();
        let mut out = Vec::new();
        for scope in scopes {
            let index = self.load_index(scope)?;
            for (key, artifact) in index {
                if !include_expired && artifact.is_expired_at(now) {
                    continue;
                }
                if let Some(re) = pattern {
                    if !re.is_match(&key) {
                        continue;
                    }
                }
                out.push(artifact);
            }
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    /// §4.1 `prune_expired`. Returns the number of entries removed per scope.
    pub fn prune_expired(&self, scope: Option<Scope>) -> Result<HashMap<Scope, usize>, StoreError> {
        let scopes: Vec<Scope> = scope.map(|s| vec![s]).unwrap_or_else(|| Scope::all().to_vec());
        let now = Utc::now();
        let mut counts = HashMap::new();
        for scope in scopes {
            let _guard = self.lock_for(scope).lock().unwrap_or_else(|p| p.into_inner());
            let mut index = self.load_index(scope)?;
            let expired: Vec<String> = index
                .iter()
                .filter(|(_, a)| a.is_expired_at(now))
                .map(|(k, _)| k.clone())
                .collect();
            for key in &expired {
                if let Some(artifact) = index.remove(key) {
                    let sanitized = sanitize_key(&artifact.artifact_key);
                    let _ = std::fs::remove_file(self.data_path(scope, &sanitized));
                }
            }
            if !expired.is_empty() {
                self.save_index(scope, &index)?;
            }
            counts.insert(scope, expired.len());
        }
        Ok(counts)
    }

    pub fn get_stats(&self, scope: Option<Scope>) -> Result<HashMap<Scope, ScopeStats>, StoreError> {
        let scopes: Vec<Scope> = scope.map(|s| vec![s]).unwrap_or_else(|| Scope::all().to_vec());
        let mut out = HashMap::new();
        for scope in scopes {
            let index = self.load_index(scope)?;
            let used_bytes: u64 = index.values().map(|a| a.size_bytes).sum();
            let quota_bytes = scope_config(scope).max_size_bytes();
            let utilization = if quota_bytes == 0 {
                0.0
            } else {
                used_bytes as f64 / quota_bytes as f64
            };
            out.insert(
                scope,
                ScopeStats {
                    used_bytes,
                    count: index.len(),
                    quota_bytes,
                    utilization,
                },
            );
        }
        Ok(out)
    }

    pub fn clear_scope(&self, scope: Scope) -> Result<usize, StoreError> {
        let _guard = self.lock_for(scope).lock().unwrap_or_else(|p| p.into_inner());
        let index = self.load_index(scope)?;
        let count = index.len();
        for artifact in index.values() {
            let sanitized = sanitize_key(&artifact.artifact_key);
            let _ = std::fs::remove_file(self.data_path(scope, &sanitized));
        }
        self.save_index(scope, &ScopeIndex::new())?;
        Ok(count)
    }
}

fn scope_dir(root: &Path, scope: Scope) -> PathBuf {
    root.join(scope.dir_name())
}

fn fingerprint_of(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    hex::encode(digest)[..16].to_string()
}

fn decode(bytes: &[u8], content_type: &str, as_type: AsType, key: &str) -> Result<RetrievedValue, StoreError> {
    match as_type {
        AsType::Bytes => Ok(RetrievedValue::Bytes(bytes.to_vec())),
        AsType::Str => std::str::from_utf8(bytes)
            .map(|s| RetrievedValue::Str(s.to_string()))
            .map_err(|_| StoreError::ValueError {
                key: key.to_string(),
                reason: "stored value is not valid UTF-8".to_string(),
            }),
        AsType::Dict => serde_json::from_slice(bytes)
            .map(RetrievedValue::Dict)
            .map_err(|e| StoreError::ValueError {
                key: key.to_string(),
                reason: format!("stored value is not valid JSON: {e}"),
            }),
        AsType::Auto => {
            if content_type == "application/json" {
                if let Ok(v) = serde_json::from_slice(bytes) {
                    return Ok(RetrievedValue::Dict(v));
                }
            }
            match std::str::from_utf8(bytes) {
                Ok(s) => Ok(RetrievedValue::Str(s.to_string())),
                Err(_) => Ok(RetrievedValue::Bytes(bytes.to_vec())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_store() -> (TempDir, ArtifactStore) {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path(), &[]).unwrap();
        (dir, store)
    }

    #[test]
    fn put_then_get_roundtrips() {
        let (_dir, store) = new_store();
        store
            .put(Scope::Task, "k1", "hello world", None, None, None)
            .unwrap();
        let value = store.get(Scope::Task, "k1", AsType::Str).unwrap();
        assert_eq!(value, RetrievedValue::Str("hello world".to_string()));
    }

    #[test]
    fn put_rejects_traversal_key() {
        let (_dir, store) = new_store();
        let err = store
            .put(Scope::Task, "../escape", "x", None, None, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::ValueError { .. }));
    }

    #[test]
    fn put_rejects_oversized_value() {
        let (_dir, store) = new_store();
        let big = vec![0u8; (MAX_VALUE_BYTES + 1) as usize];
        let err = store
            .put(Scope::Task, "big", big, None, None, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::ValueError { .. }));
    }

    #[test]
    fn quota_error_when_scope_full() {
        let (_dir, store) = new_store();
        // Instructions scope quota is 5 MB; two 3 MB writes should overflow.
        let chunk = vec![0u8; 3 * 1024 * 1024];
        store
            .put(Scope::Instructions, "a", chunk.clone(), None, None, None)
            .unwrap();
        let err = store
            .put(Scope::Instructions, "b", chunk, None, None, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::QuotaError { .. }));
    }

    #[test]
    fn get_missing_key_is_key_error() {
        let (_dir, store) = new_store();
        let err = store.get(Scope::Task, "missing", AsType::Str).unwrap_err();
        assert!(matches!(err, StoreError::KeyError { .. }));
    }

    #[test]
    fn expired_entry_is_deleted_on_read() {
        let (_dir, store) = new_store();
        store
            .put(Scope::Task, "k", "v", Some(-1), None, None)
            .unwrap();
        let err = store.get(Scope::Task, "k", AsType::Str).unwrap_err();
        assert!(matches!(err, StoreError::KeyError { .. }));
        // And it's truly gone from the index, not just hidden.
        let meta_err = store.get_metadata(Scope::Task, "k").unwrap_err();
        assert!(matches!(meta_err, StoreError::KeyError { .. }));
    }

    #[test]
    fn delete_returns_false_for_missing_key() {
        let (_dir, store) = new_store();
        assert!(!store.delete(Scope::Task, "nope").unwrap());
    }

    #[test]
    fn list_keys_sorted_by_recency_and_filterable_by_pattern() {
        let (_dir, store) = new_store();
        store
            .put(Scope::Task, "search_results_1", "a", None, None, None)
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store
            .put(Scope::Task, "file_content_1", "b", None, None, None)
            .unwrap();

        let all = store.list_keys(Some(Scope::Task), None, false).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].artifact_key, "file_content_1");

        let re = Regex::new("^search_").unwrap();
        let filtered = store.list_keys(Some(Scope::Task), Some(&re), false).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].artifact_key, "search_results_1");
    }

    #[test]
    fn prune_expired_removes_and_counts() {
        let (_dir, store) = new_store();
        store
            .put(Scope::Task, "expired", "v", Some(-1), None, None)
            .unwrap();
        store
            .put(Scope::Task, "fresh", "v", Some(24), None, None)
            .unwrap();
        let counts = store.prune_expired(Some(Scope::Task)).unwrap();
        assert_eq!(counts[&Scope::Task], 1);
        assert_eq!(store.list_keys(Some(Scope::Task), None, false).unwrap().len(), 1);
    }

    #[test]
    fn clear_scope_deletes_everything() {
        let (_dir, store) = new_store();
        store.put(Scope::Task, "a", "x", None, None, None).unwrap();
        store.put(Scope::Task, "b", "y", None, None, None).unwrap();
        let deleted = store.clear_scope(Scope::Task).unwrap();
        assert_eq!(deleted, 2);
        assert!(store.list_keys(Some(Scope::Task), None, false).unwrap().is_empty());
    }

    #[test]
    fn fingerprint_matches_sha256_prefix() {
        let (_dir, store) = new_store();
        store.put(Scope::Task, "k", "abc", None, None, None).unwrap();
        let view = store.get_metadata(Scope::Task, "k").unwrap();
        let mut hasher = Sha256::new();
        hasher.update(b"abc");
        let expected = hex::encode(hasher.finalize())[..16].to_string();
        assert_eq!(view.artifact.fingerprint, expected);
    }

    #[test]
    fn overwrite_does_not_double_count_existing_key_against_quota() {
        let (_dir, store) = new_store();
        let chunk = vec![0u8; 3 * 1024 * 1024];
        store
            .put(Scope::Instructions, "a", chunk.clone(), None, None, None)
            .unwrap();
        // Overwriting the same key with the same size must not trip quota,
        // since the old bytes are excluded from the "used" sum.
        store
            .put(Scope::Instructions, "a", chunk, None, None, None)
            .unwrap();
    }
}
