//! The content-addressed Memory Store (§4.3): a parallel, CAS-only store
//! for large in-message payloads, backed by zstd-compressed files and a
//! local SQLite metadata index.

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use ctxcore_core::{CompressionKind, MemoryType, StoreError};
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};

const ZSTD_LEVEL: i32 = 6;

/// What `put_text` hands back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryReference {
    pub memory_id: String,
    pub mime: String,
    pub path: PathBuf,
    pub compression: CompressionKind,
    pub bytes: u64,
    pub title: Option<String>,
}

pub struct MemoryStore {
    root: PathBuf,
    conn: Mutex<Connection>,
}

impl MemoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(root.join("warm"))
            .map_err(|e| StoreError::KVStoreError(format!("failed to create warm dir: {e}")))?;

        let conn = Connection::open(root.join("memory_index.sqlite3"))
            .map_err(|e| StoreError::KVStoreError(format!("failed to open memory index: {e}")))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS memory_entries (
                memory_id TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                subtype TEXT,
                mime TEXT NOT NULL,
                bytes INTEGER NOT NULL,
                compression TEXT NOT NULL,
                path TEXT NOT NULL,
                sha256 TEXT NOT NULL,
                title TEXT,
                tags TEXT,
                created_at TEXT NOT NULL
            )",
        )
        .map_err(|e| StoreError::KVStoreError(format!("failed to create memory index table: {e}")))?;

        Ok(Self {
            root,
            conn: Mutex::new(conn),
        })
    }

    fn warm_path(&self, hash: &str) -> PathBuf {
        self.root.join("warm").join(&hash[..2.min(hash.len())]).join(format!("{hash}.zst"))
    }

    fn log_operation(&self, op: &str, memory_id: &str, original_bytes: u64, stored_bytes: u64) {
        let ratio = if original_bytes == 0 {
            1.0
        } else {
            stored_bytes as f64 / original_bytes as f64
        };
        let line = serde_json::json!({
            "op": op,
            "memory_id": memory_id,
            "original_bytes": original_bytes,
            "stored_bytes": stored_bytes,
            "compression_ratio": ratio,
            "created_at": Utc::now().to_rfc3339(),
        });
        let path = self.root.join("operations.log.jsonl");
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| writeln!(f, "{line}"));
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to append memory store operation log");
        }
    }

    /// §4.3 `put_text`. Writes the compressed blob only if it is not already
    /// present (the digest is content-addressed, so an existing file is
    /// already correct).
    pub fn put_text(
        &self,
        content: &str,
        memory_type: MemoryType,
        subtype: Option<String>,
        mime: Option<String>,
        title: Option<String>,
        tags: Vec<String>,
    ) -> Result<MemoryReference, StoreError> {
        let mime = mime.unwrap_or_else(|| "text/plain".to_string());
        let original_bytes = content.as_bytes();
        let compressed = zstd::encode_all(original_bytes, ZSTD_LEVEL)
            .map_err(|e| StoreError::KVStoreError(format!("zstd compression failed: {e}")))?;

        let mut hasher = Sha256::new();
        hasher.update(&compressed);
        let hash = hex::encode(hasher.finalize());

        let path = self.warm_path(&hash);
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::KVStoreError(format!("failed to create shard dir: {e}")))?;
            }
            std::fs::write(&path, &compressed)
                .map_err(|e| StoreError::KVStoreError(format!("failed to write memory blob: {e}")))?;
        }

        let tags_json = serde_json::to_string(&tags).unwrap_or_else(|_| "[]".to_string());
        let type_str = memory_type_str(memory_type);
        let path_str = path.to_string_lossy().to_string();

        {
            let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());
            conn.execute(
                "INSERT OR REPLACE INTO memory_entries
                    (memory_id, type, subtype, mime, bytes, compression, path, sha256, title, tags, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'zstd', ?6, ?7, ?8, ?9, ?10)",
                params![
                    hash,
                    type_str,
                    subtype,
                    mime,
                    compressed.len() as i64,
                    path_str,
                    hash,
                    title,
                    tags_json,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::KVStoreError(format!("failed to index memory entry: {e}")))?;
        }

        self.log_operation("put_text", &hash, original_bytes.len() as u64, compressed.len() as u64);

        Ok(MemoryReference {
            memory_id: hash,
            mime,
            path,
            compression: CompressionKind::Zstd,
            bytes: compressed.len() as u64,
            title,
        })
    }

    fn load_decompressed(&self, memory_id: &str) -> Result<String, StoreError> {
        let path_str: String = {
            let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());
            conn.query_row(
                "SELECT path FROM memory_entries WHERE memory_id = ?1",
                params![memory_id],
                |row| row.get(0),
            )
            .map_err(|_| StoreError::KeyError {
                scope: "memory".to_string(),
                key: memory_id.to_string(),
            })?
        };

        let compressed = std::fs::read(&path_str)
            .map_err(|e| StoreError::KVStoreError(format!("failed to read memory blob: {e}")))?;
        let decompressed = zstd::decode_all(compressed.as_slice())
            .map_err(|e| StoreError::KVStoreError(format!("zstd decompression failed: {e}")))?;
        String::from_utf8(decompressed).map_err(|_| StoreError::ValueError {
            key: memory_id.to_string(),
            reason: "stored memory entry is not valid UTF-8".to_string(),
        })
    }

    /// §4.3 `get_slice`: a half-open `[line_start, line_end)` range of
    /// lines. Hard caps on range size are enforced at the tool boundary, not
    /// here.
    pub fn get_slice(&self, memory_id: &str, line_start: usize, line_end: usize) -> Result<String, StoreError> {
        let body = self.load_decompressed(memory_id)?;
        let lines: Vec<&str> = body.lines().collect();
        let start = line_start.min(lines.len());
        let end = line_end.min(lines.len()).max(start);
        Ok(lines[start..end].join("\n"))
    }

    /// §4.3 `get_bytes`: a `[offset, offset+length)` byte range.
    pub fn get_bytes(&self, memory_id: &str, offset: usize, length: usize) -> Result<Vec<u8>, StoreError> {
        let body = self.load_decompressed(memory_id)?;
        let bytes = body.as_bytes();
        let start = offset.min(bytes.len());
        let end = (offset + length).min(bytes.len()).max(start);
        Ok(bytes[start..end].to_vec())
    }
}

fn memory_type_str(memory_type: MemoryType) -> &'static str {
    match memory_type {
        MemoryType::Conversation => "conversation",
        MemoryType::Document => "document",
        MemoryType::ToolOutput => "tool_output",
        MemoryType::Summary => "summary",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_store() -> (TempDir, MemoryStore) {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn put_text_then_get_slice_roundtrips() {
        let (_dir, store) = new_store();
        let content = "line one\nline two\nline three";
        let reference = store
            .put_text(content, MemoryType::Document, None, None, None, vec![])
            .unwrap();
        assert_eq!(reference.compression, CompressionKind::Zstd);

        let slice = store.get_slice(&reference.memory_id, 0, 2).unwrap();
        assert_eq!(slice, "line one\nline two");
    }

    #[test]
    fn get_bytes_returns_requested_range() {
        let (_dir, store) = new_store();
        let reference = store
            .put_text("abcdefghij", MemoryType::ToolOutput, None, None, None, vec![])
            .unwrap();
        let bytes = store.get_bytes(&reference.memory_id, 2, 3).unwrap();
        assert_eq!(bytes, b"cde");
    }

    #[test]
    fn identical_content_is_written_once() {
        let (_dir, store) = new_store();
        let a = store
            .put_text("same content", MemoryType::Conversation, None, None, None, vec![])
            .unwrap();
        let b = store
            .put_text("same content", MemoryType::Conversation, None, None, None, vec![])
            .unwrap();
        assert_eq!(a.memory_id, b.memory_id);
        assert_eq!(a.path, b.path);
    }

    #[test]
    fn get_slice_unknown_id_is_key_error() {
        let (_dir, store) = new_store();
        let err = store.get_slice("doesnotexist", 0, 1).unwrap_err();
        assert!(matches!(err, StoreError::KeyError { .. }));
    }

    #[test]
    fn out_of_range_request_clamps_instead_of_panicking() {
        let (_dir, store) = new_store();
        let reference = store
            .put_text("short", MemoryType::Document, None, None, None, vec![])
            .unwrap();
        let slice = store.get_slice(&reference.memory_id, 10, 20).unwrap();
        assert_eq!(slice, "");
        let bytes = store.get_bytes(&reference.memory_id, 100, 10).unwrap();
        assert!(bytes.is_empty());
    }
}
