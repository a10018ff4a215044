//! Sample cache backing stores.
//!
//! The analyzer talks to the cache through [`SampleCache`]; the durable
//! implementation is SQLite-backed, with an in-memory fallback for
//! runs configured without a cache path.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

/// Cache store failures, split by whether a retry can help.
#[derive(Error, Debug)]
pub enum CacheError {
    /// I/O failure, lock contention, and other recoverable conditions.
    #[error("transient cache failure: {0}")]
    Transient(String),
    /// Structural corruption; retrying cannot help.
    #[error("cache corruption: {0}")]
    Corruption(String),
}

/// Durable mapping from `(fen, depth, n)` to the sampled scores.
///
/// The FEN keys verbatim; no canonicalization is applied. An entry is
/// written once per miss and only ever replaced wholesale.
pub trait SampleCache {
    /// Cached scores for the key, or `None` when absent.
    fn get(&self, fen: &str, depth: u32, n: u32) -> Result<Option<Vec<f64>>, CacheError>;

    /// Persists `values` for the key, replacing any previous entry.
    fn set(&self, fen: &str, depth: u32, n: u32, values: &[f64]) -> Result<(), CacheError>;
}

/// SQLite-backed sample cache.
pub struct SqliteCache {
    conn: Connection,
}

impl SqliteCache {
    /// Opens (or creates) the cache database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let conn = Connection::open(path).map_err(classify)?;
        let cache = Self { conn };
        cache.init_schema()?;
        Ok(cache)
    }

    /// Cache living only for the lifetime of the connection.
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory().map_err(classify)?;
        let cache = Self { conn };
        cache.init_schema()?;
        Ok(cache)
    }

    fn init_schema(&self) -> Result<(), CacheError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS eval_samples (
                    fen TEXT NOT NULL,
                    depth INTEGER NOT NULL,
                    n INTEGER NOT NULL,
                    scores TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    PRIMARY KEY (fen, depth, n)
                );",
            )
            .map_err(classify)
    }
}

impl SampleCache for SqliteCache {
    fn get(&self, fen: &str, depth: u32, n: u32) -> Result<Option<Vec<f64>>, CacheError> {
        let mut stmt = self
            .conn
            .prepare("SELECT scores FROM eval_samples WHERE fen = ?1 AND depth = ?2 AND n = ?3")
            .map_err(classify)?;
        let row: Option<String> = stmt
            .query_row(params![fen, depth, n], |row| row.get(0))
            .optional()
            .map_err(classify)?;

        match row {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json).map(Some).map_err(|e| {
                CacheError::Corruption(format!("undecodable scores for cached entry: {}", e))
            }),
        }
    }

    fn set(&self, fen: &str, depth: u32, n: u32, values: &[f64]) -> Result<(), CacheError> {
        let json = serde_json::to_string(values)
            .map_err(|e| CacheError::Transient(format!("failed to encode scores: {}", e)))?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO eval_samples (fen, depth, n, scores, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![fen, depth, n, json, Utc::now().to_rfc3339()],
            )
            .map_err(classify)?;
        Ok(())
    }
}

/// Splits SQLite failures into transient and corruption signatures.
fn classify(err: rusqlite::Error) -> CacheError {
    use rusqlite::ffi::ErrorCode;
    match &err {
        rusqlite::Error::SqliteFailure(e, _) => match e.code {
            ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase => {
                CacheError::Corruption(err.to_string())
            }
            _ => CacheError::Transient(err.to_string()),
        },
        _ => CacheError::Transient(err.to_string()),
    }
}

/// In-memory sample cache.
///
/// Clones share the same underlying map, which lets tests inspect what
/// an analyzer persisted.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<(String, u32, u32), Vec<f64>>>>,
}

impl MemoryCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SampleCache for MemoryCache {
    fn get(&self, fen: &str, depth: u32, n: u32) -> Result<Option<Vec<f64>>, CacheError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| CacheError::Transient("cache mutex poisoned".to_string()))?;
        Ok(entries.get(&(fen.to_string(), depth, n)).cloned())
    }

    fn set(&self, fen: &str, depth: u32, n: u32, values: &[f64]) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError::Transient("cache mutex poisoned".to_string()))?;
        entries.insert((fen.to_string(), depth, n), values.to_vec());
        Ok(())
    }
}
