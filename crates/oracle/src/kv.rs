//! The KV store seam: Redis in production, memory in tests.
//!
//! Key layout (shared with the rest of the fleet, do not change):
//!
//! - `oracle:submitter:last-submission-time`: scalar seconds
//! - `oracle:oracle-lock:<id>:<normalized_time>`: SETNX lock, 5 min TTL
//! - `oracle:adapter-store:<adapter_id>:<input_id>`: JSON value map
//! - `oracle:oracle-result:<id>`: JSON `{price, timestamp}`

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Key for the fleet-wide last submission time.
pub const LAST_SUBMISSION_TIME_KEY: &str = "oracle:submitter:last-submission-time";

/// Lock key for one `(oracle, window)` pair.
pub fn oracle_lock_key(oracle_id: &str, normalized_time: u64) -> String {
    format!("oracle:oracle-lock:{oracle_id}:{normalized_time}")
}

/// Key for an adapter's persisted store for one job input.
pub fn adapter_store_key(adapter_id: &str, input_id: &str) -> String {
    format!("oracle:adapter-store:{adapter_id}:{input_id}")
}

/// Key for the cached latest result of one oracle.
pub fn oracle_result_key(oracle_id: &str) -> String {
    format!("oracle:oracle-result:{oracle_id}")
}

/// KV store failures. All of them abort the current oracle tick; the next
/// tick retries.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// The store operations the executor needs from Redis.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a key, `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Write a key without expiry.
    async fn set(&self, key: &str, value: String) -> Result<(), KvError>;

    /// Set-if-absent with a TTL. Returns whether this caller won the key.
    async fn set_nx(&self, key: &str, value: String, ttl: Duration) -> Result<bool, KvError>;
}

/// Redis-backed store over a multiplexed async connection.
pub struct RedisKv {
    conn: redis::aio::MultiplexedConnection,
}

impl RedisKv {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(url: &str) -> Result<Self, KvError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET").arg(key).arg(value).query_async(&mut conn).await?;
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: String, ttl: Duration) -> Result<bool, KvError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }
}

/// In-memory store with TTL semantics, for tests and local simulation.
///
/// `set_nx` is atomic under one mutex, so it exercises the same
/// single-winner property the executor relies on in Redis.
#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryEntry {
    fn live(&self) -> bool {
        self.expires_at.map_or(true, |at| Instant::now() < at)
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.live() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), KvError> {
        self.entries.lock().insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: String, ttl: Duration) -> Result<bool, KvError> {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(key) {
            if existing.live() {
                return Ok(false);
            }
        }
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }
}
