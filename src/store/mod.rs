//! Key-value storage for flat per-station records
//!
//! Frequency and status records live in a namespaced key-value store with
//! an atomic create-if-absent primitive. The file-backed store keeps one
//! JSON file per record; the in-memory store backs tests and single-process
//! deployments.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StoreError;

/// Namespace holding frequency claims
pub const FREQUENCIES: &str = "frequencies";

/// Namespace holding launch status records
pub const STATUS: &str = "status";

/// Storage backend for registry and status records
pub trait KeyValueStore: Send + Sync {
    /// Store `value` under `key` only if nothing is there yet.
    ///
    /// Returns `Ok(false)` when the key already exists.
    fn create_if_absent(&self, namespace: &str, key: &str, value: &[u8]) -> Result<bool, StoreError>;

    /// Store `value` under `key`, replacing any previous value
    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StoreError>;

    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Remove `key`. Removing a missing key succeeds.
    fn delete(&self, namespace: &str, key: &str) -> Result<(), StoreError>;
}

/// Run a synchronous store operation on the blocking pool.
///
/// File-backed operations sync to disk; running them inline would stall
/// the paced sends of every other station on the same worker.
pub async fn blocking<T, E, F>(op: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: From<StoreError> + Send + 'static,
{
    match tokio::task::spawn_blocking(op).await {
        Ok(result) => result,
        Err(e) => Err(StoreError::Task(e.to_string()).into()),
    }
}

/// Reject keys that could escape their namespace
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty()
        || key == "."
        || key.contains("..")
        || key.contains('/')
        || key.contains('\\')
        || key.contains('\0')
    {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
