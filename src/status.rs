//! Launch status reporter
//!
//! Writes the record a launching caller polls to learn whether its station
//! came up. A missing record reads as pending.

use std::path::Path;
use std::sync::Arc;

use crate::error::StatusError;
use crate::station::{LaunchId, StatusRecord};
use crate::store::{FileStore, KeyValueStore, STATUS};

pub struct StatusReporter {
    store: Arc<dyn KeyValueStore>,
}

impl StatusReporter {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Reporter over the file store in `data_dir`, for callers that have
    /// no orchestrator to borrow one from
    pub fn open(data_dir: &Path) -> Result<Self, StatusError> {
        Ok(Self::new(Arc::new(FileStore::open(data_dir)?)))
    }

    pub fn record(&self, launch_id: &LaunchId, record: &StatusRecord) -> Result<(), StatusError> {
        let bytes = serde_json::to_vec(record)?;
        self.store.put(STATUS, launch_id.as_str(), &bytes)?;
        tracing::debug!(%launch_id, status = ?record.status, "Status recorded");
        Ok(())
    }

    /// Record `record`, logging instead of failing.
    ///
    /// The broadcast loop must keep running when the status store is
    /// unavailable.
    pub fn record_or_warn(&self, launch_id: &LaunchId, record: &StatusRecord) {
        if let Err(e) = self.record(launch_id, record) {
            tracing::warn!(%launch_id, "Failed to write status: {}", e);
        }
    }

    pub fn read(&self, launch_id: &LaunchId) -> Result<StatusRecord, StatusError> {
        match self.store.get(STATUS, launch_id.as_str())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(StatusRecord::pending()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::station::LaunchStatus;
    use crate::store::MemoryStore;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn create_if_absent(&self, _: &str, _: &str, _: &[u8]) -> Result<bool, StoreError> {
            Err(std::io::Error::other("disk full").into())
        }
        fn put(&self, _: &str, _: &str, _: &[u8]) -> Result<(), StoreError> {
            Err(std::io::Error::other("disk full").into())
        }
        fn get(&self, _: &str, _: &str) -> Result<Option<Vec<u8>>, StoreError> {
            Ok(None)
        }
        fn delete(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn test_missing_record_is_pending() {
        let reporter = StatusReporter::new(Arc::new(MemoryStore::new()));
        let id: LaunchId = "12345".parse().unwrap();
        assert_eq!(reporter.read(&id).unwrap().status, LaunchStatus::Pending);
    }

    #[test]
    fn test_record_and_read() {
        let reporter = StatusReporter::new(Arc::new(MemoryStore::new()));
        let id: LaunchId = "12345".parse().unwrap();
        reporter.record(&id, &StatusRecord::success("it worked")).unwrap();
        assert_eq!(reporter.read(&id).unwrap(), StatusRecord::success("it worked"));

        reporter.record(&id, &StatusRecord::failed("Failed: boom")).unwrap();
        assert_eq!(reporter.read(&id).unwrap().status, LaunchStatus::Failed);
    }

    #[test]
    fn test_open_writes_where_the_server_reads() {
        let dir = tempfile::tempdir().unwrap();
        let id: LaunchId = "startup-1".parse().unwrap();
        StatusReporter::open(dir.path())
            .unwrap()
            .record(&id, &StatusRecord::failed("Failed: Configuration error: bad port"))
            .unwrap();

        let reader = StatusReporter::new(Arc::new(FileStore::open(dir.path()).unwrap()));
        let record = reader.read(&id).unwrap();
        assert_eq!(record.status, LaunchStatus::Failed);
        assert!(record.message.contains("bad port"));
    }

    #[test]
    fn test_write_failure_is_not_fatal() {
        let reporter = StatusReporter::new(Arc::new(BrokenStore));
        let id: LaunchId = "1".parse().unwrap();
        assert!(reporter.record(&id, &StatusRecord::pending()).is_err());
        reporter.record_or_warn(&id, &StatusRecord::pending());
    }
}
