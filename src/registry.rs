//! Frequency registry
//!
//! Exclusive allocation of broadcast channels. A claim is the creation of
//! a frequency record; at most one record exists per frequency.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::station::{Frequency, FrequencyRecord};
use crate::store::{KeyValueStore, FREQUENCIES};

pub struct FrequencyRegistry {
    store: Arc<dyn KeyValueStore>,
    /// Serializes claims made through this registry
    claim_lock: Mutex<()>,
}

impl FrequencyRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            claim_lock: Mutex::new(()),
        }
    }

    /// Claim `frequency` for `station_name`.
    ///
    /// Fails with [`RegistryError::FrequencyOccupied`] if another station
    /// holds it. Claims from other processes sharing the store are excluded
    /// by the store's atomic create.
    pub fn claim(&self, frequency: &Frequency, station_name: &str) -> Result<(), RegistryError> {
        let record = FrequencyRecord {
            frequency: Some(frequency.clone()),
            name: station_name.to_string(),
        };
        let bytes = serde_json::to_vec(&record).map_err(|e| RegistryError::CorruptRecord {
            frequency: frequency.to_string(),
            reason: e.to_string(),
        })?;

        let _guard = self.claim_lock.lock();
        if self.store.create_if_absent(FREQUENCIES, frequency.as_str(), &bytes)? {
            tracing::info!(%frequency, station = station_name, "Frequency claimed");
            Ok(())
        } else {
            tracing::debug!(%frequency, station = station_name, "Frequency already occupied");
            Err(RegistryError::FrequencyOccupied {
                frequency: frequency.to_string(),
            })
        }
    }

    /// Release `frequency`. Releasing a free frequency is not an error.
    pub fn release(&self, frequency: &Frequency) -> Result<(), RegistryError> {
        self.store.delete(FREQUENCIES, frequency.as_str())?;
        tracing::info!(%frequency, "Frequency released");
        Ok(())
    }

    pub fn lookup(&self, frequency: &Frequency) -> Result<Option<FrequencyRecord>, RegistryError> {
        let Some(bytes) = self.store.get(FREQUENCIES, frequency.as_str())? else {
            return Ok(None);
        };
        let mut record: FrequencyRecord =
            serde_json::from_slice(&bytes).map_err(|e| RegistryError::CorruptRecord {
                frequency: frequency.to_string(),
                reason: e.to_string(),
            })?;
        record.frequency = Some(frequency.clone());
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileStore, MemoryStore};
    use proptest::prelude::*;
    use std::sync::Barrier;
    use std::thread;

    fn registry() -> FrequencyRegistry {
        FrequencyRegistry::new(Arc::new(MemoryStore::new()))
    }

    fn freq(s: &str) -> Frequency {
        s.parse().unwrap()
    }

    #[test]
    fn test_second_claim_is_occupied() {
        let registry = registry();
        registry.claim(&freq("101.1"), "Test").unwrap();

        let err = registry.claim(&freq("101.1"), "Other").unwrap_err();
        assert!(matches!(err, RegistryError::FrequencyOccupied { .. }));
        assert_eq!(err.to_string(), "frequency 101.1 is occupied");

        let record = registry.lookup(&freq("101.1")).unwrap().unwrap();
        assert_eq!(record.name, "Test");
    }

    #[test]
    fn test_release_is_idempotent() {
        let registry = registry();
        let f = freq("88.7");
        registry.release(&f).unwrap();

        registry.claim(&f, "Night Owl").unwrap();
        registry.release(&f).unwrap();
        registry.release(&f).unwrap();
        assert!(registry.lookup(&f).unwrap().is_none());

        // Free again after release
        registry.claim(&f, "Morning Show").unwrap();
        assert_eq!(registry.lookup(&f).unwrap().unwrap().name, "Morning Show");
    }

    #[test]
    fn test_concurrent_claims_single_winner() {
        let registry = Arc::new(registry());
        let barrier = Arc::new(Barrier::new(16));
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    registry
                        .claim(&freq("101.1"), &format!("station-{i}"))
                        .map(|_| i)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, RegistryError::FrequencyOccupied { .. })));

        let record = registry.lookup(&freq("101.1")).unwrap().unwrap();
        assert_eq!(record.name, format!("station-{}", winners[0]));
    }

    #[test]
    fn test_file_store_across_registries() {
        // Two registries over one directory behave like two processes
        let dir = tempfile::tempdir().unwrap();
        let a = FrequencyRegistry::new(Arc::new(FileStore::open(dir.path()).unwrap()));
        let b = FrequencyRegistry::new(Arc::new(FileStore::open(dir.path()).unwrap()));

        a.claim(&freq("95.5"), "First").unwrap();
        assert!(matches!(
            b.claim(&freq("95.5"), "Second"),
            Err(RegistryError::FrequencyOccupied { .. })
        ));
        assert_eq!(b.lookup(&freq("95.5")).unwrap().unwrap().name, "First");
    }

    #[test]
    fn test_file_store_race_across_registries() {
        // Each thread plays a separate process with its own registry
        let dir = tempfile::tempdir().unwrap();
        let contenders = 8;
        let barrier = Arc::new(Barrier::new(contenders));
        let handles: Vec<_> = (0..contenders)
            .map(|i| {
                let registry = FrequencyRegistry::new(Arc::new(FileStore::open(dir.path()).unwrap()));
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    registry.claim(&freq("97.3"), &format!("process-{i}")).map(|_| i)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1, "{results:?}");
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, RegistryError::FrequencyOccupied { .. })));

        let observer = FrequencyRegistry::new(Arc::new(FileStore::open(dir.path()).unwrap()));
        assert_eq!(
            observer.lookup(&freq("97.3")).unwrap().unwrap().name,
            format!("process-{}", winners[0])
        );
    }

    proptest! {
        #[test]
        fn prop_one_claim_per_frequency(names in proptest::collection::vec("[a-zA-Z ]{1,12}", 1..8)) {
            let registry = registry();
            let f = freq("101.1");
            let outcomes: Vec<bool> = names.iter().map(|n| registry.claim(&f, n).is_ok()).collect();
            prop_assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
            prop_assert!(outcomes[0]);
            prop_assert_eq!(&registry.lookup(&f).unwrap().unwrap().name, &names[0]);
        }
    }
}
