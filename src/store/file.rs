//! File-backed key-value store
//!
//! Layout: `<root>/<namespace>/<key>.json`. Creation uses `create_new`
//! so the claim is atomic even across processes sharing the directory.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use super::{validate_key, KeyValueStore};
use crate::error::StoreError;

pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, namespace: &str, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(namespace)?;
        validate_key(key)?;
        Ok(self.root.join(namespace).join(format!("{key}.json")))
    }

    fn ensure_namespace(&self, namespace: &str) -> Result<(), StoreError> {
        fs::create_dir_all(self.root.join(namespace))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn create_if_absent(&self, namespace: &str, key: &str, value: &[u8]) -> Result<bool, StoreError> {
        let path = self.path_for(namespace, key)?;
        self.ensure_namespace(namespace)?;

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = file.write_all(value).and_then(|_| file.sync_all()) {
            // Don't leave a half-written claim behind
            let _ = fs::remove_file(&path);
            return Err(e.into());
        }
        Ok(true)
    }

    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(namespace, key)?;
        self.ensure_namespace(namespace)?;

        let tmp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));
        fs::write(&tmp, value)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(namespace, key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(namespace, key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
