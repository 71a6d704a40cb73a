// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable file primitives over one directory
//!
//! Callers must hold the matching lock-registry entry; nothing here locks.
//! Every mutation is followed by `fsync()` before returning.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from file primitives
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("invalid file name: {0:?}")]
    InvalidName(String),
    #[error("IO error on {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    fn from_io(name: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound(name.to_string())
        } else {
            StoreError::Io {
                name: name.to_string(),
                source,
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Flat file store rooted at one directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store, failing if the directory cannot be listed
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        let name = root.display().to_string();
        fs::read_dir(root).map_err(|e| StoreError::from_io(&name, e))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> Result<PathBuf, StoreError> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    pub fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.path(name)?.is_file())
    }

    /// Create an empty file; no-op if it already exists
    pub fn create(&self, name: &str) -> Result<(), StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(name)?)
            .map_err(|e| StoreError::from_io(name, e))?;
        file.sync_all().map_err(|e| StoreError::from_io(name, e))
    }

    /// Append bytes to an existing file and sync
    pub fn append(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(self.path(name)?)
            .map_err(|e| StoreError::from_io(name, e))?;
        file.write_all(bytes)
            .map_err(|e| StoreError::from_io(name, e))?;
        file.sync_all().map_err(|e| StoreError::from_io(name, e))
    }

    /// Replace a file's contents and sync, creating it if needed
    pub fn write_all(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let mut file = File::create(self.path(name)?).map_err(|e| StoreError::from_io(name, e))?;
        file.write_all(bytes)
            .map_err(|e| StoreError::from_io(name, e))?;
        file.sync_all().map_err(|e| StoreError::from_io(name, e))
    }

    pub fn read_all(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        fs::read(self.path(name)?).map_err(|e| StoreError::from_io(name, e))
    }

    /// Current size in bytes
    pub fn size(&self, name: &str) -> Result<u64, StoreError> {
        let meta = fs::metadata(self.path(name)?).map_err(|e| StoreError::from_io(name, e))?;
        Ok(meta.len())
    }

    /// Cut a file down to `size` bytes and sync
    pub fn truncate(&self, name: &str, size: u64) -> Result<(), StoreError> {
        let file = OpenOptions::new()
            .write(true)
            .open(self.path(name)?)
            .map_err(|e| StoreError::from_io(name, e))?;
        file.set_len(size)
            .map_err(|e| StoreError::from_io(name, e))?;
        file.sync_all().map_err(|e| StoreError::from_io(name, e))
    }

    pub fn delete(&self, name: &str) -> Result<(), StoreError> {
        fs::remove_file(self.path(name)?).map_err(|e| StoreError::from_io(name, e))
    }

    /// Names of the regular files in the directory, sorted
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let root = self.root.display().to_string();
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(|e| StoreError::from_io(&root, e))? {
            let entry = entry.map_err(|e| StoreError::from_io(&root, e))?;
            let is_file = entry
                .file_type()
                .map_err(|e| StoreError::from_io(&root, e))?
                .is_file();
            if let (true, Some(name)) = (is_file, entry.file_name().to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
