// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock registry for transactions and target files
//!
//! Owns one reader/writer lock per live transaction id and per known target
//! file, plus two global locks that serialize id allocation and file
//! creation. Nothing here performs I/O; it only guards access to it.
//!
//! Locks are released by dropping the guard returned from `acquire_*`.
//! Lock order is transaction, then file, then creation.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{MutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use txf_core::TxnId;

/// Errors from the lock registry
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown transaction: {0}")]
    UnknownTransaction(TxnId),
    #[error("no free transaction id")]
    Exhausted,
}

/// How a lock is held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Blocks only exclusive acquirers
    Shared,
    /// Blocks every other acquirer
    Exclusive,
}

type KeyLock = Arc<RwLock<()>>;

enum Held {
    Shared(#[allow(dead_code)] OwnedRwLockReadGuard<()>),
    Exclusive(#[allow(dead_code)] OwnedRwLockWriteGuard<()>),
}

impl Held {
    async fn acquire(lock: KeyLock, mode: LockMode) -> Self {
        match mode {
            LockMode::Shared => Held::Shared(lock.read_owned().await),
            LockMode::Exclusive => Held::Exclusive(lock.write_owned().await),
        }
    }

    fn mode(&self) -> LockMode {
        match self {
            Held::Shared(_) => LockMode::Shared,
            Held::Exclusive(_) => LockMode::Exclusive,
        }
    }
}

/// A held transaction lock; released on drop
pub struct TxnGuard {
    id: TxnId,
    held: Held,
}

impl TxnGuard {
    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn mode(&self) -> LockMode {
        self.held.mode()
    }
}

impl std::fmt::Debug for TxnGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxnGuard")
            .field("id", &self.id)
            .field("mode", &self.mode())
            .finish()
    }
}

/// A held file lock; released on drop
pub struct FileGuard {
    name: String,
    held: Held,
}

impl FileGuard {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> LockMode {
        self.held.mode()
    }
}

impl std::fmt::Debug for FileGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileGuard")
            .field("name", &self.name)
            .field("mode", &self.mode())
            .finish()
    }
}

/// Registry of per-transaction and per-file locks
#[derive(Default)]
pub struct LockRegistry {
    // Sorted so the smallest free id is found by walking the keys
    txns: Mutex<BTreeMap<TxnId, KeyLock>>,
    // Ids whose logs are stuck on disk; never allocated again
    retired: Mutex<BTreeSet<TxnId>>,
    files: Mutex<HashMap<String, KeyLock>>,
    allocation: tokio::sync::Mutex<()>,
    creation: tokio::sync::Mutex<()>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the smallest id not held by a live transaction
    ///
    /// The id's lock entry is registered before returning, so the id is live
    /// from this point until [`remove_txn`](Self::remove_txn). Retired ids
    /// are skipped.
    pub async fn allocate_txn_id(&self) -> Result<TxnId, RegistryError> {
        let _serial = self.allocation.lock().await;
        let mut txns = self.txns.lock().unwrap_or_else(|e| e.into_inner());
        let retired = self.retired.lock().unwrap_or_else(|e| e.into_inner());

        let mut candidate = TxnId(0);
        while txns.contains_key(&candidate) || retired.contains(&candidate) {
            candidate = TxnId(candidate.0.checked_add(1).ok_or(RegistryError::Exhausted)?);
        }

        let id = candidate;
        txns.insert(id, KeyLock::default());
        Ok(id)
    }

    /// Add an entry for a transaction found on disk
    ///
    /// Returns `false` if the id was already live.
    pub fn register_txn(&self, id: TxnId) -> bool {
        let mut txns = self.txns.lock().unwrap_or_else(|e| e.into_inner());
        if txns.contains_key(&id) {
            return false;
        }
        txns.insert(id, KeyLock::default());
        let mut retired = self.retired.lock().unwrap_or_else(|e| e.into_inner());
        retired.remove(&id);
        true
    }

    /// Acquire a transaction's lock
    ///
    /// Fails if the id is not live, including when the transaction was
    /// removed while this call was waiting for the lock.
    pub async fn acquire_txn(&self, id: TxnId, mode: LockMode) -> Result<TxnGuard, RegistryError> {
        let lock = self
            .txn_lock(id)
            .ok_or(RegistryError::UnknownTransaction(id))?;
        let held = Held::acquire(Arc::clone(&lock), mode).await;

        let still_live = self
            .txn_lock(id)
            .is_some_and(|current| Arc::ptr_eq(&current, &lock));
        if !still_live {
            return Err(RegistryError::UnknownTransaction(id));
        }
        Ok(TxnGuard { id, held })
    }

    /// Free a transaction's entry and its id
    ///
    /// Returns `false` if the id was not live. Waiters on the old lock see
    /// the transaction as unknown once they get it.
    pub fn remove_txn(&self, id: TxnId) -> bool {
        let mut txns = self.txns.lock().unwrap_or_else(|e| e.into_inner());
        txns.remove(&id).is_some()
    }

    /// Free a transaction's entry but keep its id out of allocation
    ///
    /// For ids whose logs could not be deleted. A retired id is unknown to
    /// clients and stays retired until it is registered again.
    pub fn retire_txn(&self, id: TxnId) {
        let mut txns = self.txns.lock().unwrap_or_else(|e| e.into_inner());
        txns.remove(&id);
        let mut retired = self.retired.lock().unwrap_or_else(|e| e.into_inner());
        retired.insert(id);
    }

    pub fn is_retired(&self, id: TxnId) -> bool {
        let retired = self.retired.lock().unwrap_or_else(|e| e.into_inner());
        retired.contains(&id)
    }

    pub fn is_live(&self, id: TxnId) -> bool {
        self.txn_lock(id).is_some()
    }

    /// Live transaction ids in ascending order
    pub fn live_txns(&self) -> Vec<TxnId> {
        let txns = self.txns.lock().unwrap_or_else(|e| e.into_inner());
        txns.keys().copied().collect()
    }

    fn txn_lock(&self, id: TxnId) -> Option<KeyLock> {
        let txns = self.txns.lock().unwrap_or_else(|e| e.into_inner());
        txns.get(&id).cloned()
    }

    /// Add a lock entry for a file, if it has none
    pub async fn register_file(&self, name: &str) {
        self.file_entry(name).await;
    }

    async fn file_entry(&self, name: &str) -> KeyLock {
        let _serial = self.creation.lock().await;
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(files.entry(name.to_string()).or_default())
    }

    /// Acquire a file's lock, registering the file on first use
    ///
    /// Must not be called while holding [`lock_creation`](Self::lock_creation).
    pub async fn acquire_file(&self, name: &str, mode: LockMode) -> FileGuard {
        let lock = match self.file_lock(name) {
            Some(lock) => lock,
            None => self.file_entry(name).await,
        };
        FileGuard {
            name: name.to_string(),
            held: Held::acquire(lock, mode).await,
        }
    }

    pub fn is_file_registered(&self, name: &str) -> bool {
        self.file_lock(name).is_some()
    }

    fn file_lock(&self, name: &str) -> Option<KeyLock> {
        let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.get(name).cloned()
    }

    /// Hold the global file-creation lock
    ///
    /// Covers an "exists? then create" decision so two transactions cannot
    /// both decide to create the same file.
    pub async fn lock_creation(&self) -> MutexGuard<'_, ()> {
        self.creation.lock().await
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
