// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transaction log engine
//!
//! Manages the per-transaction log and commit-intent log. Data is durable
//! once it is synced to the transaction log, before the target file is ever
//! touched.
//!
//! Methods that take a [`TxnGuard`] expect the caller to hold that
//! transaction's lock exclusively for the whole read-modify-write.

use crate::builder::{self, Build};
use crate::registry::{LockMode, LockRegistry, RegistryError, TxnGuard};
use crate::store::{FileStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use txf_core::{
    encode_marker, encode_record, encode_target, is_valid_target_name, scan_log, CommitIntent,
    CommitMarker, IntentError, LogScan, ScanError, TxnId,
};

/// Errors from the transaction log engine
#[derive(Debug, Error)]
pub enum WalError {
    #[error("unknown transaction: {0}")]
    UnknownTransaction(TxnId),
    #[error("transaction log missing for transaction {0}")]
    LogMissing(TxnId),
    #[error("could not allocate a transaction: {0}")]
    Allocation(String),
    #[error("sequence {seq} of transaction {txn} not found after write")]
    WriteVerificationFailed { txn: TxnId, seq: u64 },
    #[error("content length {declared} does not match {actual} payload bytes")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("invalid target filename: {0:?}")]
    InvalidTarget(String),
    #[error("corrupt log for transaction {txn}: {source}")]
    Corrupt {
        txn: TxnId,
        #[source]
        source: ScanError,
    },
    #[error("commit intent error: {0}")]
    Intent(#[from] IntentError),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<RegistryError> for WalError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownTransaction(id) => WalError::UnknownTransaction(id),
            RegistryError::Exhausted => WalError::Allocation(err.to_string()),
        }
    }
}

/// Result of logging one fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Appended and verified
    Written,
    /// The sequence number was already logged; nothing was appended
    AlreadyWritten,
}

/// Whether a log holds a record for `seq`
///
/// An unreadable log holds nothing.
pub fn has_sequence(contents: &[u8], seq: u64) -> bool {
    scan_log(contents).is_ok_and(|scan| scan.has_sequence(seq))
}

/// Transaction log engine over a file store and lock registry
#[derive(Clone)]
pub struct TxnLog {
    store: FileStore,
    registry: Arc<LockRegistry>,
}

impl TxnLog {
    pub fn new(store: FileStore, registry: Arc<LockRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn registry(&self) -> &Arc<LockRegistry> {
        &self.registry
    }

    /// Start a transaction targeting `target`
    ///
    /// Creates the transaction log (first line = target) and an empty
    /// commit-intent log. An id whose log is still on disk is retired and
    /// allocation moves on to the next free one.
    pub async fn begin(&self, target: &str) -> Result<TxnId, WalError> {
        if !is_valid_target_name(target) {
            return Err(WalError::InvalidTarget(target.to_string()));
        }

        loop {
            let id = self.registry.allocate_txn_id().await?;
            let guard = match self.registry.acquire_txn(id, LockMode::Exclusive).await {
                Ok(guard) => guard,
                Err(e) => {
                    self.registry.remove_txn(id);
                    return Err(WalError::Allocation(e.to_string()));
                }
            };

            match self.store.exists(&id.log_file()) {
                Ok(false) => {}
                Ok(true) => {
                    warn!(txn = %id, "stale transaction log found, retiring id");
                    self.registry.retire_txn(id);
                    continue;
                }
                Err(e) => {
                    self.registry.remove_txn(id);
                    return Err(e.into());
                }
            }

            if let Err(e) = self.create_logs(&guard, target) {
                self.discard(&guard);
                self.registry.remove_txn(id);
                return Err(e);
            }

            debug!(txn = %id, file = target, "transaction started");
            return Ok(id);
        }
    }

    fn create_logs(&self, guard: &TxnGuard, target: &str) -> Result<(), WalError> {
        let id = guard.id();
        self.store.create(&id.log_file())?;
        self.store.append(&id.log_file(), &encode_target(target))?;
        self.store.create(&id.intent_file())?;
        Ok(())
    }

    /// Log one fragment, acquiring the transaction's lock
    pub async fn write(
        &self,
        id: TxnId,
        seq: u64,
        len: usize,
        payload: &[u8],
    ) -> Result<WriteOutcome, WalError> {
        let guard = self.registry.acquire_txn(id, LockMode::Exclusive).await?;
        self.write_locked(&guard, seq, len, payload)
    }

    /// Log one fragment under a held lock
    ///
    /// A sequence number already in the log is acknowledged without
    /// appending, whatever the new payload is.
    pub fn write_locked(
        &self,
        guard: &TxnGuard,
        seq: u64,
        len: usize,
        payload: &[u8],
    ) -> Result<WriteOutcome, WalError> {
        if len != payload.len() {
            return Err(WalError::LengthMismatch {
                declared: len,
                actual: payload.len(),
            });
        }

        let id = guard.id();
        let log = id.log_file();
        let contents = self.read_log(guard)?;
        let scan = scan(id, &contents)?;
        if scan.has_sequence(seq) {
            debug!(txn = %id, seq, "sequence already logged");
            return Ok(WriteOutcome::AlreadyWritten);
        }

        if scan.is_torn(contents.len()) {
            warn!(
                txn = %id,
                valid_len = scan.valid_len,
                len = contents.len(),
                "dropping torn tail of transaction log"
            );
            self.store.truncate(&log, scan.valid_len as u64)?;
        }

        self.store.append(&log, &encode_record(seq, payload))?;

        let after = self.read_log(guard)?;
        if !has_sequence(&after, seq) {
            return Err(WalError::WriteVerificationFailed { txn: id, seq });
        }
        Ok(WriteOutcome::Written)
    }

    /// Read the transaction log
    pub fn read_log(&self, guard: &TxnGuard) -> Result<Vec<u8>, WalError> {
        let id = guard.id();
        self.store.read_all(&id.log_file()).map_err(|e| match e {
            StoreError::NotFound(_) => WalError::LogMissing(id),
            other => other.into(),
        })
    }

    /// Build the payload for a commit of `expected` fragments
    pub fn build(&self, guard: &TxnGuard, expected: u64) -> Result<Build, WalError> {
        let contents = self.read_log(guard)?;
        builder::build(&contents, expected).map_err(|source| WalError::Corrupt {
            txn: guard.id(),
            source,
        })
    }

    /// Durably record a commit request in the commit-intent log
    pub fn record_intent(&self, guard: &TxnGuard, total: u64) -> Result<CommitIntent, WalError> {
        let intent = CommitIntent::new(total);
        self.store
            .write_all(&guard.id().intent_file(), intent.to_line()?.as_bytes())?;
        Ok(intent)
    }

    /// Read the recorded commit request, if any
    pub fn read_intent(&self, guard: &TxnGuard) -> Result<Option<CommitIntent>, WalError> {
        match self.store.read_all(&guard.id().intent_file()) {
            Ok(contents) => Ok(CommitIntent::from_log(&contents)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Append the commit marker to the transaction log
    pub fn append_marker(&self, guard: &TxnGuard, marker: CommitMarker) -> Result<(), WalError> {
        let id = guard.id();
        self.store
            .append(&id.log_file(), &encode_marker(marker))
            .map_err(|e| match e {
                StoreError::NotFound(_) => WalError::LogMissing(id),
                other => other.into(),
            })
    }

    /// Remove a commit marker appended at `log_len`
    ///
    /// Used when the payload could not be applied after the marker was
    /// written, so the log no longer claims a commit at that base.
    pub fn retract_marker(&self, guard: &TxnGuard, log_len: u64) -> Result<(), WalError> {
        let id = guard.id();
        self.store
            .truncate(&id.log_file(), log_len)
            .map_err(|e| match e {
                StoreError::NotFound(_) => WalError::LogMissing(id),
                other => other.into(),
            })
    }

    /// Delete both logs of a transaction, tolerating ones already gone
    ///
    /// Returns whether both are now absent.
    pub fn discard(&self, guard: &TxnGuard) -> bool {
        let id = guard.id();
        let mut clean = true;
        for name in [id.log_file(), id.intent_file()] {
            match self.store.delete(&name) {
                Ok(()) | Err(StoreError::NotFound(_)) => {}
                Err(e) => {
                    warn!(txn = %id, file = %name, error = %e, "failed to delete log");
                    clean = false;
                }
            }
        }
        clean
    }
}

/// Scan a transaction's log, attributing errors to it
pub fn scan(id: TxnId, contents: &[u8]) -> Result<LogScan<'_>, WalError> {
    scan_log(contents).map_err(|source| WalError::Corrupt { txn: id, source })
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
