// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commit/abort orchestrator
//!
//! Drives transactions from `Open` through `CommitPending` until their
//! logs are dropped by a commit or an abort. Every operation on a
//! transaction holds its lock exclusively for the whole call. A commit
//! also holds the target file's lock from reading the base size until its
//! logs are gone, so no two commit markers on one file overlap.

use crate::error::EngineError;
use crate::recovery::RecoveryReport;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use txf_core::{
    is_valid_target_name, txn_field, CommitMarker, ErrorCode, Request, Response, Status,
    Transaction, TxnId, TxnState,
};
use txf_storage::{
    BuildStatus, FileStore, LockMode, LockRegistry, StoreError, TxnGuard, TxnLog, WalError,
    WriteOutcome,
};

/// Result of a commit attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Payload appended to the target; `bytes` is its length
    Committed { bytes: usize },
    /// Fragments still missing; the commit stays pending
    Missing(Vec<u64>),
}

/// Result of a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteReply {
    /// Fragment logged; no commit was pending
    Logged(WriteOutcome),
    /// Fragment logged and the pending commit was re-attempted
    Commit(CommitOutcome),
}

/// Transaction engine
pub struct Engine {
    pub(crate) wal: TxnLog,
    pub(crate) txns: Mutex<HashMap<TxnId, Transaction>>,
}

impl Engine {
    pub fn new(store: FileStore, registry: Arc<LockRegistry>) -> Self {
        Self {
            wal: TxnLog::new(store, registry),
            txns: Mutex::new(HashMap::new()),
        }
    }

    /// Open an engine over `dir` and recover any transactions left there
    pub async fn open(dir: &Path) -> Result<(Self, RecoveryReport), EngineError> {
        let store = FileStore::open(dir)?;
        let engine = Self::new(store, Arc::new(LockRegistry::new()));
        let report = engine.recover().await?;
        Ok((engine, report))
    }

    pub fn store(&self) -> &FileStore {
        self.wal.store()
    }

    pub fn registry(&self) -> &Arc<LockRegistry> {
        self.wal.registry()
    }

    /// Snapshot of a live transaction
    pub fn transaction(&self, id: TxnId) -> Option<Transaction> {
        self.txns
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }

    /// Ids of live transactions, ascending
    pub fn live_transactions(&self) -> Vec<TxnId> {
        self.registry().live_txns()
    }

    pub(crate) fn insert(&self, txn: Transaction) {
        let mut txns = self.txns.lock().unwrap_or_else(|e| e.into_inner());
        txns.insert(txn.id, txn);
    }

    fn update(&self, id: TxnId, f: impl FnOnce(&mut Transaction)) {
        let mut txns = self.txns.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(txn) = txns.get_mut(&id) {
            f(txn);
        }
    }

    /// Start a transaction that will append to `filename`
    pub async fn new_txn(&self, filename: &str) -> Result<TxnId, EngineError> {
        let id = self.wal.begin(filename).await?;
        self.insert(Transaction::new(id, filename));
        info!(txn = %id, file = filename, "new transaction");
        Ok(id)
    }

    /// Log fragment `seq` of a transaction
    ///
    /// If a commit was already requested, it is re-attempted once the
    /// fragment is durable.
    pub async fn write(&self, id: TxnId, seq: u64, data: &[u8]) -> Result<WriteReply, EngineError> {
        if seq == 0 {
            return Err(EngineError::Malformed(
                "sequence numbers start at 1".to_string(),
            ));
        }

        let guard = self.registry().acquire_txn(id, LockMode::Exclusive).await?;
        let outcome = self.wal.write_locked(&guard, seq, data.len(), data)?;
        self.update(id, |txn| txn.record_write(seq));
        debug!(txn = %id, seq, len = data.len(), ?outcome, "fragment logged");

        match self.wal.read_intent(&guard)? {
            Some(intent) => {
                debug!(txn = %id, total = intent.total, "re-attempting pending commit");
                let outcome = self.commit_locked(guard, intent.total).await?;
                Ok(WriteReply::Commit(outcome))
            }
            None => Ok(WriteReply::Logged(outcome)),
        }
    }

    /// Commit the first `total` fragments of a transaction
    pub async fn commit(&self, id: TxnId, total: u64) -> Result<CommitOutcome, EngineError> {
        let guard = self.registry().acquire_txn(id, LockMode::Exclusive).await?;
        self.commit_locked(guard, total).await
    }

    pub(crate) async fn commit_locked(
        &self,
        guard: TxnGuard,
        total: u64,
    ) -> Result<CommitOutcome, EngineError> {
        let id = guard.id();
        if !self.store().exists(&id.log_file())? {
            return Err(WalError::LogMissing(id).into());
        }

        self.wal.record_intent(&guard, total)?;
        self.update(id, |txn| txn.request_commit(total));

        let build = self.wal.build(&guard, total)?;
        if let BuildStatus::Incomplete { missing } = build.status {
            debug!(txn = %id, total, missing = missing.len(), "commit incomplete");
            return Ok(CommitOutcome::Missing(missing));
        }

        let file = self
            .registry()
            .acquire_file(&build.target, LockMode::Exclusive)
            .await;
        let base_size = self.target_size(&build.target)?;
        let log_len = self.store().size(&id.log_file())?;
        self.wal.append_marker(
            &guard,
            CommitMarker {
                count: total,
                base_size,
            },
        )?;
        if let Err(e) = self.append_payload(&build.target, &build.payload).await {
            self.roll_back(&build.target, base_size);
            if let Err(retract) = self.wal.retract_marker(&guard, log_len) {
                warn!(txn = %id, error = %retract, "could not retract commit marker");
            }
            return Err(e);
        }

        self.finish(guard, TxnState::Committed);
        drop(file);
        info!(
            txn = %id,
            file = %build.target,
            fragments = total,
            bytes = build.payload.len(),
            "transaction committed"
        );
        Ok(CommitOutcome::Committed {
            bytes: build.payload.len(),
        })
    }

    /// Size of a target file, 0 if it does not exist yet
    pub(crate) fn target_size(&self, target: &str) -> Result<u64, StoreError> {
        match self.store().size(target) {
            Ok(size) => Ok(size),
            Err(StoreError::NotFound(_)) => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Append a built payload, creating the target if needed
    ///
    /// Caller holds the target's file lock exclusively.
    pub(crate) async fn append_payload(
        &self,
        target: &str,
        payload: &[u8],
    ) -> Result<(), EngineError> {
        {
            let _creation = self.registry().lock_creation().await;
            if !self.store().exists(target)? {
                self.store().create(target)?;
                debug!(file = target, "created target file");
            }
        }
        self.store().append(target, payload)?;
        Ok(())
    }

    fn roll_back(&self, target: &str, base_size: u64) {
        match self.store().truncate(target, base_size) {
            Ok(()) | Err(StoreError::NotFound(_)) => {}
            Err(e) => warn!(file = target, base_size, error = %e, "could not roll back target"),
        }
    }

    /// Drop a finished transaction's logs and free its id
    ///
    /// When a log cannot be deleted the id is retired instead, so it is not
    /// handed out again before the next start reconciles the leftover log.
    pub(crate) fn finish(&self, guard: TxnGuard, end: TxnState) {
        let id = guard.id();
        if self.wal.discard(&guard) {
            self.forget(id, end);
        } else {
            warn!(txn = %id, "transaction logs left behind, retiring id");
            self.registry().retire_txn(id);
            self.close(id, end);
        }
    }

    fn forget(&self, id: TxnId, end: TxnState) {
        self.registry().remove_txn(id);
        self.close(id, end);
    }

    fn close(&self, id: TxnId, end: TxnState) {
        let mut txns = self.txns.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(mut txn) = txns.remove(&id) {
            txn.close(end);
            debug!(txn = %id, file = %txn.target, state = %txn.state, "transaction closed");
        }
    }

    /// Discard a transaction and everything it logged
    pub async fn abort(&self, id: TxnId) -> Result<(), EngineError> {
        let guard = self.registry().acquire_txn(id, LockMode::Exclusive).await?;
        if !self.wal.discard(&guard) {
            return Err(EngineError::Cleanup(id));
        }
        self.forget(id, TxnState::Aborted);
        info!(txn = %id, "transaction aborted");
        Ok(())
    }

    /// Read a file under a shared lock
    pub async fn read(&self, filename: &str) -> Result<Vec<u8>, EngineError> {
        if !is_valid_target_name(filename) {
            return Err(EngineError::Malformed(format!(
                "invalid filename {:?}",
                filename
            )));
        }
        let _file = self
            .registry()
            .acquire_file(filename, LockMode::Shared)
            .await;
        self.store().read_all(filename).map_err(|e| match e {
            StoreError::NotFound(name) => EngineError::NotFound(name),
            other => other.into(),
        })
    }

    /// Handle a decoded request, producing the responses to send back
    pub async fn handle(&self, request: Request) -> Vec<Response> {
        let method = request.method();
        let responses = match request {
            Request::NewTxn { filename } => match self.new_txn(&filename).await {
                Ok(id) => vec![Response::ack(id, 0)],
                Err(e) => vec![error_response(-1, 0, &e)],
            },
            Request::Write { txn, seq, data } => match self.write(txn, seq, &data).await {
                Ok(WriteReply::Logged(_)) | Ok(WriteReply::Commit(CommitOutcome::Missing(_))) => {
                    vec![Response::ack(txn, seq)]
                }
                Ok(WriteReply::Commit(CommitOutcome::Committed { .. })) => {
                    vec![Response::success(txn, seq)]
                }
                Err(e) => vec![error_response(txn_field(txn), seq, &e)],
            },
            Request::Read { filename } => match self.read(&filename).await {
                Ok(contents) => vec![Response::new(Status::Ack, -1, 0).with_reason(contents)],
                Err(e) => vec![error_response(-1, 0, &e)],
            },
            Request::Commit { txn, total } => match self.commit(txn, total).await {
                Ok(CommitOutcome::Committed { .. }) => vec![Response::success(txn, total)],
                Ok(CommitOutcome::Missing(missing)) => missing_responses(txn, &missing),
                Err(e) => vec![error_response(txn_field(txn), total, &e)],
            },
            Request::Abort { txn } => match self.abort(txn).await {
                Ok(()) => vec![Response::ack(txn, 0)],
                Err(e) => vec![error_response(txn_field(txn), 0, &e)],
            },
        };
        if responses.iter().any(Response::is_error) {
            debug!(%method, responses = responses.len(), "request failed");
        }
        responses
    }
}

fn error_response(txn: i64, seq: u64, err: &EngineError) -> Response {
    if err.code() == ErrorCode::Io {
        warn!(txn, seq, error = %err, "i/o fault");
    }
    Response::error(txn, seq, err.code(), err.to_string())
}

/// One `ERROR 207` per missing sequence, each carrying the full list
fn missing_responses(txn: TxnId, missing: &[u64]) -> Vec<Response> {
    let reason = missing
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    missing
        .iter()
        .map(|&seq| {
            Response::error(
                txn_field(txn),
                seq,
                ErrorCode::MissingSequence,
                reason.clone(),
            )
        })
        .collect()
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
