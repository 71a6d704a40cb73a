// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash recovery
//!
//! Runs once at startup, before any client is served. Every transaction log
//! left in the directory is either resumed (handed back to clients), rolled
//! forward (its commit re-applied), or aborted. Commit-intent logs with no
//! transaction log are removed.
//!
//! Logs holding a commit marker are settled per target file, in order of
//! the base size each marker recorded. A marker counts as applied when the
//! target ends where its payload ends, or when another marker on the same
//! target starts there. Applied payloads are never truncated.

use crate::engine::Engine;
use crate::error::EngineError;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};
use txf_core::{FileKind, Transaction, TxnId, TxnState};
use txf_storage::{scan, LockMode, StoreError, TxnGuard};

/// Statistics from a recovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Open transactions handed back to clients
    pub resumed: usize,
    /// Transactions with a commit requested but not yet buildable
    pub pending: usize,
    /// Commits already applied; only cleanup was left
    pub completed: usize,
    /// Commits re-applied to the target
    pub redone: usize,
    /// Transactions that could not be reconciled and were discarded
    pub aborted: usize,
    /// Intent logs without a transaction log, deleted
    pub orphans_removed: usize,
    /// Transactions skipped because of I/O errors
    pub errors: usize,
}

impl RecoveryReport {
    /// Number of transactions still live after recovery
    pub fn live(&self) -> usize {
        self.resumed + self.pending
    }

    fn tally(&mut self, id: TxnId, result: Result<Recovered, EngineError>) {
        match result {
            Ok(Recovered::Resumed) => self.resumed += 1,
            Ok(Recovered::Pending) => self.pending += 1,
            Ok(Recovered::Completed) => self.completed += 1,
            Ok(Recovered::Redone) => self.redone += 1,
            Ok(Recovered::Aborted) => self.aborted += 1,
            Err(e) => {
                warn!(txn = %id, error = %e, "could not recover transaction");
                self.errors += 1;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovered {
    Resumed,
    Pending,
    Completed,
    Redone,
    Aborted,
}

/// A log with a complete commit whose target still has to be checked
struct Marked {
    guard: TxnGuard,
    base: u64,
    payload: Vec<u8>,
}

impl Marked {
    fn end(&self) -> Option<u64> {
        self.base.checked_add(self.payload.len() as u64)
    }
}

enum Inspected {
    Settled(Recovered),
    Marked { target: String, marked: Marked },
}

impl Engine {
    /// Reconcile the directory with the transaction logs found in it
    ///
    /// Fails only if the directory cannot be listed.
    pub async fn recover(&self) -> Result<RecoveryReport, EngineError> {
        let mut report = RecoveryReport::default();
        let mut logs = BTreeSet::new();
        let mut intents = BTreeSet::new();

        for name in self.store().list()? {
            match FileKind::classify(&name) {
                FileKind::Log(id) => {
                    logs.insert(id);
                }
                FileKind::Intent(id) => {
                    intents.insert(id);
                }
                FileKind::Target => self.registry().register_file(&name).await,
            }
        }

        for id in intents.difference(&logs) {
            match self.store().delete(&id.intent_file()) {
                Ok(()) | Err(StoreError::NotFound(_)) => {
                    debug!(txn = %id, "removed orphan commit intent");
                    report.orphans_removed += 1;
                }
                Err(e) => {
                    warn!(txn = %id, error = %e, "could not remove orphan commit intent");
                    report.errors += 1;
                }
            }
        }

        let mut by_target: BTreeMap<String, Vec<Marked>> = BTreeMap::new();
        for &id in &logs {
            match self.inspect(id).await {
                Ok(Inspected::Settled(recovered)) => report.tally(id, Ok(recovered)),
                Ok(Inspected::Marked { target, marked }) => {
                    by_target.entry(target).or_default().push(marked);
                }
                Err(e) => report.tally(id, Err(e)),
            }
        }

        for (target, marked) in by_target {
            for (id, result) in self.settle_target(&target, marked).await {
                report.tally(id, result);
            }
        }

        info!(
            resumed = report.resumed,
            pending = report.pending,
            completed = report.completed,
            redone = report.redone,
            aborted = report.aborted,
            orphans = report.orphans_removed,
            errors = report.errors,
            "recovery complete"
        );
        Ok(report)
    }

    /// Load one log, settling it unless its commit needs the target checked
    async fn inspect(&self, id: TxnId) -> Result<Inspected, EngineError> {
        if !self.registry().register_txn(id) {
            debug!(txn = %id, "transaction already live");
            return Ok(Inspected::Settled(Recovered::Resumed));
        }
        let guard = match self.registry().acquire_txn(id, LockMode::Exclusive).await {
            Ok(guard) => guard,
            Err(e) => {
                self.registry().remove_txn(id);
                return Err(e.into());
            }
        };

        let contents = match self.wal.read_log(&guard) {
            Ok(contents) => contents,
            Err(e) => {
                self.registry().remove_txn(id);
                return Err(e.into());
            }
        };
        let scan = match scan(id, &contents) {
            Ok(scan) => scan,
            Err(e) => {
                warn!(txn = %id, error = %e, "unreadable transaction log, aborting");
                return Ok(Inspected::Settled(self.abort_recovered(guard)));
            }
        };

        let mut txn = Transaction::new(id, scan.target);
        txn.written = scan.sequences();
        let intent = self.wal.read_intent(&guard)?;
        if let Some(intent) = &intent {
            txn.request_commit(intent.total);
        }

        let Some(marker) = scan.marker else {
            let recovered = if intent.is_some() {
                Recovered::Pending
            } else {
                Recovered::Resumed
            };
            debug!(txn = %id, state = %txn.state, "resuming transaction");
            self.insert(txn);
            return Ok(Inspected::Settled(recovered));
        };

        let build = self.wal.build(&guard, marker.count)?;
        if !build.is_complete() {
            warn!(txn = %id, count = marker.count, "commit marker without every fragment");
            txn.request_commit(marker.count);
            self.insert(txn);
            return Ok(Inspected::Settled(Recovered::Pending));
        }

        Ok(Inspected::Marked {
            target: build.target,
            marked: Marked {
                guard,
                base: marker.base_size,
                payload: build.payload,
            },
        })
    }

    /// Settle every marked commit on one target under its file lock
    async fn settle_target(
        &self,
        target: &str,
        mut marked: Vec<Marked>,
    ) -> Vec<(TxnId, Result<Recovered, EngineError>)> {
        let _file = self
            .registry()
            .acquire_file(target, LockMode::Exclusive)
            .await;
        let mut size = match self.target_size(target) {
            Ok(size) => size,
            Err(e) => {
                warn!(file = target, error = %e, "target unreadable, aborting its commits");
                return marked
                    .into_iter()
                    .map(|m| (m.guard.id(), Ok(self.abort_recovered(m.guard))))
                    .collect();
            }
        };

        marked.sort_by_key(|m| (m.base, m.guard.id()));
        let applied: Vec<bool> = marked
            .iter()
            .enumerate()
            .map(|(i, m)| {
                m.end().is_some_and(|end| {
                    end <= size
                        && (end == size
                            || marked
                                .iter()
                                .enumerate()
                                .any(|(j, other)| j != i && other.base == end))
                })
            })
            .collect();
        // Bytes below the floor belong to applied commits
        let mut floor = marked
            .iter()
            .zip(&applied)
            .filter(|(_, done)| **done)
            .filter_map(|(m, _)| m.end())
            .max()
            .unwrap_or(0);

        let (done, redo): (Vec<_>, Vec<_>) = marked
            .into_iter()
            .zip(applied)
            .partition(|(_, done)| *done);

        let mut settled = Vec::new();
        for (m, _) in done {
            let id = m.guard.id();
            debug!(txn = %id, "commit already applied, cleaning up");
            self.finish(m.guard, TxnState::Committed);
            settled.push((id, Ok(Recovered::Completed)));
        }

        for (m, _) in redo {
            let id = m.guard.id();
            if m.base >= floor && size < m.base {
                warn!(
                    txn = %id,
                    file = target,
                    size,
                    base = m.base,
                    "target shorter than recorded base, aborting"
                );
                settled.push((id, Ok(self.abort_recovered(m.guard))));
                continue;
            }

            // A base under the floor was rolled back before a later commit
            // applied; its payload goes after everything applied since.
            let at = if m.base >= floor { m.base } else { size };
            let len = m.payload.len() as u64;
            match self.reapply(target, at, size, &m.payload).await {
                Ok(()) => {
                    size = at + len;
                    floor = size;
                    info!(txn = %id, file = target, at, bytes = len, "commit re-applied");
                    self.finish(m.guard, TxnState::Committed);
                    settled.push((id, Ok(Recovered::Redone)));
                }
                Err(e) => settled.push((id, Err(e))),
            }
        }
        settled
    }

    async fn reapply(
        &self,
        target: &str,
        at: u64,
        size: u64,
        payload: &[u8],
    ) -> Result<(), EngineError> {
        if size > at {
            self.store().truncate(target, at)?;
        }
        self.append_payload(target, payload).await
    }

    fn abort_recovered(&self, guard: TxnGuard) -> Recovered {
        self.finish(guard, TxnState::Aborted);
        Recovered::Aborted
    }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
