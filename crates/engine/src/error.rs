// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the transaction engine

use thiserror::Error;
use txf_core::{ErrorCode, TxnId};
use txf_storage::{RegistryError, StoreError, WalError};

/// Errors that can occur while handling a request
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("could not remove logs of transaction {0}")]
    Cleanup(TxnId),
    #[error(transparent)]
    Wal(#[from] WalError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RegistryError> for EngineError {
    fn from(err: RegistryError) -> Self {
        EngineError::Wal(err.into())
    }
}

impl EngineError {
    /// Wire error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Malformed(_) => ErrorCode::Malformed,
            EngineError::NotFound(_) => ErrorCode::NotFound,
            EngineError::Cleanup(_) => ErrorCode::Io,
            EngineError::Wal(e) => match e {
                WalError::UnknownTransaction(_) => ErrorCode::UnknownTransaction,
                WalError::LogMissing(_) => ErrorCode::NotFound,
                WalError::InvalidTarget(_) | WalError::LengthMismatch { .. } => {
                    ErrorCode::Malformed
                }
                WalError::Store(e) => store_code(e),
                WalError::Allocation(_)
                | WalError::WriteVerificationFailed { .. }
                | WalError::Corrupt { .. }
                | WalError::Intent(_) => ErrorCode::Io,
            },
            EngineError::Store(e) => store_code(e),
        }
    }
}

fn store_code(err: &StoreError) -> ErrorCode {
    match err {
        StoreError::NotFound(_) => ErrorCode::NotFound,
        StoreError::InvalidName(_) => ErrorCode::Malformed,
        StoreError::Io { .. } => ErrorCode::Io,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        unknown = { EngineError::Wal(WalError::UnknownTransaction(TxnId(1))), ErrorCode::UnknownTransaction },
        log_missing = { EngineError::Wal(WalError::LogMissing(TxnId(1))), ErrorCode::NotFound },
        bad_target = { EngineError::Wal(WalError::InvalidTarget("a/b".into())), ErrorCode::Malformed },
        verification = { EngineError::Wal(WalError::WriteVerificationFailed { txn: TxnId(1), seq: 2 }), ErrorCode::Io },
        malformed = { EngineError::Malformed("seq 0".into()), ErrorCode::Malformed },
        not_found = { EngineError::NotFound("x".into()), ErrorCode::NotFound },
        store_io = { EngineError::Store(StoreError::Io { name: "x".into(), source: std::io::Error::other("disk") }), ErrorCode::Io },
        registry = { EngineError::from(RegistryError::UnknownTransaction(TxnId(3))), ErrorCode::UnknownTransaction },
    )]
    fn error_codes(err: EngineError, code: ErrorCode) {
        assert_eq!(err.code(), code);
    }
}
