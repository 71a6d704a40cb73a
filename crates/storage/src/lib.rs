// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! txf-storage: locks, durable files, and transaction logs

mod builder;
mod registry;
mod store;
mod wal;

pub use builder::{build, Build, BuildStatus, MAX_REPORTED_MISSING};
pub use registry::{FileGuard, LockMode, LockRegistry, RegistryError, TxnGuard};
pub use store::{FileStore, StoreError};
pub use wal::{has_sequence, scan, TxnLog, WalError, WriteOutcome};
