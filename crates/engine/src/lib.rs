// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! txf-engine: transaction orchestration and crash recovery

mod engine;
mod error;
mod recovery;

pub use engine::{CommitOutcome, Engine, WriteReply};
pub use error::EngineError;
pub use recovery::RecoveryReport;
