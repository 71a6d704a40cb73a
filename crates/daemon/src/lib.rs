// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! txf-daemon: TCP front end for the transactional file store

pub mod lifecycle;
pub mod protocol;
pub mod server;

pub use lifecycle::{startup, Config, Daemon, LifecycleError};
pub use protocol::{encode_request, read_request, read_response, write_response, ProtocolError};
pub use server::{handle_connection, Server, ServerError};
