// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Concierge integration tests.
//!
//! Provides in-memory and fault-injecting stores, a mock assistant delegate,
//! and a harness that wires them to a fast-polling configuration.
//!
//! # Components
//!
//! - [`MemoryStore`] - In-memory store with the SQLite store's rules
//! - [`SwitchableStore`] - Wrapper with a switchable push feed and failure injection
//! - [`MockDelegate`] - Assistant delegate that replies into the store or fails
//! - [`TestHarness`] - Store, delegate and config assembled for a test

pub mod fixtures;
pub mod harness;
pub mod memory_store;
pub mod mock_delegate;
pub mod switchable;

pub use fixtures::{guest, staff};
pub use harness::{TestHarness, fast_polling, wait_for};
pub use memory_store::MemoryStore;
pub use mock_delegate::{DelegateBehavior, MockDelegate};
pub use switchable::SwitchableStore;
