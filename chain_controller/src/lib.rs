//! The block and transaction controller.
//!
//! This crate handles the following concerns:
//! - Applying blocks pushed from the network or produced locally.
//! - Switching to better forks and restoring the old fork if the new one turns out to be invalid.
//! - Collecting pending transactions and packing them into generated blocks.
//! - Moving irreversible blocks from the [fork database](fork_database) to the [block log](block_log).
//! - [Creating the initial state](`ChainInitializer`) and replaying the block log on startup.
//! - Notifying other components of applied blocks and pending transactions.
//! - [Sharing the controller between threads](`SharedController`).
//!
//! The state held by the controller is made of nested undo sessions. Every block above the last
//! irreversible block has a session of its own. Pending transactions share one more session on top.

pub use crate::{
    controller::{AppliedBlockListener, Controller, PendingTransactionListener},
    error::Error,
    initializer::{ChainInitializer, GenesisInitializer},
    node_properties::{DebugUpdate, NodeProperties},
    shared::SharedController,
};

mod controller;
mod error;
mod initializer;
mod node_properties;
mod queries;
mod shared;

#[cfg(test)]
mod helpers;
