//! Index of blocks that are not irreversible yet.
//!
//! Every block in the index links to its parent, forming a tree rooted at the anchor.
//! The anchor is the block all other blocks descend from, normally the last irreversible block.
//! Right after genesis there is no anchor block, so the first block pushed determines which
//! parent ID the roots of the tree must have.
//!
//! The head is the best block in the index. Blocks are ranked by block number.
//! Blocks with equal numbers are ranked by ID, lower IDs first. The ranking does not depend on
//! the order in which blocks are received.
//!
//! The index does not validate blocks. Blocks that turn out to be invalid must be removed along
//! with their descendants using [`ForkDatabase::remove`].

pub use crate::{
    error::Error,
    fork_database::{Branches, ForkDatabase},
    misc::ChainLink,
};

mod error;
mod fork_database;
mod misc;
