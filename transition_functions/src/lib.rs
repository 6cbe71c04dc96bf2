//! Validation and application of transactions and blocks.
//!
//! Validation never mutates state. Application goes through [`database::Database`] undo sessions,
//! so a failing transaction only undoes its own changes.

pub use crate::{
    block_processing::{apply_block, validate_block_header},
    error::{BlockHeaderError, HandlerError, HandlerStage, ValidationError},
    handlers::{ApplyContext, MessageHandlers, PreconditionContext, ValidateContext},
    transaction_processing::{apply_transaction, process_message, validate_transaction},
};

mod block_processing;
mod error;
mod handlers;
mod transaction_processing;

#[cfg(test)]
mod test_utils;
