//! A contract that stores the latest memo posted by each account.

use anyhow::{ensure, Result};
use chain_controller::GenesisInitializer;
use log::info;
use thiserror::Error;
use transition_functions::MessageHandlers;
use types::{
    containers::{Message, SignedTransaction, Transaction},
    keys::SecretKey,
    primitives::{AccountName, BlockId, UnixSeconds},
};

pub const MEMO_CONTRACT: &str = "memo";
pub const POST: &str = "post";
pub const LATEST_MEMO: &str = "latest";
pub const MAX_MEMO_LENGTH: usize = 256;

#[derive(Debug, Error)]
pub enum Error {
    #[error("memo is empty")]
    EmptyMemo,
    #[error("memo is too long (length: {length}, maximum: {MAX_MEMO_LENGTH})")]
    MemoTooLong { length: usize },
    #[error("memo must be posted by exactly one author")]
    MissingAuthor,
}

/// Creates the contract account and registers the message type.
#[must_use]
pub fn install(initializer: GenesisInitializer) -> GenesisInitializer {
    initializer
        .with_account(MEMO_CONTRACT, None)
        .with_message_type(MEMO_CONTRACT, POST)
}

pub fn handlers() -> MessageHandlers {
    let mut handlers = MessageHandlers::new();

    handlers.set_validate_handler(MEMO_CONTRACT, None, POST, |context| {
        let length = context.message.data.len();

        ensure!(length > 0, Error::EmptyMemo);
        ensure!(length <= MAX_MEMO_LENGTH, Error::MemoTooLong { length });
        ensure!(context.message.authorization.len() == 1, Error::MissingAuthor);

        core::str::from_utf8(&context.message.data)?;

        Ok(())
    });

    handlers.set_apply_handler(MEMO_CONTRACT, None, POST, |context| {
        let message = context.message;
        let author = message.authorization.first().ok_or(Error::MissingAuthor)?;

        context.set_storage_row(format!("{LATEST_MEMO}/{author}"), message.data.clone());

        info!("{author} posted memo: {}", String::from_utf8_lossy(&message.data));

        Ok(())
    });

    handlers
}

pub fn post(
    text: &str,
    author: &AccountName,
    secret_key: &SecretKey,
    reference_block: BlockId,
    expiration: UnixSeconds,
) -> SignedTransaction {
    let message =
        Message::new(MEMO_CONTRACT, POST, text).with_authorization([author.clone()]);

    let mut transaction = SignedTransaction::from(Transaction {
        expiration,
        messages: vec![message],
        ..Transaction::default()
    });

    transaction.transaction.set_reference_block(reference_block);
    transaction.sign(secret_key);
    transaction
}
