use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use chain_controller::{Controller, SharedController};
use log::info;
use thiserror::Error;
use types::{
    containers::SignedBlock, keys::SecretKey, nonstandard::SkipFlags, primitives::AccountName,
};

use crate::memo;

const MEMO_LIFETIME_SECONDS: u64 = 60;

/// Produces blocks for every producer it holds keys for.
///
/// Slots are simulated. Every block is produced in the slot right after the head.
pub struct LocalProducer {
    controller: SharedController,
    secret_keys: HashMap<AccountName, SecretKey>,
}

impl LocalProducer {
    pub fn new(
        controller: SharedController,
        secret_keys: impl IntoIterator<Item = (AccountName, SecretKey)>,
    ) -> Self {
        Self {
            controller,
            secret_keys: secret_keys.into_iter().collect(),
        }
    }

    /// Posts a memo authored by the producer of the next block.
    pub fn post_memo(&self, text: &str) -> Result<()> {
        let mut controller = self.controller.write();
        let (producer, secret_key) = self.next_producer(&controller)?;

        let transaction = memo::post(
            text,
            producer,
            secret_key,
            controller.head_block_id(),
            controller.head_block_time() + MEMO_LIFETIME_SECONDS,
        );

        controller.push_transaction(transaction, SkipFlags::empty())
    }

    pub fn produce_block(&self) -> Result<Arc<SignedBlock>> {
        let mut controller = self.controller.write();
        let (producer, secret_key) = self.next_producer(&controller)?;
        let when = controller.get_slot_time(1);

        let block = controller.generate_block(when, producer, secret_key, SkipFlags::empty())?;

        info!(
            "produced block {} by {producer} with {} transactions \
             (last irreversible block: {})",
            block.block_number(),
            block.transactions.len(),
            controller.last_irreversible_block_num(),
        );

        Ok(block)
    }

    fn next_producer(
        &self,
        controller: &Controller,
    ) -> Result<(&AccountName, &SecretKey)> {
        let producer = controller
            .get_scheduled_producer(1)
            .ok_or(Error::NoProducers)?;

        let (producer, secret_key) = self
            .secret_keys
            .get_key_value(producer)
            .ok_or_else(|| Error::MissingKey {
                producer: producer.clone(),
            })?;

        Ok((producer, secret_key))
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("no producer is scheduled")]
    NoProducers,
    #[error("no key for {producer}")]
    MissingKey { producer: AccountName },
}
