use std::{collections::BTreeMap, sync::Arc};

use anyhow::Result;
use helper_functions::misc;
use log::debug;
use types::{
    config::Config,
    containers::{SignedBlock, SignedTransaction},
    primitives::{AccountName, BlockId, BlockNumber, Slot, TransactionId, UnixSeconds},
    state::{ChainState, DynamicGlobalProperties, GlobalProperties},
};

use crate::{controller::Controller, error::Error, node_properties::NodeProperties};

impl Controller {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the state at the head including changes made by pending transactions.
    #[must_use]
    pub fn state(&self) -> &ChainState {
        self.database.state()
    }

    #[must_use]
    pub fn global_properties(&self) -> &GlobalProperties {
        &self.state().global_properties
    }

    #[must_use]
    pub fn dynamic_global_properties(&self) -> &DynamicGlobalProperties {
        &self.state().dynamic_global_properties
    }

    #[must_use]
    pub fn node_properties(&self) -> &NodeProperties {
        &self.node_properties
    }

    #[must_use]
    pub fn pending_transactions(&self) -> &[SignedTransaction] {
        &self.pending_transactions
    }

    #[must_use]
    pub fn head_block_num(&self) -> BlockNumber {
        self.dynamic_global_properties().head_block_number
    }

    #[must_use]
    pub fn head_block_id(&self) -> BlockId {
        self.dynamic_global_properties().head_block_id
    }

    #[must_use]
    pub fn head_block_time(&self) -> UnixSeconds {
        self.dynamic_global_properties().time
    }

    #[must_use]
    pub fn head_block_producer(&self) -> &AccountName {
        &self.dynamic_global_properties().current_producer
    }

    /// The result never decreases, even when blocks are popped or forks are switched.
    #[must_use]
    pub fn last_irreversible_block_num(&self) -> BlockNumber {
        self.dynamic_global_properties()
            .last_irreversible_block_num
            .max(self.irreversible_block_num)
    }

    pub fn is_known_block(&self, block_id: BlockId) -> Result<bool> {
        if self.fork_database.is_known_block(block_id) {
            return Ok(true);
        }

        self.block_log.contains_block(block_id)
    }

    #[must_use]
    pub fn is_known_transaction(&self, transaction_id: TransactionId) -> bool {
        self.state().transactions.contains_key(&transaction_id)
    }

    /// Looks up a transaction that was included in a block and has not expired yet.
    #[must_use]
    pub fn get_recent_transaction(&self, transaction_id: TransactionId) -> Option<&SignedTransaction> {
        self.state()
            .transactions
            .get(&transaction_id)
            .map(|transaction_object| &transaction_object.transaction)
    }

    /// Returns the ID of the block with number `block_number` on the current chain.
    pub fn get_block_id_for_num(&self, block_number: BlockNumber) -> Result<BlockId> {
        if let Some(link) = self
            .fork_database
            .fetch_block_on_main_branch_by_number(block_number)
        {
            return Ok(link.block_id);
        }

        if block_number == self.head_block_num() {
            return Ok(self.head_block_id());
        }

        self.block_log
            .read_block_by_number(block_number)?
            .map(|block| block.id())
            .ok_or_else(|| Error::UnknownBlockNumber { block_number }.into())
    }

    pub fn fetch_block_by_id(&self, block_id: BlockId) -> Result<Option<Arc<SignedBlock>>> {
        if let Some(link) = self.fork_database.fetch_block(block_id) {
            return Ok(Some(Arc::clone(&link.block)));
        }

        Ok(self.block_log.read_block_by_id(block_id)?.map(Arc::new))
    }

    /// Returns the block with number `block_number` on the current chain.
    pub fn fetch_block_by_number(
        &self,
        block_number: BlockNumber,
    ) -> Result<Option<Arc<SignedBlock>>> {
        if let Some(link) = self
            .fork_database
            .fetch_block_on_main_branch_by_number(block_number)
        {
            return Ok(Some(Arc::clone(&link.block)));
        }

        Ok(self
            .block_log
            .read_block_by_number(block_number)?
            .map(Arc::new))
    }

    /// Returns the IDs of blocks that lead to `head_of_fork` but are not on the current chain,
    /// newest first.
    pub fn get_block_ids_on_fork(&self, head_of_fork: BlockId) -> Result<Vec<BlockId>> {
        let branches = self
            .fork_database
            .fetch_branch_from(head_of_fork, self.head_block_id())?;

        debug!(
            "fork of {head_of_fork:?} branches off at {:?}",
            branches.common_ancestor,
        );

        Ok(branches.first.iter().map(|link| link.block_id).collect())
    }

    #[must_use]
    pub const fn get_checkpoints(&self) -> &BTreeMap<BlockNumber, BlockId> {
        &self.checkpoints
    }

    #[must_use]
    pub fn before_last_checkpoint(&self) -> bool {
        self.checkpoints
            .last_key_value()
            .is_some_and(|(last_checkpoint, _)| self.head_block_num() <= *last_checkpoint)
    }

    #[must_use]
    pub fn get_slot_time(&self, slot: Slot) -> UnixSeconds {
        misc::get_slot_time(&self.config, self.state(), slot)
    }

    #[must_use]
    pub fn get_slot_at_time(&self, time: UnixSeconds) -> Slot {
        misc::get_slot_at_time(&self.config, self.state(), time)
    }

    #[must_use]
    pub fn get_scheduled_producer(&self, slot: Slot) -> Option<&AccountName> {
        misc::get_scheduled_producer(self.state(), slot)
    }

    /// Share of recent slots that were filled, in basis points.
    #[must_use]
    pub fn producer_participation_rate(&self) -> u16 {
        misc::producer_participation_rate(self.state())
    }

    /// Serializes the whole state to JSON.
    pub fn debug_dump(&self) -> Result<serde_json::Value> {
        let dump = serde_json::to_value(self.state())?;

        debug!("chain state at block {}: {dump}", self.head_block_num());

        Ok(dump)
    }
}
