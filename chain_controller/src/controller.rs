// This module contains every operation that changes the chain.
// Read-only queries are in `queries.rs`.

use core::mem;
use std::{
    collections::BTreeMap,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Instant,
};

use anyhow::{ensure, Result};
use block_log::BlockLog;
use database::Database;
use features::Feature;
use fork_database::{ChainLink, ForkDatabase};
use helper_functions::{accessors, misc};
use itertools::Itertools as _;
use log::{debug, info, warn};
use transition_functions::{BlockHeaderError, MessageHandlers};
use types::{
    config::{Config, GenerationFailurePolicy},
    containers::{BlockHeader, SignedBlock, SignedTransaction},
    keys::{SecretKey, SignatureBytes},
    nonstandard::{Skip, SkipFlags, REPLAY_SKIP_FLAGS},
    primitives::{AccountName, BlockId, BlockNumber, UnixSeconds, H256},
    state::ChainState,
};

use crate::{
    error::Error,
    initializer::{self, ChainInitializer},
    node_properties::{DebugUpdate, NodeProperties},
};

const REPLAY_PROGRESS_INTERVAL: BlockNumber = 1000;

/// Called once for every block that becomes part of the current chain.
pub type AppliedBlockListener = Box<dyn Fn(&SignedBlock) -> Result<()> + Send + Sync>;

/// Called once for every transaction accepted into the pending list.
pub type PendingTransactionListener = Box<dyn Fn(&SignedTransaction) -> Result<()> + Send + Sync>;

pub struct Controller {
    pub(crate) config: Arc<Config>,
    pub(crate) database: Database<ChainState>,
    pub(crate) fork_database: ForkDatabase,
    pub(crate) block_log: BlockLog,
    pub(crate) handlers: MessageHandlers,
    pub(crate) pending_transactions: Vec<SignedTransaction>,
    // The pending session is the topmost undo session when this is set.
    pending_session_open: bool,
    pub(crate) checkpoints: BTreeMap<BlockNumber, BlockId>,
    pub(crate) node_properties: NodeProperties,
    applied_block_listeners: Vec<AppliedBlockListener>,
    pending_transaction_listeners: Vec<PendingTransactionListener>,
    // Highest block number written to the block log. State may report a lower one after a pop.
    pub(crate) irreversible_block_num: BlockNumber,
}

impl Controller {
    /// Creates the initial state and replays every block in `block_log` on top of it.
    pub fn new(
        config: Arc<Config>,
        block_log: BlockLog,
        handlers: MessageHandlers,
        initializer: &impl ChainInitializer,
    ) -> Result<Self> {
        ensure!(config.is_valid(), Error::InvalidConfig);

        let state = initializer::genesis_state(&config, &handlers, initializer)?;

        let mut controller = Self {
            config,
            database: Database::new(state),
            fork_database: ForkDatabase::new(),
            block_log,
            handlers,
            pending_transactions: vec![],
            pending_session_open: false,
            checkpoints: BTreeMap::new(),
            node_properties: NodeProperties::default(),
            applied_block_listeners: vec![],
            pending_transaction_listeners: vec![],
            irreversible_block_num: 0,
        };

        controller.replay_block_log()?;

        Ok(controller)
    }

    pub fn on_applied_block(
        &mut self,
        listener: impl Fn(&SignedBlock) -> Result<()> + Send + Sync + 'static,
    ) {
        self.applied_block_listeners.push(Box::new(listener));
    }

    pub fn on_pending_transaction(
        &mut self,
        listener: impl Fn(&SignedTransaction) -> Result<()> + Send + Sync + 'static,
    ) {
        self.pending_transaction_listeners.push(Box::new(listener));
    }

    /// Applies `block` if it extends the best chain.
    ///
    /// Returns `true` if the block caused a switch to another fork.
    /// Pending transactions are reapplied on top of the new head. Those that no longer apply are
    /// dropped. Transactions from abandoned blocks are treated the same way.
    pub fn push_block(&mut self, block: Arc<SignedBlock>, skip: SkipFlags) -> Result<bool> {
        ensure!(
            block.previous.block_number() < BlockNumber::MAX,
            BlockHeaderError::BlockNumberOverflow {
                previous: block.previous,
            },
        );

        let mut skip = skip | self.node_properties.skip_flags;
        let block_number = block.block_number();

        if let Some(in_checkpoint) = self.checkpoints.get(&block_number).copied() {
            let in_block = block.id();

            ensure!(
                in_checkpoint == in_block,
                BlockHeaderError::CheckpointMismatch {
                    block_number,
                    in_checkpoint,
                    in_block,
                },
            );
        }

        if self
            .checkpoints
            .last_key_value()
            .is_some_and(|(last_checkpoint, _)| block_number <= *last_checkpoint)
        {
            skip = SkipFlags::all() - Skip::ForkDb;
        }

        let pending = self.take_pending()?;
        let mut requeued = vec![];
        let result = self.push_block_without_pending(block, skip, &mut requeued);

        requeued.extend(pending);
        self.restore_pending(requeued);

        result
    }

    /// Applies `transaction` on top of the pending state and adds it to the pending list.
    pub fn push_transaction(
        &mut self,
        transaction: SignedTransaction,
        skip: SkipFlags,
    ) -> Result<()> {
        self.apply_pending_transaction(&transaction, skip)?;

        for listener in &self.pending_transaction_listeners {
            if let Err(error) = listener(&transaction) {
                warn!(
                    "pending transaction listener failed (transaction: {:?}): {error:?}",
                    transaction.id(),
                );
            }
        }

        self.pending_transactions.push(transaction);

        Ok(())
    }

    /// Produces a block in the slot that contains `when` and pushes it.
    ///
    /// The block is timestamped with the start of the slot. Pending transactions are packed in the
    /// order they were pushed. Transactions that do not fit stay pending. Transactions that fail
    /// are handled according to [`Config::generation_failure_policy`].
    pub fn generate_block(
        &mut self,
        when: UnixSeconds,
        producer: &AccountName,
        secret_key: &SecretKey,
        skip: SkipFlags,
    ) -> Result<Arc<SignedBlock>> {
        let skip = skip | self.node_properties.skip_flags;
        let state = self.database.state();
        let slot = misc::get_slot_at_time(&self.config, state, when);

        ensure!(
            slot > 0,
            Error::NoSlotAtTime {
                time: when,
                head_time: state.dynamic_global_properties.time,
            },
        );

        let scheduled = misc::get_scheduled_producer(state, slot);

        ensure!(
            scheduled == Some(producer),
            Error::ProducerNotScheduled {
                producer: producer.clone(),
                slot,
                scheduled: scheduled.cloned(),
            },
        );

        if !skip.contains(Skip::ProducerSignature) {
            let signing_key = accessors::get_producer(state, producer)?.signing_key;

            ensure!(
                signing_key == secret_key.to_public_key(),
                Error::SigningKeyMismatch {
                    producer: producer.clone(),
                },
            );
        }

        let header = BlockHeader {
            previous: state.dynamic_global_properties.head_block_id,
            timestamp: misc::get_slot_time(&self.config, state, slot),
            transaction_merkle_root: H256::zero(),
            producer: producer.clone(),
        };

        let pending = self.take_pending()?;

        let (transactions, postponed) = match self.pack_transactions(&header, &pending, skip) {
            Ok(packed) => packed,
            Err(error) => {
                self.restore_pending(pending);
                return Err(error);
            }
        };

        let mut block = SignedBlock {
            header,
            producer_signature: SignatureBytes::zero(),
            transactions,
        };

        block.header.transaction_merkle_root = block.calculate_merkle_root();
        block.sign(secret_key);

        let block = Arc::new(block);

        features::log!(
            DebugBlockProducer,
            "generated block {} (producer: {producer}, transactions: {}, postponed: {}, block_id: {:?})",
            block.block_number(),
            block.transactions.len(),
            postponed.len(),
            block.id(),
        );

        let mut push_skip = skip;

        if Feature::TrustOwnBlockSignatures.is_enabled() {
            push_skip |= Skip::ProducerSignature;
        }

        self.pending_transactions = postponed;

        if let Err(error) = self.push_block(Arc::clone(&block), push_skip) {
            let mut transactions = block.transactions.clone();
            transactions.extend(self.take_pending()?);
            self.restore_pending(transactions);
            return Err(error);
        }

        Ok(block)
    }

    /// Undoes the head block.
    ///
    /// Transactions from the popped block are put back in front of pending transactions.
    /// Those that no longer apply are dropped.
    pub fn pop_block(&mut self) -> Result<Arc<SignedBlock>> {
        let head_block_number = self.head_block_num();

        ensure!(head_block_number > 0, Error::NoBlocksToPop);

        ensure!(
            head_block_number > self.last_irreversible_block_num(),
            Error::CannotPopIrreversible {
                block_number: head_block_number,
            },
        );

        let pending = self.take_pending()?;

        let link = match self.fork_database.pop_block() {
            Ok(link) => link,
            Err(error) => {
                self.restore_pending(pending);
                return Err(error);
            }
        };

        self.database.undo()?;

        debug!("popped block {head_block_number} ({:?})", link.block_id);

        let transactions = link
            .block
            .transactions
            .iter()
            .cloned()
            .chain(pending)
            .collect();

        self.restore_pending(transactions);

        Ok(link.block)
    }

    /// Discards pending transactions along with their changes to state.
    pub fn clear_pending(&mut self) -> Result<()> {
        self.take_pending().map(drop)
    }

    /// Runs `function` with the node's skip flags replaced by `skip_flags`.
    ///
    /// The previous flags are restored even if `function` panics.
    pub fn with_skip_flags<T>(
        &mut self,
        skip_flags: SkipFlags,
        function: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let saved = mem::replace(&mut self.node_properties.skip_flags, skip_flags);
        let result = panic::catch_unwind(AssertUnwindSafe(|| function(self)));

        self.node_properties.skip_flags = saved;

        result.unwrap_or_else(|payload| panic::resume_unwind(payload))
    }

    pub fn add_checkpoints(&mut self, checkpoints: impl IntoIterator<Item = (BlockNumber, BlockId)>) {
        self.checkpoints.extend(checkpoints);
    }

    /// Applies `update` to the head state and records it so that it survives later blocks.
    pub fn debug_update(&mut self, update: DebugUpdate) -> Result<()> {
        let pending = self.take_pending()?;
        let result = update.apply(self.database.state_mut());

        if result.is_ok() {
            debug!("applied debug update: {update:?}");
            self.node_properties.debug_updates.push(update);
        }

        self.restore_pending(pending);

        result
    }

    fn push_block_without_pending(
        &mut self,
        block: Arc<SignedBlock>,
        skip: SkipFlags,
        requeued: &mut Vec<SignedTransaction>,
    ) -> Result<bool> {
        let block_id = block.id();
        let old_head_id = self.head_block_id();

        if skip.contains(Skip::ForkDb) {
            self.apply_block_in_session(&block, skip)?;

            let recorded = self
                .fork_database
                .push_block(Arc::clone(&block))
                .and_then(|_| self.fork_database.set_head(block_id));

            if let Err(error) = recorded {
                self.database.undo()?;
                return Err(error);
            }

            self.notify_applied_block(&block);
            self.finalize_irreversible_blocks()?;

            return Ok(false);
        }

        if self.is_known_block(block_id)? {
            return Ok(false);
        }

        // With no blocks in the fork database the new block would be accepted as a root.
        if self.fork_database.len() == 0 {
            ensure!(
                block.previous == old_head_id,
                BlockHeaderError::PreviousMismatch {
                    head: old_head_id,
                    previous: block.previous,
                },
            );
        }

        let new_head = self.fork_database.push_block(Arc::clone(&block))?;

        if new_head.block_id != block_id {
            debug!(
                "block {} does not become head (block_id: {block_id:?}, head: {:?})",
                block.block_number(),
                new_head.block_id,
            );

            return Ok(false);
        }

        if block.previous == old_head_id {
            if let Err(error) = self.apply_block_in_session(&block, skip) {
                self.fork_database.remove(block_id);
                self.fork_database.set_head(old_head_id)?;
                return Err(error);
            }

            self.notify_applied_block(&block);
            self.finalize_irreversible_blocks()?;

            return Ok(false);
        }

        self.switch_forks(block_id, old_head_id, skip, requeued)?;
        self.finalize_irreversible_blocks()?;

        Ok(true)
    }

    fn switch_forks(
        &mut self,
        new_head_id: BlockId,
        old_head_id: BlockId,
        skip: SkipFlags,
        requeued: &mut Vec<SignedTransaction>,
    ) -> Result<()> {
        let branches = match self.fork_database.fetch_branch_from(new_head_id, old_head_id) {
            Ok(branches) => branches,
            Err(error) => {
                self.fork_database.remove(new_head_id);
                self.fork_database.set_head(old_head_id)?;
                return Err(error);
            }
        };

        warn!(
            "switching forks (old head: {old_head_id:?}, new head: {new_head_id:?}, \
             common ancestor: {:?}, abandoned blocks: {}, new blocks: {})",
            branches.common_ancestor,
            branches.second.len(),
            branches.first.len(),
        );

        for _ in &branches.second {
            self.database.undo()?;
        }

        for (applied, link) in branches.first.iter().rev().enumerate() {
            if let Err(error) = self.apply_block_in_session(&link.block, skip) {
                warn!(
                    "aborting fork switch because block {} is invalid (block_id: {:?}): {error:?}",
                    link.block_number(),
                    link.block_id,
                );

                self.restore_branch(applied, &branches.second, link.block_id, old_head_id, skip)?;

                return Err(error);
            }
        }

        for link in branches.first.iter().rev() {
            self.notify_applied_block(&link.block);
        }

        requeued.extend(
            branches
                .second
                .iter()
                .rev()
                .flat_map(|link| link.block.transactions.iter().cloned()),
        );

        Ok(())
    }

    // `old_branch` must be ordered newest first.
    fn restore_branch(
        &mut self,
        applied: usize,
        old_branch: &[ChainLink],
        invalid_block_id: BlockId,
        old_head_id: BlockId,
        skip: SkipFlags,
    ) -> Result<()> {
        self.fork_database.remove(invalid_block_id);

        for _ in 0..applied {
            self.database.undo()?;
        }

        for link in old_branch.iter().rev() {
            self.apply_block_in_session(&link.block, skip)?;
        }

        self.fork_database.set_head(old_head_id)
    }

    fn apply_block_in_session(&mut self, block: &SignedBlock, skip: SkipFlags) -> Result<()> {
        let started_at = Instant::now();
        let mut session = self.database.start_undo_session();

        transition_functions::apply_block(&self.config, &self.handlers, &mut session, block, skip)?;

        for update in &self.node_properties.debug_updates {
            update.apply(session.state_mut())?;
        }

        session.push();

        features::log!(
            LogBlockProcessingTime,
            "block {} applied in {:?}",
            block.block_number(),
            started_at.elapsed(),
        );

        Ok(())
    }

    fn notify_applied_block(&self, block: &SignedBlock) {
        for listener in &self.applied_block_listeners {
            if let Err(error) = listener(block) {
                warn!(
                    "applied block listener failed (block {}, block_id: {:?}): {error:?}",
                    block.block_number(),
                    block.id(),
                );
            }
        }
    }

    // Blocks at or below the last irreversible block are moved to the block log.
    // Their undo states are discarded and forks that do not include them are pruned.
    fn finalize_irreversible_blocks(&mut self) -> Result<()> {
        let last_irreversible_block_num = self.last_irreversible_block_num();
        let log_head_number = self.block_log.head_block_number()?;

        if last_irreversible_block_num <= log_head_number {
            return Ok(());
        }

        let mut anchor_id = None;

        for block_number in log_head_number + 1..=last_irreversible_block_num {
            let link = self
                .fork_database
                .fetch_block_on_main_branch_by_number(block_number)
                .ok_or(Error::MissingBlock { block_number })?;

            self.block_log.append(&link.block)?;

            anchor_id = Some(link.block_id);
        }

        if let Some(anchor_id) = anchor_id {
            self.fork_database.prune(anchor_id)?;
        }

        self.database.commit(last_irreversible_block_num.into());
        self.irreversible_block_num = last_irreversible_block_num;

        Ok(())
    }

    fn replay_block_log(&mut self) -> Result<()> {
        let head_block_number = self.block_log.head_block_number()?;

        if head_block_number == 0 {
            return Ok(());
        }

        info!("replaying {head_block_number} blocks from block log");

        let mut head = None;

        for block_number in 1..=head_block_number {
            let block = self
                .block_log
                .read_block_by_number(block_number)?
                .ok_or(Error::MissingBlock { block_number })?;

            self.apply_block_in_session(&block, REPLAY_SKIP_FLAGS)?;
            self.database.commit(block_number.into());

            if block_number % REPLAY_PROGRESS_INTERVAL == 0 {
                info!("replayed {block_number} of {head_block_number} blocks");
            }

            head = Some(block);
        }

        let head = head.ok_or(Error::MissingBlock {
            block_number: head_block_number,
        })?;

        info!(
            "replayed block log (head: {head_block_number}, block_id: {:?})",
            head.id(),
        );

        self.irreversible_block_num = head_block_number;
        self.fork_database.start_block(Arc::new(head));

        Ok(())
    }

    fn open_pending_session(&mut self) {
        if !self.pending_session_open {
            self.database.start_undo_session().push();
            self.pending_session_open = true;
        }
    }

    fn apply_pending_transaction(
        &mut self,
        transaction: &SignedTransaction,
        skip: SkipFlags,
    ) -> Result<()> {
        let skip = skip | self.node_properties.skip_flags;
        let now = self.head_block_time();

        self.open_pending_session();

        transition_functions::apply_transaction(
            &mut self.database,
            &self.handlers,
            transaction,
            now,
            skip,
        )
    }

    fn take_pending(&mut self) -> Result<Vec<SignedTransaction>> {
        if mem::take(&mut self.pending_session_open) {
            self.database.undo()?;
        }

        Ok(mem::take(&mut self.pending_transactions))
    }

    // Listeners are not notified again about transactions that were already pending.
    fn restore_pending(&mut self, transactions: Vec<SignedTransaction>) {
        for transaction in transactions {
            match self.apply_pending_transaction(&transaction, SkipFlags::empty()) {
                Ok(()) => self.pending_transactions.push(transaction),
                Err(error) => debug!(
                    "dropped pending transaction {:?}: {error:?}",
                    transaction.id(),
                ),
            }
        }
    }

    // Returns the transactions to include in a block with `header` and the ones to keep pending.
    fn pack_transactions(
        &mut self,
        header: &BlockHeader,
        pending: &[SignedTransaction],
        skip: SkipFlags,
    ) -> Result<(Vec<SignedTransaction>, Vec<SignedTransaction>)> {
        let max_block_size = self
            .database
            .state()
            .global_properties
            .configuration
            .max_block_size;

        let mut block_size = SignedBlock {
            header: header.clone(),
            ..SignedBlock::default()
        }
        .size();

        let mut packed = vec![];
        let mut postponed = vec![];
        let mut session = self.database.start_undo_session();

        for transaction in pending {
            let transaction_size = transaction.size();

            if !skip.contains(Skip::BlockSizeCheck)
                && block_size + transaction_size > max_block_size
            {
                postponed.push(transaction.clone());
                continue;
            }

            let result = transition_functions::apply_transaction(
                &mut session,
                &self.handlers,
                transaction,
                header.timestamp,
                skip,
            );

            match result {
                Ok(()) => {
                    block_size += transaction_size;
                    packed.push(transaction.clone());
                }
                Err(error) => match self.config.generation_failure_policy {
                    GenerationFailurePolicy::DropTransaction => warn!(
                        "dropping transaction {:?} from block {}: {error:?}",
                        transaction.id(),
                        header.block_number(),
                    ),
                    GenerationFailurePolicy::AbortBlock => return Err(error),
                },
            }
        }

        if !postponed.is_empty() {
            warn!(
                "postponed transactions that do not fit in block {} (count: {}, ids: {:?})",
                header.block_number(),
                postponed.len(),
                postponed.iter().map(|transaction| transaction.id()).collect_vec(),
            );
        }

        Ok((packed, postponed))
    }
}
