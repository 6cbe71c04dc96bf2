use std::sync::Arc;

use anyhow::Result;
use block_log::BlockLog;
use transition_functions::MessageHandlers;
use types::{
    config::{BlockchainConfiguration, Config},
    containers::{Message, SignedBlock, SignedTransaction, Transaction},
    keys::SecretKey,
    nonstandard::SkipFlags,
    primitives::{AccountName, Slot, UnixSeconds},
};

use crate::{controller::Controller, initializer::GenesisInitializer};

pub const START_TIME: UnixSeconds = 3_000_000;
pub const PRODUCERS: [&str; 3] = ["alice", "bob", "carol"];
pub const BANK: &str = "bank";
pub const TRANSFER: &str = "transfer";

const BALANCE: &str = "balance";

pub struct Context {
    controller: Controller,
}

impl Context {
    pub fn new() -> Result<Self> {
        Self::with_config(Config::devnet())
    }

    pub fn with_config(config: Config) -> Result<Self> {
        Self::with_parts(
            config,
            BlockLog::in_memory()?,
            BlockchainConfiguration::default(),
        )
    }

    pub fn with_parts(
        config: Config,
        block_log: BlockLog,
        configuration: BlockchainConfiguration,
    ) -> Result<Self> {
        let controller = Controller::new(
            Arc::new(config),
            block_log,
            bank_handlers(),
            &initializer(configuration),
        )?;

        Ok(Self { controller })
    }

    pub const fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    pub fn into_controller(self) -> Controller {
        self.controller
    }

    pub fn generate_block_for_next_slot(&mut self) -> Result<Arc<SignedBlock>> {
        self.generate_block_in_slot(1)
    }

    /// Generates a block in `slot` counted from the head, signed by the scheduled producer.
    pub fn generate_block_in_slot(&mut self, slot: Slot) -> Result<Arc<SignedBlock>> {
        let when = self.controller.get_slot_time(slot);

        let producer = self
            .controller
            .get_scheduled_producer(slot)
            .cloned()
            .expect("test chains always have producers");

        self.controller.generate_block(
            when,
            &producer,
            &secret_key(producer.as_str()),
            SkipFlags::empty(),
        )
    }

    pub fn generate_blocks(&mut self, count: usize) -> Result<Vec<Arc<SignedBlock>>> {
        (0..count)
            .map(|_| self.generate_block_for_next_slot())
            .collect()
    }

    pub fn push_block(&mut self, block: &Arc<SignedBlock>) -> Result<bool> {
        self.controller
            .push_block(Arc::clone(block), SkipFlags::empty())
    }

    pub fn push_transaction(&mut self, transaction: &SignedTransaction) -> Result<()> {
        self.controller
            .push_transaction(transaction.clone(), SkipFlags::empty())
    }

    /// A transfer referencing the head block that expires a minute after it.
    pub fn transfer(&self, from: &str, to: &str, amount: u64) -> SignedTransaction {
        let expiration = self.controller.head_block_time() + 60;
        self.transfer_expiring_at(from, to, amount, expiration)
    }

    pub fn transfer_expiring_at(
        &self,
        from: &str,
        to: &str,
        amount: u64,
        expiration: UnixSeconds,
    ) -> SignedTransaction {
        let message = Message::new(BANK, TRANSFER, amount.to_le_bytes())
            .with_recipients([to.into()])
            .with_authorization([from.into()]);

        let mut transaction = SignedTransaction::from(Transaction {
            expiration,
            messages: vec![message],
            ..Transaction::default()
        });

        transaction
            .transaction
            .set_reference_block(self.controller.head_block_id());

        transaction.sign(&secret_key(from));
        transaction
    }

    pub fn balance(&self, account: &str) -> u64 {
        self.controller
            .state()
            .storage_row(&AccountName::from(account), BALANCE)
            .map_or(0, decode_balance)
    }
}

pub fn secret_key(account: &str) -> SecretKey {
    SecretKey::from_phrase(account)
}

pub fn initializer(configuration: BlockchainConfiguration) -> GenesisInitializer {
    let producers = PRODUCERS.map(|producer| {
        (AccountName::from(producer), secret_key(producer).to_public_key())
    });

    GenesisInitializer::new(START_TIME, producers)
        .with_configuration(configuration)
        .with_account(BANK, None)
        .with_message_type(BANK, TRANSFER)
}

/// Handlers that credit the amount of a transfer to every scope it is processed in.
pub fn bank_handlers() -> MessageHandlers {
    let mut handlers = MessageHandlers::new();

    handlers.set_apply_handler(BANK, None, TRANSFER, |context| {
        let amount = u64::from_le_bytes(context.message.data.as_slice().try_into()?);
        let balance = context.storage_row(BALANCE).map_or(0, decode_balance);

        context.set_storage_row(BALANCE, (balance + amount).to_le_bytes());

        Ok(())
    });

    handlers
}

fn decode_balance(bytes: &[u8]) -> u64 {
    bytes
        .try_into()
        .map(u64::from_le_bytes)
        .expect("balances are stored as 8 bytes")
}
