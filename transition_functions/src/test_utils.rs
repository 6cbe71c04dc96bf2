use types::{
    containers::{Message, SignedTransaction, Transaction},
    keys::SecretKey,
    primitives::{block_summary_index, AccountName, BlockId, UnixSeconds, H256},
    state::{ChainState, ProducerObject},
};

use crate::handlers::MessageHandlers;

pub const HEAD_TIME: UnixSeconds = 3000;
pub const HEAD_BLOCK_NUMBER: u32 = 10;
pub const BANK: &str = "bank";
pub const TRANSFER: &str = "transfer";
pub const PRODUCERS: [&str; 3] = ["alice", "bob", "carol"];

pub fn secret_key(account: &str) -> SecretKey {
    SecretKey::from_phrase(account)
}

pub fn head_block_id() -> BlockId {
    BlockId::new(H256::repeat_byte(0xaa), HEAD_BLOCK_NUMBER)
}

/// State after block 10 with three producers that also have accounts and a bank contract.
pub fn state() -> ChainState {
    let mut state = ChainState::default();

    for producer in PRODUCERS {
        let signing_key = secret_key(producer).to_public_key();

        state.create_account(producer.into(), Some(signing_key), 0);

        state.producers.insert(
            producer.into(),
            ProducerObject {
                owner: producer.into(),
                signing_key,
                votes: 0,
                configuration: state.global_properties.configuration,
                last_aslot: 0,
                last_confirmed_block_num: 0,
                total_missed: 0,
            },
        );
    }

    state.create_account(BANK.into(), None, 0);
    state.register_message_type(BANK.into(), TRANSFER.into());

    state.global_properties.active_producers = PRODUCERS.map(AccountName::from).to_vec();

    let dynamic = &mut state.dynamic_global_properties;
    dynamic.head_block_number = HEAD_BLOCK_NUMBER;
    dynamic.head_block_id = head_block_id();
    dynamic.time = HEAD_TIME;
    dynamic.current_absolute_slot = u64::from(HEAD_BLOCK_NUMBER);
    dynamic.recent_slots_filled = u128::MAX;

    state
        .block_summaries
        .insert(block_summary_index(HEAD_BLOCK_NUMBER), head_block_id());

    state
}

/// A transfer of `amount` authorized and signed by `from`, referencing the head block.
pub fn transfer(state: &ChainState, from: &str, amount: u64) -> SignedTransaction {
    let message = Message::new(BANK, TRANSFER, amount.to_le_bytes().to_vec())
        .with_authorization([from.into()]);

    let mut transaction = SignedTransaction::from(Transaction {
        expiration: state.dynamic_global_properties.time + 60,
        messages: vec![message],
        ..Transaction::default()
    });

    transaction
        .transaction
        .set_reference_block(state.dynamic_global_properties.head_block_id);

    transaction.sign(&secret_key(from));
    transaction
}

pub fn resign(transaction: &mut SignedTransaction, signer: &str) {
    transaction.signatures.clear();
    transaction.sign(&secret_key(signer));
}

/// Handlers that credit the amount of a transfer to every scope the transfer is processed in.
pub fn bank_handlers() -> MessageHandlers {
    let mut handlers = MessageHandlers::new();

    handlers.set_apply_handler(BANK, None, TRANSFER, |context| {
        let amount = u64::from_le_bytes(context.message.data.as_slice().try_into()?);
        let balance = context.storage_row("balance").map_or(0, decode_balance);

        context.set_storage_row("balance", (balance + amount).to_le_bytes().to_vec());

        Ok(())
    });

    handlers
}

pub fn balance(state: &ChainState, account: &str) -> u64 {
    state
        .storage_row(&account.into(), "balance")
        .map_or(0, decode_balance)
}

fn decode_balance(bytes: &[u8]) -> u64 {
    bytes
        .try_into()
        .map(u64::from_le_bytes)
        .expect("balances are stored as 8 bytes")
}
