//! Chain state kept in the versioned object store.
//!
//! Collections are persistent so that snapshotting the whole state is cheap.
//! Undo sessions rely on this.

use im::{OrdMap, OrdSet};
use serde::Serialize;
use serde_with::{serde_as, DisplayFromStr};

use crate::{
    config::BlockchainConfiguration,
    containers::SignedTransaction,
    keys::PublicKeyBytes,
    primitives::{
        AbsoluteSlot, AccountName, BlockId, BlockNumber, BlockSummaryIndex, TransactionId,
        TypeName, UnixSeconds, VoteWeight,
    },
};

#[derive(Clone, PartialEq, Eq, Default, Debug, Serialize)]
pub struct GlobalProperties {
    pub configuration: BlockchainConfiguration,
    /// Producer schedule. Its length never changes after genesis.
    pub active_producers: Vec<AccountName>,
}

#[serde_as]
#[derive(Clone, PartialEq, Eq, Default, Debug, Serialize)]
pub struct DynamicGlobalProperties {
    pub head_block_number: BlockNumber,
    pub head_block_id: BlockId,
    pub time: UnixSeconds,
    pub current_producer: AccountName,
    pub current_absolute_slot: AbsoluteSlot,
    /// One bit per recent slot, most recent in the lowest bit. Set bits are slots that were filled.
    #[serde_as(as = "DisplayFromStr")]
    pub recent_slots_filled: u128,
    pub last_irreversible_block_num: BlockNumber,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Serialize)]
pub struct ProducerObject {
    pub owner: AccountName,
    pub signing_key: PublicKeyBytes,
    pub votes: VoteWeight,
    /// The producer's vote on chain parameters.
    pub configuration: BlockchainConfiguration,
    pub last_aslot: AbsoluteSlot,
    pub last_confirmed_block_num: BlockNumber,
    pub total_missed: u64,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Serialize)]
pub struct AccountObject {
    pub name: AccountName,
    /// Accounts without a key do not require signatures.
    pub owner_key: Option<PublicKeyBytes>,
    pub creation_date: UnixSeconds,
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize)]
pub struct MessageTypeObject {
    pub scope: AccountName,
    pub name: TypeName,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct TransactionObject {
    pub transaction: SignedTransaction,
    pub expiration: UnixSeconds,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Serialize)]
pub struct ChainState {
    pub global_properties: GlobalProperties,
    pub dynamic_global_properties: DynamicGlobalProperties,
    pub producers: OrdMap<AccountName, ProducerObject>,
    pub accounts: OrdMap<AccountName, AccountObject>,
    pub message_types: OrdSet<MessageTypeObject>,
    /// Transactions included in blocks that have not expired yet.
    pub transactions: OrdMap<TransactionId, TransactionObject>,
    pub transaction_expirations: OrdSet<(UnixSeconds, TransactionId)>,
    pub block_summaries: OrdMap<BlockSummaryIndex, BlockId>,
    /// Rows written by message handlers, grouped by scope.
    pub contract_storage: OrdMap<AccountName, OrdMap<String, Vec<u8>>>,
}

impl ChainState {
    pub fn create_account(
        &mut self,
        name: AccountName,
        owner_key: Option<PublicKeyBytes>,
        creation_date: UnixSeconds,
    ) {
        let account = AccountObject {
            name: name.clone(),
            owner_key,
            creation_date,
        };

        self.accounts.insert(name, account);
    }

    pub fn register_message_type(&mut self, scope: AccountName, name: TypeName) {
        self.message_types.insert(MessageTypeObject { scope, name });
    }

    #[must_use]
    pub fn is_message_type_registered(&self, scope: &AccountName, name: &TypeName) -> bool {
        self.message_types.contains(&MessageTypeObject {
            scope: scope.clone(),
            name: name.clone(),
        })
    }

    pub fn record_transaction(&mut self, transaction: SignedTransaction) {
        let id = transaction.id();
        let expiration = transaction.expiration;

        self.transactions.insert(
            id,
            TransactionObject {
                transaction,
                expiration,
            },
        );

        self.transaction_expirations.insert((expiration, id));
    }

    /// Removes transactions that expired strictly before `now`.
    pub fn remove_expired_transactions(&mut self, now: UnixSeconds) {
        while let Some((expiration, id)) = self.transaction_expirations.get_min().copied() {
            if expiration >= now {
                break;
            }

            self.transaction_expirations.remove(&(expiration, id));
            self.transactions.remove(&id);
        }
    }

    #[must_use]
    pub fn storage_row(&self, scope: &AccountName, key: &str) -> Option<&[u8]> {
        self.contract_storage.get(scope)?.get(key).map(Vec::as_slice)
    }

    pub fn set_storage_row(&mut self, scope: AccountName, key: String, value: Vec<u8>) {
        self.contract_storage
            .entry(scope)
            .or_insert_with(OrdMap::new)
            .insert(key, value);
    }

    pub fn remove_storage_row(&mut self, scope: &AccountName, key: &str) -> Option<Vec<u8>> {
        self.contract_storage.get_mut(scope)?.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use crate::containers::{Message, Transaction};

    use super::*;

    fn transaction(expiration: UnixSeconds) -> SignedTransaction {
        Transaction {
            expiration,
            messages: vec![Message::new("system", "memo", expiration.to_le_bytes())],
            ..Transaction::default()
        }
        .into()
    }

    #[test]
    fn expired_transactions_are_removed_in_expiration_order() {
        let mut state = ChainState::default();

        for expiration in [30, 10, 20] {
            state.record_transaction(transaction(expiration));
        }

        state.remove_expired_transactions(20);

        assert_eq!(state.transactions.len(), 2);
        assert!(!state.transactions.contains_key(&transaction(10).id()));
        assert!(state.transactions.contains_key(&transaction(20).id()));
        assert_eq!(state.transaction_expirations.len(), 2);
    }

    #[test]
    fn snapshots_are_independent() {
        let mut state = ChainState::default();
        state.set_storage_row("alice".into(), "key".to_owned(), vec![1]);

        let snapshot = state.clone();
        state.set_storage_row("alice".into(), "key".to_owned(), vec![2]);

        assert_eq!(snapshot.storage_row(&"alice".into(), "key"), Some([1].as_slice()));
        assert_eq!(state.storage_row(&"alice".into(), "key"), Some([2].as_slice()));
        assert_ne!(snapshot, state);
    }

    #[test]
    fn dump_serializes_recent_slots_as_string() -> serde_json::Result<()> {
        let state = ChainState {
            dynamic_global_properties: DynamicGlobalProperties {
                recent_slots_filled: u128::MAX,
                ..DynamicGlobalProperties::default()
            },
            ..ChainState::default()
        };

        let dump = serde_json::to_value(&state)?;

        assert_eq!(
            dump["dynamic_global_properties"]["recent_slots_filled"],
            u128::MAX.to_string(),
        );

        Ok(())
    }
}
