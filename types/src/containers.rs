use core::iter;

use derive_more::Deref;
use hashing::{hash_serialized, merkle_root, serialized_size};
use serde::{Deserialize, Serialize};

use crate::{
    keys::{PublicKeyBytes, SecretKey, SignatureBytes},
    primitives::{
        block_summary_index, AccountName, BlockId, BlockNumber, TransactionId, TypeName,
        UnixSeconds, H256,
    },
};

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct Message {
    /// The contract account that defines `message_type`.
    pub code: AccountName,
    pub message_type: TypeName,
    /// Accounts notified of the message. Each one is a scope the message is applied in.
    /// Must be sorted and free of duplicates.
    pub recipients: Vec<AccountName>,
    pub authorization: Vec<AccountName>,
    pub data: Vec<u8>,
}

impl Message {
    #[must_use]
    pub fn new(
        code: impl Into<AccountName>,
        message_type: impl Into<TypeName>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            code: code.into(),
            message_type: message_type.into(),
            recipients: vec![],
            authorization: vec![],
            data: data.into(),
        }
    }

    #[must_use]
    pub fn with_recipients(mut self, recipients: impl IntoIterator<Item = AccountName>) -> Self {
        self.recipients = recipients.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_authorization(
        mut self,
        authorization: impl IntoIterator<Item = AccountName>,
    ) -> Self {
        self.authorization = authorization.into_iter().collect();
        self
    }

    /// Scopes the message is processed in: the contract itself followed by every recipient.
    pub fn scopes(&self) -> impl Iterator<Item = &AccountName> {
        iter::once(&self.code).chain(&self.recipients)
    }

    pub fn referenced_accounts(&self) -> impl Iterator<Item = &AccountName> {
        self.scopes().chain(&self.authorization)
    }
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct Transaction {
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    pub expiration: UnixSeconds,
    pub messages: Vec<Message>,
}

impl Transaction {
    /// Signatures are not part of the ID, so re-signing a transaction does not make it unique.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        hash_serialized(self)
    }

    pub fn set_reference_block(&mut self, block_id: BlockId) {
        self.ref_block_num = block_summary_index(block_id.block_number());
        self.ref_block_prefix = block_id.tapos_prefix();
    }

    #[must_use]
    pub fn verify_reference_block(&self, block_id: BlockId) -> bool {
        self.ref_block_num == block_summary_index(block_id.block_number())
            && self.ref_block_prefix == block_id.tapos_prefix()
    }
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deref, Deserialize, Serialize)]
pub struct SignedTransaction {
    #[deref]
    pub transaction: Transaction,
    pub signatures: Vec<SignatureBytes>,
}

impl From<Transaction> for SignedTransaction {
    fn from(transaction: Transaction) -> Self {
        Self {
            transaction,
            signatures: vec![],
        }
    }
}

impl SignedTransaction {
    pub fn sign(&mut self, secret_key: &SecretKey) {
        let signature = secret_key.sign(self.id());
        self.signatures.push(signature);
    }

    #[must_use]
    pub fn is_signed_by(&self, public_key: PublicKeyBytes) -> bool {
        let id = self.id();

        self.signatures
            .iter()
            .any(|signature| signature.verify(id, public_key))
    }

    /// Digest committed to by the block merkle root. Unlike the ID, it covers signatures.
    #[must_use]
    pub fn merkle_digest(&self) -> H256 {
        hash_serialized(self)
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        serialized_size(self)
    }
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct BlockHeader {
    pub previous: BlockId,
    pub timestamp: UnixSeconds,
    pub transaction_merkle_root: H256,
    pub producer: AccountName,
}

impl BlockHeader {
    /// Saturates for blocks following the last representable block number.
    /// Such blocks are rejected when pushed.
    #[must_use]
    pub const fn block_number(&self) -> BlockNumber {
        self.previous.block_number().saturating_add(1)
    }

    #[must_use]
    pub fn digest(&self) -> H256 {
        hash_serialized(self)
    }

    #[must_use]
    pub fn id(&self) -> BlockId {
        BlockId::new(self.digest(), self.block_number())
    }
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deref, Deserialize, Serialize)]
pub struct SignedBlock {
    #[deref]
    pub header: BlockHeader,
    pub producer_signature: SignatureBytes,
    pub transactions: Vec<SignedTransaction>,
}

impl SignedBlock {
    #[must_use]
    pub fn calculate_merkle_root(&self) -> H256 {
        merkle_root(
            self.transactions
                .iter()
                .map(SignedTransaction::merkle_digest),
        )
    }

    pub fn sign(&mut self, secret_key: &SecretKey) {
        self.producer_signature = secret_key.sign(self.header.digest());
    }

    #[must_use]
    pub fn validate_signee(&self, public_key: PublicKeyBytes) -> bool {
        self.producer_signature
            .verify(self.header.digest(), public_key)
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        serialized_size(self)
    }
}
