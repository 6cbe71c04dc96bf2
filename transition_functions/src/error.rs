use parse_display::Display;
use thiserror::Error;
use types::primitives::{
    AccountName, BlockId, BlockNumber, TransactionId, TypeName, UnixSeconds, H256,
};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("transaction {transaction_id:?} has already been applied")]
    DuplicateTransaction { transaction_id: TransactionId },
    #[error("transaction expired (expiration: {expiration}, now: {now})")]
    Expired {
        expiration: UnixSeconds,
        now: UnixSeconds,
    },
    #[error(
        "transaction expiration is too far in the future \
         (expiration: {expiration}, maximum: {maximum})"
    )]
    ExpirationTooFar {
        expiration: UnixSeconds,
        maximum: UnixSeconds,
    },
    #[error(
        "transaction does not reference a recent block on this chain \
         (ref_block_num: {ref_block_num}, ref_block_prefix: {ref_block_prefix})"
    )]
    InvalidReference {
        ref_block_num: u16,
        ref_block_prefix: u32,
    },
    #[error("account {account} does not exist")]
    UnknownAccount { account: AccountName },
    #[error("message type {message_type} is not registered for {code}")]
    UnknownMessageType {
        code: AccountName,
        message_type: TypeName,
    },
    #[error("transaction is not signed with the key of {account}")]
    AuthorityFailure { account: AccountName },
    #[error("transaction has no messages")]
    NoMessages,
    #[error("message recipients are not sorted and unique: {recipients:?}")]
    UnsortedRecipients { recipients: Vec<AccountName> },
}

impl ValidationError {
    /// Whether the transaction may become valid later or on another fork.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Expired { .. } | Self::ExpirationTooFar { .. } | Self::InvalidReference { .. },
        )
    }
}

#[derive(Debug, Error)]
pub enum BlockHeaderError {
    #[error("block does not build on head (head: {head:?}, previous: {previous:?})")]
    PreviousMismatch { head: BlockId, previous: BlockId },
    #[error("block produced by {producer} when {scheduled:?} was scheduled")]
    WrongProducer {
        producer: AccountName,
        scheduled: Option<AccountName>,
    },
    #[error("block signature does not match signing key of {producer}")]
    BadSignature { producer: AccountName },
    #[error(
        "block timestamp is not on a slot boundary after head \
         (timestamp: {timestamp}, head_time: {head_time})"
    )]
    BadTimestamp {
        timestamp: UnixSeconds,
        head_time: UnixSeconds,
    },
    #[error("block is too large (size: {size}, maximum: {maximum})")]
    OversizedBlock { size: u64, maximum: u64 },
    #[error(
        "transaction merkle root does not match (in_block: {in_block:?}, computed: {computed:?})"
    )]
    MerkleMismatch { in_block: H256, computed: H256 },
    #[error("block number after {previous:?} is out of range")]
    BlockNumberOverflow { previous: BlockId },
    #[error(
        "block {block_number} does not match checkpoint \
         (in_checkpoint: {in_checkpoint:?}, in_block: {in_block:?})"
    )]
    CheckpointMismatch {
        block_number: BlockNumber,
        in_checkpoint: BlockId,
        in_block: BlockId,
    },
    #[error(
        "too many reversible blocks \
         (block_number: {block_number}, last_irreversible_block_num: {last_irreversible_block_num})"
    )]
    UndoHistoryExceeded {
        block_number: BlockNumber,
        last_irreversible_block_num: BlockNumber,
    },
}

/// Context attached to errors returned by message handlers.
#[derive(Debug, Error)]
#[error("{stage} handler for {code}/{message_type} failed in scope {scope}")]
pub struct HandlerError {
    pub stage: HandlerStage,
    pub code: AccountName,
    pub scope: AccountName,
    pub message_type: TypeName,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
#[display(style = "snake_case")]
pub enum HandlerStage {
    Validate,
    Precondition,
    Apply,
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(ValidationError::Expired { expiration: 1, now: 2 } => true)]
    #[test_case(ValidationError::InvalidReference { ref_block_num: 1, ref_block_prefix: 2 } => true)]
    #[test_case(ValidationError::NoMessages => false)]
    #[test_case(ValidationError::UnknownAccount { account: "alice".into() } => false)]
    fn transient_errors(error: ValidationError) -> bool {
        error.is_transient()
    }

    #[test]
    fn handler_error_names_stage_and_key() {
        let error = HandlerError {
            stage: HandlerStage::Precondition,
            code: "bank".into(),
            scope: "alice".into(),
            message_type: "transfer".into(),
        };

        assert_eq!(
            error.to_string(),
            "precondition handler for bank/transfer failed in scope alice",
        );
    }
}
