use thiserror::Error;
use types::primitives::{AccountName, BlockNumber, Slot, UnixSeconds};

#[derive(Debug, Error)]
pub enum Error {
    #[error("there are no blocks to pop")]
    NoBlocksToPop,
    #[error("block {block_number} is irreversible and cannot be popped")]
    CannotPopIrreversible { block_number: BlockNumber },
    #[error("no slot has started at time {time} (head_time: {head_time})")]
    NoSlotAtTime {
        time: UnixSeconds,
        head_time: UnixSeconds,
    },
    #[error(
        "producer is not scheduled for slot \
         (producer: {producer}, slot: {slot}, scheduled: {scheduled:?})"
    )]
    ProducerNotScheduled {
        producer: AccountName,
        slot: Slot,
        scheduled: Option<AccountName>,
    },
    #[error("secret key does not match signing key of {producer}")]
    SigningKeyMismatch { producer: AccountName },
    #[error(
        "genesis time is not a multiple of block interval \
         (start_time: {start_time}, block_interval_seconds: {block_interval_seconds})"
    )]
    GenesisTimeNotAligned {
        start_time: UnixSeconds,
        block_interval_seconds: UnixSeconds,
    },
    #[error("chain initializer provided no producers")]
    NoProducers,
    #[error("configuration is invalid")]
    InvalidConfig,
    #[error("block {block_number} is missing")]
    MissingBlock { block_number: BlockNumber },
    #[error("no block with number {block_number} on the current chain")]
    UnknownBlockNumber { block_number: BlockNumber },
}
