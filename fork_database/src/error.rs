use thiserror::Error;
use types::primitives::BlockId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("block does not link to any known block (block_id: {block_id:?}, previous: {previous:?})")]
    UnlinkableBlock { block_id: BlockId, previous: BlockId },
    #[error("block is not in fork database: {block_id:?}")]
    UnknownBlock { block_id: BlockId },
    #[error("fork database is empty")]
    Empty,
}
