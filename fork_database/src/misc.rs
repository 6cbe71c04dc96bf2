use core::cmp::Ordering;
use std::sync::Arc;

use types::{
    containers::SignedBlock,
    primitives::{BlockId, BlockNumber},
};

/// A block in the fork database along with values derived from it.
#[derive(Clone, Debug)]
pub struct ChainLink {
    pub block_id: BlockId,
    pub block: Arc<SignedBlock>,
}

impl From<Arc<SignedBlock>> for ChainLink {
    fn from(block: Arc<SignedBlock>) -> Self {
        Self {
            block_id: block.id(),
            block,
        }
    }
}

impl ChainLink {
    #[must_use]
    pub fn block_number(&self) -> BlockNumber {
        self.block_id.block_number()
    }

    #[must_use]
    pub fn previous(&self) -> BlockId {
        self.block.previous
    }

    /// Higher block numbers are better. Lower IDs break ties.
    #[must_use]
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        self.block_number()
            .cmp(&other.block_number())
            .then_with(|| other.block_id.cmp(&self.block_id))
    }
}
