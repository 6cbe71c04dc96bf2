use clap::Subcommand;
use types::primitives::UnixSeconds;

use crate::consts::{DEFAULT_BLOCK_COUNT, DEFAULT_GENESIS_TIME, DEFAULT_PRODUCERS};

#[derive(Clone, Subcommand)]
#[cfg_attr(test, derive(PartialEq, Eq, Debug))]
pub enum ChainNodeCommand {
    /// Produce blocks on consecutive slots with locally held producer keys
    /// (example: chain_node --data-dir chain run --blocks 20 --memo hello)
    Run {
        /// Names of the initial producers in schedule order.
        /// The key of each producer is derived from its name.
        #[clap(long, value_delimiter = ',', default_value = DEFAULT_PRODUCERS)]
        producers: Vec<String>,

        /// Timestamp of the genesis state in seconds since the Unix epoch.
        /// Must be a multiple of the block interval.
        #[clap(long, default_value_t = DEFAULT_GENESIS_TIME)]
        genesis_time: UnixSeconds,

        /// Number of blocks to produce
        #[clap(long, default_value_t = DEFAULT_BLOCK_COUNT)]
        blocks: u64,

        /// Memo to post before producing a block, one per block in the order given
        #[clap(long)]
        memo: Vec<String>,
    },

    /// Show the head of the irreversible block log
    /// (example: chain_node --data-dir chain info)
    Info,
}
