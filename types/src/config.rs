use std::borrow::Cow;

use itertools::Itertools as _;
use serde::{Deserialize, Serialize};

use crate::primitives::{ShareType, UnixSeconds};

/// Denominator of percentages expressed in basis points.
pub const PERCENT_100: u16 = 10_000;

/// Number of recent slots tracked in `DynamicGlobalProperties.recent_slots_filled`.
pub const RECENT_SLOTS_TRACKED: u32 = u128::BITS;

/// What to do when a pending transaction fails while a block is being generated.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationFailurePolicy {
    /// Leave the transaction out of the block and keep going.
    #[default]
    DropTransaction,
    /// Fail the whole generation and leave pending state as it was.
    AbortBlock,
}

/// Chain parameters fixed for the lifetime of a chain.
///
/// Parameters that producers vote on are in [`BlockchainConfiguration`].
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    pub config_name: Cow<'static, str>,
    pub block_interval_seconds: UnixSeconds,
    /// Share of active producers (in basis points) that must confirm a block to make it irreversible.
    pub irreversible_threshold_percent: u16,
    /// Maximum distance between the head and the last irreversible block.
    pub max_undo_history: u32,
    pub generation_failure_policy: GenerationFailurePolicy,
}

impl Default for Config {
    fn default() -> Self {
        // Use `default` as the default `config_name` and override it in presets.
        Self {
            config_name: Cow::Borrowed("default"),
            ..Self::mainnet()
        }
    }
}

impl Config {
    #[must_use]
    pub const fn mainnet() -> Self {
        Self {
            config_name: Cow::Borrowed("mainnet"),
            block_interval_seconds: 3,
            irreversible_threshold_percent: 7_000,
            max_undo_history: 10_000,
            generation_failure_policy: GenerationFailurePolicy::DropTransaction,
        }
    }

    /// Like [`Config::mainnet`] but with a short undo history.
    #[must_use]
    pub const fn devnet() -> Self {
        Self {
            config_name: Cow::Borrowed("devnet"),
            block_interval_seconds: 3,
            irreversible_threshold_percent: 7_000,
            max_undo_history: 1_000,
            generation_failure_policy: GenerationFailurePolicy::DropTransaction,
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.block_interval_seconds > 0
            && self.irreversible_threshold_percent <= PERCENT_100
            && self.max_undo_history > 0
    }

    /// Position of the deciding producer when active producers are sorted by the number of the
    /// last block they confirmed, lowest first.
    #[must_use]
    pub fn irreversibility_offset(&self, active_producer_count: usize) -> usize {
        let unconfirmed_share = usize::from(PERCENT_100 - self.irreversible_threshold_percent);
        unconfirmed_share * active_producer_count / usize::from(PERCENT_100)
    }
}

/// Chain parameters set by the median of the votes of active producers.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfiguration {
    pub max_block_size: u64,
    pub target_block_size: u64,
    pub max_storage_size: u64,
    pub elected_pay: ShareType,
    pub runner_up_pay: ShareType,
    pub min_balance: ShareType,
    pub max_transaction_lifetime: UnixSeconds,
}

impl Default for BlockchainConfiguration {
    fn default() -> Self {
        Self {
            max_block_size: 5 * 1024 * 1024,
            target_block_size: 128 * 1024,
            max_storage_size: 10 * 1024 * 1024,
            elected_pay: 100,
            runner_up_pay: 75,
            min_balance: 100,
            max_transaction_lifetime: 60 * 60,
        }
    }
}

impl BlockchainConfiguration {
    /// Takes the median of every field separately.
    ///
    /// With an even number of votes the upper median is used.
    /// Returns `None` if there are no votes.
    #[must_use]
    pub fn median(votes: &[Self]) -> Option<Self> {
        if votes.is_empty() {
            return None;
        }

        Some(Self {
            max_block_size: median_by(votes, |vote| vote.max_block_size),
            target_block_size: median_by(votes, |vote| vote.target_block_size),
            max_storage_size: median_by(votes, |vote| vote.max_storage_size),
            elected_pay: median_by(votes, |vote| vote.elected_pay),
            runner_up_pay: median_by(votes, |vote| vote.runner_up_pay),
            min_balance: median_by(votes, |vote| vote.min_balance),
            max_transaction_lifetime: median_by(votes, |vote| vote.max_transaction_lifetime),
        })
    }
}

fn median_by<T: Ord + Copy + Default>(
    votes: &[BlockchainConfiguration],
    field: impl Fn(&BlockchainConfiguration) -> T,
) -> T {
    votes
        .iter()
        .map(field)
        .sorted_unstable()
        .nth(votes.len() / 2)
        .unwrap_or_default()
}
