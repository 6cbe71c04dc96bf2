use anyhow::Result;
use itertools::Itertools as _;
use types::{
    config::{BlockchainConfiguration, Config},
    primitives::{AccountName, BlockId, BlockNumber},
    state::{AccountObject, ChainState, ProducerObject},
};

use crate::error::Error;

pub fn get_producer<'state>(
    state: &'state ChainState,
    producer: &AccountName,
) -> Result<&'state ProducerObject> {
    state.producers.get(producer).ok_or_else(|| {
        Error::UnknownProducer {
            producer: producer.clone(),
        }
        .into()
    })
}

pub fn get_account<'state>(
    state: &'state ChainState,
    account: &AccountName,
) -> Result<&'state AccountObject> {
    state.accounts.get(account).ok_or_else(|| {
        Error::UnknownAccount {
            account: account.clone(),
        }
        .into()
    })
}

/// Looks up the ID of a recent block by the low 16 bits of its number.
#[must_use]
pub fn get_block_summary(state: &ChainState, ref_block_num: u16) -> Option<BlockId> {
    state.block_summaries.get(&ref_block_num).copied()
}

/// Ranks all registered producers by votes (most first, ties by name) and returns as many as there
/// are active producers.
#[must_use]
pub fn rank_producers(state: &ChainState) -> Vec<AccountName> {
    state
        .producers
        .values()
        .sorted_by(|left, right| {
            right
                .votes
                .cmp(&left.votes)
                .then_with(|| left.owner.cmp(&right.owner))
        })
        .take(state.global_properties.active_producers.len())
        .map(|producer| producer.owner.clone())
        .collect()
}

/// Computes the per-field median of the configurations voted for by active producers.
#[must_use]
pub fn median_configuration(state: &ChainState) -> Option<BlockchainConfiguration> {
    let votes = state
        .global_properties
        .active_producers
        .iter()
        .filter_map(|producer| state.producers.get(producer))
        .map(|producer| producer.configuration)
        .collect_vec();

    BlockchainConfiguration::median(&votes)
}

/// Computes the highest block number confirmed by enough active producers to be irreversible.
///
/// The result never goes below the current last irreversible block.
#[must_use]
pub fn compute_last_irreversible_block_num(config: &Config, state: &ChainState) -> BlockNumber {
    let current = state.dynamic_global_properties.last_irreversible_block_num;

    let confirmations = state
        .global_properties
        .active_producers
        .iter()
        .filter_map(|producer| state.producers.get(producer))
        .map(|producer| producer.last_confirmed_block_num)
        .sorted_unstable()
        .collect_vec();

    let offset = config.irreversibility_offset(confirmations.len());

    confirmations
        .get(offset)
        .copied()
        .map_or(current, |candidate| candidate.max(current))
}
