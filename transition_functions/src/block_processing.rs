use anyhow::{ensure, Result};
use database::Database;
use helper_functions::{accessors, misc};
use log::debug;
use types::{
    config::{Config, RECENT_SLOTS_TRACKED},
    containers::SignedBlock,
    nonstandard::{Skip, SkipFlags},
    primitives::block_summary_index,
    state::ChainState,
};

use crate::{
    error::BlockHeaderError, handlers::MessageHandlers, transaction_processing::apply_transaction,
};

/// Checks that `block` can be applied on top of the head of `state`.
pub fn validate_block_header(
    config: &Config,
    state: &ChainState,
    block: &SignedBlock,
    skip: SkipFlags,
) -> Result<()> {
    let dynamic = &state.dynamic_global_properties;

    ensure!(
        block.previous == dynamic.head_block_id,
        BlockHeaderError::PreviousMismatch {
            head: dynamic.head_block_id,
            previous: block.previous,
        },
    );

    ensure!(
        block.timestamp > dynamic.time && block.timestamp % config.block_interval_seconds == 0,
        BlockHeaderError::BadTimestamp {
            timestamp: block.timestamp,
            head_time: dynamic.time,
        },
    );

    if !skip.contains(Skip::MerkleCheck) {
        let computed = block.calculate_merkle_root();

        ensure!(
            computed == block.transaction_merkle_root,
            BlockHeaderError::MerkleMismatch {
                in_block: block.transaction_merkle_root,
                computed,
            },
        );
    }

    if !skip.contains(Skip::BlockSizeCheck) {
        let size = block.size();
        let maximum = state.global_properties.configuration.max_block_size;

        ensure!(
            size <= maximum,
            BlockHeaderError::OversizedBlock { size, maximum },
        );
    }

    let producer = accessors::get_producer(state, &block.producer)?;

    if !skip.contains(Skip::ProducerScheduleCheck) {
        let slot = misc::get_slot_at_time(config, state, block.timestamp);
        let scheduled = misc::get_scheduled_producer(state, slot);

        ensure!(
            scheduled == Some(&block.producer),
            BlockHeaderError::WrongProducer {
                producer: block.producer.clone(),
                scheduled: scheduled.cloned(),
            },
        );
    }

    if !skip.contains(Skip::ProducerSignature) {
        ensure!(
            block.validate_signee(producer.signing_key),
            BlockHeaderError::BadSignature {
                producer: block.producer.clone(),
            },
        );
    }

    if !skip.contains(Skip::UndoHistoryCheck) {
        let block_number = block.block_number();
        let last_irreversible_block_num = dynamic.last_irreversible_block_num;

        ensure!(
            block_number - last_irreversible_block_num < config.max_undo_history,
            BlockHeaderError::UndoHistoryExceeded {
                block_number,
                last_irreversible_block_num,
            },
        );
    }

    Ok(())
}

/// Applies `block` on top of the head of `database`.
///
/// Each transaction is applied in a nested session. The caller is expected to have started a
/// session for the whole block and to undo it if this fails.
pub fn apply_block(
    config: &Config,
    handlers: &MessageHandlers,
    database: &mut Database<ChainState>,
    block: &SignedBlock,
    skip: SkipFlags,
) -> Result<()> {
    validate_block_header(config, database.state(), block, skip)?;

    for transaction in &block.transactions {
        apply_transaction(database, handlers, transaction, block.timestamp, skip)?;
    }

    let state = database.state_mut();

    update_global_dynamic_data(config, state, block);
    update_signing_producer(state, block);
    update_last_irreversible_block(config, state);
    create_block_summary(state, block);
    state.remove_expired_transactions(block.timestamp);
    update_producer_schedule(state);

    Ok(())
}

fn update_global_dynamic_data(config: &Config, state: &mut ChainState, block: &SignedBlock) {
    // The first block counts as produced in slot 1 no matter when it was produced.
    let slot = if state.dynamic_global_properties.head_block_number == 0 {
        1
    } else {
        misc::get_slot_at_time(config, state, block.timestamp)
    };

    let missed_slots = slot.saturating_sub(1);
    let schedule_size =
        u64::try_from(state.global_properties.active_producers.len()).unwrap_or(u64::MAX);

    // The schedule repeats every `schedule_size` slots.
    for missed_slot in 1..=missed_slots.min(schedule_size) {
        let Some(scheduled) = misc::get_scheduled_producer(state, missed_slot).cloned() else {
            continue;
        };

        if scheduled == block.producer {
            continue;
        }

        if let Some(producer) = state.producers.get_mut(&scheduled) {
            producer.total_missed += (missed_slots - missed_slot) / schedule_size + 1;
        }
    }

    let dynamic = &mut state.dynamic_global_properties;

    dynamic.head_block_number = block.block_number();
    dynamic.head_block_id = block.id();
    dynamic.time = block.timestamp;
    dynamic.current_producer = block.producer.clone();
    dynamic.current_absolute_slot += missed_slots + 1;

    dynamic.recent_slots_filled = if missed_slots < u64::from(RECENT_SLOTS_TRACKED) {
        ((dynamic.recent_slots_filled << 1) + 1) << missed_slots
    } else {
        0
    };
}

fn update_signing_producer(state: &mut ChainState, block: &SignedBlock) {
    let dynamic = &state.dynamic_global_properties;

    if let Some(producer) = state.producers.get_mut(&block.producer) {
        producer.last_aslot = dynamic.current_absolute_slot;
        producer.last_confirmed_block_num = dynamic.head_block_number;
    }
}

fn update_last_irreversible_block(config: &Config, state: &mut ChainState) {
    let last_irreversible_block_num = accessors::compute_last_irreversible_block_num(config, state);
    let dynamic = &mut state.dynamic_global_properties;

    if last_irreversible_block_num > dynamic.last_irreversible_block_num {
        debug!("block {last_irreversible_block_num} became irreversible");
        dynamic.last_irreversible_block_num = last_irreversible_block_num;
    }
}

fn create_block_summary(state: &mut ChainState, block: &SignedBlock) {
    let block_number = block.block_number();

    state
        .block_summaries
        .insert(block_summary_index(block_number), block.id());
}

// The schedule changes at the end of every round and governs blocks after the current one.
fn update_producer_schedule(state: &mut ChainState) {
    let round_length = state.global_properties.active_producers.len();

    if round_length == 0 {
        return;
    }

    let block_number = state.dynamic_global_properties.head_block_number;

    if usize::try_from(block_number).is_ok_and(|number| number % round_length != 0) {
        return;
    }

    let active_producers = accessors::rank_producers(state);

    if active_producers.len() == round_length {
        state.global_properties.active_producers = active_producers;
    }

    if let Some(configuration) = accessors::median_configuration(state) {
        state.global_properties.configuration = configuration;
    }
}
