use types::{
    config::{Config, PERCENT_100, RECENT_SLOTS_TRACKED},
    primitives::{AccountName, Slot, UnixSeconds},
    state::ChainState,
};

/// Returns the start time of the `slot`-th slot after the head block.
///
/// Slot 0 is the head block itself and has no time.
/// Slot 1 always starts one interval after the slot of the head block, even if slots before the
/// head block were missed.
#[must_use]
pub fn get_slot_time(config: &Config, state: &ChainState, slot: Slot) -> UnixSeconds {
    if slot == 0 {
        return 0;
    }

    let interval = config.block_interval_seconds;
    let head_slot_time = state.dynamic_global_properties.time / interval * interval;

    head_slot_time + slot * interval
}

/// Returns the last slot that starts at or before `time`, or 0 if slot 1 has not started yet.
#[must_use]
pub fn get_slot_at_time(config: &Config, state: &ChainState, time: UnixSeconds) -> Slot {
    let first_slot_time = get_slot_time(config, state, 1);

    if time < first_slot_time {
        return 0;
    }

    (time - first_slot_time) / config.block_interval_seconds + 1
}

/// Returns the producer scheduled for the `slot`-th slot after the head block.
///
/// Slot 0 belongs to no one.
#[must_use]
pub fn get_scheduled_producer(state: &ChainState, slot: Slot) -> Option<&AccountName> {
    if slot == 0 {
        return None;
    }

    let active_producers = &state.global_properties.active_producers;
    let absolute_slot = state.dynamic_global_properties.current_absolute_slot + slot;
    let length = u64::try_from(active_producers.len()).ok().filter(|length| *length > 0)?;
    let index = usize::try_from(absolute_slot % length).ok()?;

    active_producers.get(index)
}

/// Share of recent slots that were filled, in basis points.
#[must_use]
pub fn producer_participation_rate(state: &ChainState) -> u16 {
    let filled = state.dynamic_global_properties.recent_slots_filled.count_ones();
    let rate = u32::from(PERCENT_100) * filled / RECENT_SLOTS_TRACKED;

    rate.try_into()
        .expect("rate cannot exceed PERCENT_100 because at most all tracked slots are filled")
}
