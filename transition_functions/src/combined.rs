use anyhow::{ensure, Result};
use types::{
    phase0::{beacon_state::BeaconState, containers::BeaconBlock, primitives::Slot},
    preset::Preset,
};

use crate::unphased::{self, Error, ProcessSlots};

pub fn process_slots<P: Preset>(state: &mut BeaconState, slot: Slot) -> Result<()> {
    ensure!(
        state.slot < slot,
        Error::SlotNotLater {
            current: state.slot,
            target: slot,
        },
    );

    while state.slot < slot {
        unphased::process_slot::<P>(state)?;
        state.slot += 1;
    }

    Ok(())
}

/// Applies `block` to `state` without verifying the state root in the block.
///
/// Blocks loaded from storage have already been validated once, so replaying them only needs the
/// checks that keep the chain connected.
pub fn trusted_state_transition<P: Preset>(
    state: &mut BeaconState,
    block: &BeaconBlock,
) -> Result<()> {
    custom_state_transition::<P>(state, block, ProcessSlots::IfNeeded)
}

pub fn custom_state_transition<P: Preset>(
    state: &mut BeaconState,
    block: &BeaconBlock,
    process_slots: ProcessSlots,
) -> Result<()> {
    // > Process slots (including those with no blocks) since block
    if process_slots.should_process(state, block) {
        self::process_slots::<P>(state, block.slot)?;
    }

    unphased::process_block(state, block)
}
