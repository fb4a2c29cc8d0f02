use anyhow::Result;
use typenum::Unsigned as _;
use types::{
    phase0::{beacon_state::BeaconState, containers::BeaconBlock},
    preset::Preset,
};

use crate::unphased::Error;

pub enum ProcessSlots {
    Always,
    IfNeeded,
    Never,
}

impl ProcessSlots {
    #[must_use]
    pub fn should_process(self, state: &BeaconState, block: &BeaconBlock) -> bool {
        match self {
            Self::Always => true,
            // The test for equality is intentional. Blocks attempting to "rewind" the state are
            // rejected by `combined::process_slots`.
            Self::IfNeeded => state.slot != block.slot,
            Self::Never => false,
        }
    }
}

pub fn process_slot<P: Preset>(state: &mut BeaconState) -> Result<()> {
    let slot = state.slot;
    let index = usize::try_from(slot % P::SlotsPerHistoricalRoot::U64)?;

    // > Cache state root
    let previous_state_root = state.hash_tree_root();

    *state
        .state_roots
        .get_mut(index)
        .ok_or(Error::HistoricalRootsTooShort { slot })? = previous_state_root;

    // > Cache latest block header state root
    if state.latest_block_header.state_root.is_zero() {
        state.latest_block_header.state_root = previous_state_root;
    }

    // > Cache block root
    let previous_block_root = state.latest_block_header.hash_tree_root();

    *state
        .block_roots
        .get_mut(index)
        .ok_or(Error::HistoricalRootsTooShort { slot })? = previous_block_root;

    Ok(())
}
