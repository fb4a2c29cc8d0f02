use core::marker::PhantomData;

use anyhow::Result;
use transition_functions::combined;
use types::{
    phase0::{beacon_state::BeaconState, containers::BeaconBlock},
    preset::Preset,
};

use crate::traits::StateTransition;

/// Applies blocks without verifying state roots.
///
/// Only suitable for blocks that were validated before they were stored.
#[derive(Clone, Copy, Default, Debug)]
pub struct TrustedTransition<P: Preset> {
    phantom: PhantomData<P>,
}

impl<P: Preset> StateTransition for TrustedTransition<P> {
    fn apply_block(&self, state: &mut BeaconState, block: &BeaconBlock) -> Result<()> {
        combined::trusted_state_transition::<P>(state, block)
    }

    fn advance_slot(&self, state: &mut BeaconState) -> Result<()> {
        let next_slot = state.slot + 1;
        combined::process_slots::<P>(state, next_slot)
    }
}
