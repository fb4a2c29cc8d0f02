use core::ops::Range;

use typenum::Unsigned as _;
use types::{
    phase0::primitives::{Epoch, Slot},
    preset::Preset,
};

#[must_use]
pub const fn compute_epoch_at_slot<P: Preset>(slot: Slot) -> Epoch {
    slot / P::SlotsPerEpoch::U64
}

#[must_use]
pub const fn compute_start_slot_at_epoch<P: Preset>(epoch: Epoch) -> Slot {
    epoch.saturating_mul(P::SlotsPerEpoch::U64)
}

#[must_use]
pub const fn is_epoch_start<P: Preset>(slot: Slot) -> bool {
    slots_since_epoch_start::<P>(slot) == 0
}

#[must_use]
pub const fn slots_since_epoch_start<P: Preset>(slot: Slot) -> u64 {
    slot % P::SlotsPerEpoch::U64
}

/// First slot of the epoch containing `slot`.
#[must_use]
pub const fn epoch_boundary_slot<P: Preset>(slot: Slot) -> Slot {
    compute_start_slot_at_epoch::<P>(compute_epoch_at_slot::<P>(slot))
}

#[must_use]
pub const fn slots_in_epoch<P: Preset>(epoch: Epoch) -> Range<Slot> {
    compute_start_slot_at_epoch::<P>(epoch)..compute_start_slot_at_epoch::<P>(epoch + 1)
}
