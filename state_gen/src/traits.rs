use std::sync::Arc;

use anyhow::Result;
use types::{
    nonstandard::StateSummary,
    phase0::{
        beacon_state::BeaconState,
        containers::BeaconBlock,
        primitives::{Slot, H256},
    },
};

/// Durable storage of states, state summaries and the block index.
pub trait StateStorage {
    fn save_state(&self, block_root: H256, state: &BeaconState) -> Result<()>;

    fn state(&self, block_root: H256) -> Result<Option<Arc<BeaconState>>>;

    fn has_state(&self, block_root: H256) -> Result<bool>;

    fn save_state_summary(&self, summary: StateSummary) -> Result<()>;

    fn state_summary(&self, block_root: H256) -> Result<Option<StateSummary>>;

    /// Roots of all stored blocks with slots in `start_slot..=end_slot`, ordered by slot.
    fn block_roots(&self, start_slot: Slot, end_slot: Slot) -> Result<Vec<H256>>;

    fn genesis_block(&self) -> Result<Option<Arc<BeaconBlock>>>;
}

pub trait BlockSource {
    fn block_by_root(&self, block_root: H256) -> Result<Option<Arc<BeaconBlock>>>;

    /// Blocks with slots in `start_slot..=end_slot` on the chain ending at `end_root`,
    /// ordered by ascending slot.
    fn load_blocks(
        &self,
        start_slot: Slot,
        end_slot: Slot,
        end_root: H256,
    ) -> Result<Vec<Arc<BeaconBlock>>>;

    /// Root and slot of the latest stored block at or before `slot`.
    fn find_last_valid_block(&self, slot: Slot) -> Result<Option<(H256, Slot)>>;
}

/// The state transition function as seen by block replay.
pub trait StateTransition {
    fn apply_block(&self, state: &mut BeaconState, block: &BeaconBlock) -> Result<()>;

    /// Processes a single slot with no block in it.
    fn advance_slot(&self, state: &mut BeaconState) -> Result<()>;
}

impl<T: StateTransition> StateTransition for &T {
    fn apply_block(&self, state: &mut BeaconState, block: &BeaconBlock) -> Result<()> {
        (*self).apply_block(state, block)
    }

    fn advance_slot(&self, state: &mut BeaconState) -> Result<()> {
        (*self).advance_slot(state)
    }
}
