use anyhow::{ensure, Result};
use types::phase0::{
    beacon_state::BeaconState,
    containers::{BeaconBlock, BeaconBlockHeader, Deposit},
    primitives::H256,
};

use crate::unphased::Error;

pub fn process_block(state: &mut BeaconState, block: &BeaconBlock) -> Result<()> {
    process_block_header(state, block)?;
    apply_deposits(state, &block.body.deposits)
}

pub fn process_block_header(state: &mut BeaconState, block: &BeaconBlock) -> Result<()> {
    // > Verify that the slots match
    ensure!(
        block.slot == state.slot,
        Error::SlotMismatch {
            state_slot: state.slot,
            block_slot: block.slot,
        },
    );

    // > Verify that the block is newer than latest block header
    ensure!(
        block.slot > state.latest_block_header.slot,
        Error::BlockNotNewerThanLatestBlockHeader {
            block_slot: block.slot,
            block_header_slot: state.latest_block_header.slot,
        },
    );

    // > Verify that the parent matches
    let computed = state.latest_block_root();
    let in_block = block.parent_root;

    ensure!(
        computed == in_block,
        Error::ParentRootMismatch { computed, in_block },
    );

    // > Cache current block as the new latest block
    state.latest_block_header = BeaconBlockHeader {
        // > Overwritten in the next process_slot call
        state_root: H256::zero(),
        ..block.to_header()
    };

    Ok(())
}

/// Credits deposits to existing balances.
///
/// A deposit for the index right after the last validator registers a new validator.
pub fn apply_deposits(state: &mut BeaconState, deposits: &[Deposit]) -> Result<()> {
    for deposit in deposits {
        let validator_count = state.balances.len();
        let index = usize::try_from(deposit.validator_index)?;

        if index == validator_count {
            state.balances.push(deposit.amount);
            continue;
        }

        let balance = state
            .balances
            .get_mut(index)
            .ok_or(Error::DepositIndexOutOfBounds {
                validator_index: deposit.validator_index,
                validator_count,
            })?;

        *balance = balance.saturating_add(deposit.amount);
    }

    Ok(())
}
