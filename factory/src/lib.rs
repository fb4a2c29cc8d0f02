//! Deterministic chains for tests and benchmarks.

use std::sync::Arc;

use anyhow::Result;
use transition_functions::{combined, unphased};
use typenum::Unsigned as _;
use types::{
    phase0::{
        beacon_state::BeaconState,
        consts::GENESIS_SLOT,
        containers::{BeaconBlock, BeaconBlockBody, BeaconBlockHeader, Deposit},
        primitives::{Gwei, Slot, H256},
    },
    preset::Preset,
};

pub const GENESIS_VALIDATOR_COUNT: usize = 16;
pub const GENESIS_BALANCE: Gwei = 32_000_000_000;

pub type BlockWithState = (Arc<BeaconBlock>, Arc<BeaconState>);

#[must_use]
pub fn min_genesis_state<P: Preset>() -> BlockWithState {
    let length = P::SlotsPerHistoricalRoot::USIZE;
    let body = BeaconBlockBody::default();

    let state = BeaconState {
        slot: GENESIS_SLOT,
        latest_block_header: BeaconBlockHeader {
            body_root: body.hash_tree_root(),
            ..BeaconBlockHeader::default()
        },
        block_roots: vec![H256::zero(); length],
        state_roots: vec![H256::zero(); length],
        balances: vec![GENESIS_BALANCE; GENESIS_VALIDATOR_COUNT],
    };

    let block = BeaconBlock {
        slot: GENESIS_SLOT,
        state_root: state.hash_tree_root(),
        body,
        ..BeaconBlock::default()
    };

    (Arc::new(block), Arc::new(state))
}

pub fn empty_block<P: Preset>(
    pre_state: Arc<BeaconState>,
    slot: Slot,
    graffiti: H256,
) -> Result<BlockWithState> {
    let body = BeaconBlockBody {
        graffiti,
        deposits: vec![],
    };

    block::<P>(pre_state, slot, body)
}

pub fn block_with_deposits<P: Preset>(
    pre_state: Arc<BeaconState>,
    slot: Slot,
    deposits: Vec<Deposit>,
) -> Result<BlockWithState> {
    let body = BeaconBlockBody {
        graffiti: H256::zero(),
        deposits,
    };

    block::<P>(pre_state, slot, body)
}

/// Builds one empty block at each of `slots` on top of `pre_state`.
///
/// `slots` must be ascending. Every block gets graffiti derived from its slot.
pub fn blocks_at_slots<P: Preset>(
    pre_state: Arc<BeaconState>,
    slots: impl IntoIterator<Item = Slot>,
) -> Result<Vec<BlockWithState>> {
    let mut state = pre_state;
    let mut blocks = vec![];

    for slot in slots {
        let (block, post_state) = empty_block::<P>(state, slot, graffiti_for_slot(slot))?;
        state = Arc::clone(&post_state);
        blocks.push((block, post_state));
    }

    Ok(blocks)
}

#[must_use]
pub fn graffiti_for_slot(slot: Slot) -> H256 {
    H256::from_low_u64_be(slot)
}

fn block<P: Preset>(
    mut state: Arc<BeaconState>,
    slot: Slot,
    body: BeaconBlockBody,
) -> Result<BlockWithState> {
    let post_state = Arc::make_mut(&mut state);

    if post_state.slot < slot {
        combined::process_slots::<P>(post_state, slot)?;
    }

    let validator_count = post_state.balances.len().max(1) as u64;

    let mut block = BeaconBlock {
        slot,
        proposer_index: slot % validator_count,
        parent_root: post_state.latest_block_root(),
        state_root: H256::zero(),
        body,
    };

    unphased::process_block(post_state, &block)?;

    block.state_root = post_state.hash_tree_root();

    Ok((Arc::new(block), state))
}
