use hashing::{chunk_64, merkleize, mix_in_length};
use serde::{Deserialize, Serialize};

use crate::phase0::{
    containers::BeaconBlockHeader,
    primitives::{Gwei, Slot, H256},
};

/// Owned snapshot of the chain state at [`BeaconState::slot`].
///
/// `block_roots` and `state_roots` are ring buffers of length `SlotsPerHistoricalRoot`.
#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BeaconState {
    pub slot: Slot,
    pub latest_block_header: BeaconBlockHeader,
    pub block_roots: Vec<H256>,
    pub state_roots: Vec<H256>,
    pub balances: Vec<Gwei>,
}

impl BeaconState {
    #[must_use]
    pub fn hash_tree_root(&self) -> H256 {
        let balance_chunks = self
            .balances
            .iter()
            .copied()
            .map(chunk_64)
            .collect::<Vec<_>>();

        let balances_root = mix_in_length(merkleize(&balance_chunks), self.balances.len() as u64);

        merkleize(&[
            chunk_64(self.slot),
            self.latest_block_header.hash_tree_root(),
            merkleize(&self.block_roots),
            merkleize(&self.state_roots),
            balances_root,
        ])
    }

    /// Root of the block that produced this state.
    ///
    /// The state root in `latest_block_header` is only filled in by the next slot transition,
    /// so it has to be computed here when the state is still at the slot of its latest block.
    #[must_use]
    pub fn latest_block_root(&self) -> H256 {
        let mut header = self.latest_block_header.clone();

        if header.state_root.is_zero() {
            header.state_root = self.hash_tree_root();
        }

        header.hash_tree_root()
    }
}
