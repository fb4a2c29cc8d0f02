use hashing::{chunk_64, merkleize, mix_in_length};
use serde::{Deserialize, Serialize};

use crate::phase0::primitives::{Gwei, Slot, ValidatorIndex, H256};

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BeaconBlockHeader {
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    pub parent_root: H256,
    pub state_root: H256,
    pub body_root: H256,
}

impl BeaconBlockHeader {
    #[must_use]
    pub fn hash_tree_root(&self) -> H256 {
        merkleize(&[
            chunk_64(self.slot),
            chunk_64(self.proposer_index),
            self.parent_root,
            self.state_root,
            self.body_root,
        ])
    }
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Deposit {
    pub validator_index: ValidatorIndex,
    pub amount: Gwei,
}

impl Deposit {
    #[must_use]
    pub fn hash_tree_root(&self) -> H256 {
        merkleize(&[chunk_64(self.validator_index), chunk_64(self.amount)])
    }
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BeaconBlockBody {
    pub graffiti: H256,
    pub deposits: Vec<Deposit>,
}

impl BeaconBlockBody {
    #[must_use]
    pub fn hash_tree_root(&self) -> H256 {
        let deposit_roots = self
            .deposits
            .iter()
            .map(Deposit::hash_tree_root)
            .collect::<Vec<_>>();

        let deposits_root = mix_in_length(merkleize(&deposit_roots), self.deposits.len() as u64);

        merkleize(&[self.graffiti, deposits_root])
    }
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BeaconBlock {
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    pub parent_root: H256,
    pub state_root: H256,
    pub body: BeaconBlockBody,
}

impl BeaconBlock {
    /// Blocks and their headers have the same root.
    #[must_use]
    pub fn hash_tree_root(&self) -> H256 {
        self.to_header().hash_tree_root()
    }

    #[must_use]
    pub fn to_header(&self) -> BeaconBlockHeader {
        BeaconBlockHeader {
            slot: self.slot,
            proposer_index: self.proposer_index,
            parent_root: self.parent_root,
            state_root: self.state_root,
            body_root: self.body.hash_tree_root(),
        }
    }
}
