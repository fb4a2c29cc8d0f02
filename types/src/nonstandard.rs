use serde::{Deserialize, Serialize};

use crate::phase0::primitives::{Slot, H256};

/// Back-pointer recording that the state produced by the block with root `root` at `slot` can be
/// reconstructed by replaying blocks on top of the full state stored under `boundary_root`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StateSummary {
    pub slot: Slot,
    pub root: H256,
    pub boundary_root: H256,
}
