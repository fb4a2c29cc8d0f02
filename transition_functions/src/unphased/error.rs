use thiserror::Error;
use types::phase0::primitives::{Slot, ValidatorIndex, H256};

#[derive(Debug, Error)]
pub enum Error {
    #[error("block is not newer than latest block header ({block_slot} <= {block_header_slot})")]
    BlockNotNewerThanLatestBlockHeader {
        block_slot: Slot,
        block_header_slot: Slot,
    },
    #[error("deposit for validator {validator_index} skips indices (validator count: {validator_count})")]
    DepositIndexOutOfBounds {
        validator_index: ValidatorIndex,
        validator_count: usize,
    },
    #[error("historical root vectors do not cover slot {slot}")]
    HistoricalRootsTooShort { slot: Slot },
    #[error("parent root in block ({in_block:?}) does not match state ({computed:?})")]
    ParentRootMismatch { computed: H256, in_block: H256 },
    #[error("block slot ({block_slot}) does not match state slot ({state_slot})")]
    SlotMismatch { state_slot: Slot, block_slot: Slot },
    #[error("target slot ({target}) is not later than current slot ({current})")]
    SlotNotLater { current: Slot, target: Slot },
}
