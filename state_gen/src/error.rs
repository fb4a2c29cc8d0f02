use core::time::Duration;

use thiserror::Error;
use types::phase0::primitives::{Slot, H256};

#[derive(Debug, Error)]
pub enum Error {
    #[error("no state summary for block {block_root:?}")]
    UnknownHotSummary { block_root: H256 },
    #[error("epoch boundary root for slot {boundary_slot} has not been resolved")]
    UnknownBoundaryRoot { boundary_slot: Slot },
    #[error("full state for epoch boundary root {boundary_root:?} is missing from storage")]
    UnknownBoundaryState { boundary_root: H256 },
    #[error("genesis block not found in storage")]
    GenesisBlockNotFound,
    #[error("no block at or before slot {slot}")]
    NoValidBlock { slot: Slot },
    #[error("block not found in storage: {block_root:?}")]
    BlockNotFound { block_root: H256 },
    #[error("multiple block roots at epoch boundary slot {boundary_slot}: {block_roots:?}")]
    MultipleBoundaryRoots {
        boundary_slot: Slot,
        block_roots: Vec<H256>,
    },
    #[error("base state at slot {state_slot} is after target slot {target_slot}")]
    BoundaryStateAfterTarget { state_slot: Slot, target_slot: Slot },
    #[error(
        "parent of block {block_root:?} is not at an earlier slot \
         (slot: {slot}, parent_slot: {parent_slot})"
    )]
    ParentSlotNotEarlier {
        block_root: H256,
        slot: Slot,
        parent_slot: Slot,
    },
    #[error("reached genesis without finding a base state for block {block_root:?}")]
    GenesisStateNotFound { block_root: H256 },
    #[error("blocks are not in ascending slot order ({previous} >= {next})")]
    BlocksNotAscending { previous: Slot, next: Slot },
    #[error("block at slot {block_slot} is not after base state at slot {state_slot}")]
    BlockNotAfterBaseState { state_slot: Slot, block_slot: Slot },
    #[error("block at slot {block_slot} is after target slot {target_slot}")]
    BlockAfterTargetSlot { block_slot: Slot, target_slot: Slot },
    #[error(
        "block at slot {block_slot} does not extend the chain \
         (expected parent: {expected:?}, in_block: {in_block:?})"
    )]
    BlockParentMismatch {
        block_slot: Slot,
        expected: H256,
        in_block: H256,
    },
    #[error("storage key has incorrect format: {bytes:?}")]
    MalformedStorageKey { bytes: Vec<u8> },
    #[error("operation was cancelled")]
    Cancelled,
    #[error("could not obtain save lock for block {block_root:?} in {} ms", timeout.as_millis())]
    SaveLockTimeout { block_root: H256, timeout: Duration },
    #[error("failed to look up epoch boundary root for slot {boundary_slot}")]
    BoundaryRootLookupFailed { boundary_slot: Slot },
    #[error("failed to compute state for last block before epoch boundary slot {boundary_slot}")]
    LastValidStateFailed { boundary_slot: Slot },
    #[error("failed to load blocks from slot {start_slot} to slot {end_slot} ending at {end_root:?}")]
    LoadBlocksFailed {
        start_slot: Slot,
        end_slot: Slot,
        end_root: H256,
    },
    #[error("failed to replay blocks up to slot {target_slot}")]
    ReplayFailed { target_slot: Slot },
}

impl Error {
    /// Returns `true` for errors caused by asking about something that was never processed.
    ///
    /// Callers may recover from these by trying another strategy such as resyncing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UnknownHotSummary { .. }
                | Self::UnknownBoundaryRoot { .. }
                | Self::UnknownBoundaryState { .. }
                | Self::GenesisBlockNotFound
                | Self::NoValidBlock { .. }
                | Self::BlockNotFound { .. },
        )
    }

    /// Returns `true` for errors that indicate corrupted storage or a bug in fork choice.
    ///
    /// These should not be retried.
    #[must_use]
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::MultipleBoundaryRoots { .. }
                | Self::BoundaryStateAfterTarget { .. }
                | Self::ParentSlotNotEarlier { .. }
                | Self::GenesisStateNotFound { .. }
                | Self::MalformedStorageKey { .. },
        )
    }

    /// Iterates over errors of this type in `error`, outermost first.
    ///
    /// [`anyhow::Error::chain`] does not expose context values as their own types,
    /// so the outermost one is looked up with [`anyhow::Error::downcast_ref`].
    pub fn all_in(error: &anyhow::Error) -> impl Iterator<Item = &Self> {
        error.downcast_ref::<Self>().into_iter().chain(
            error
                .chain()
                .skip(1)
                .filter_map(|cause| cause.downcast_ref::<Self>()),
        )
    }
}
