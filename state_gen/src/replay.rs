use std::sync::Arc;

use anyhow::{ensure, Result};
use log::debug;
use prometheus_metrics::Metrics;
use tokio_util::sync::CancellationToken;
use types::phase0::{beacon_state::BeaconState, containers::BeaconBlock, primitives::Slot};

use crate::{error::Error, traits::StateTransition};

/// Reconstructs states by applying stored blocks on top of a base state.
pub struct BlockReplayer<T> {
    transition: T,
    metrics: Option<Arc<Metrics>>,
}

impl<T: StateTransition> BlockReplayer<T> {
    #[must_use]
    pub const fn new(transition: T, metrics: Option<Arc<Metrics>>) -> Self {
        Self {
            transition,
            metrics,
        }
    }

    /// Applies `blocks` to `base_state` and processes empty slots up to `target_slot`.
    ///
    /// `blocks` must be ordered by ascending slot and form a chain descending from the block
    /// that produced `base_state`. The base state is only copied if it is shared.
    pub fn replay(
        &self,
        base_state: Arc<BeaconState>,
        blocks: &[Arc<BeaconBlock>],
        target_slot: Slot,
        cancel: &CancellationToken,
    ) -> Result<Arc<BeaconState>> {
        validate_blocks(&base_state, blocks, target_slot)?;

        if blocks.is_empty() && base_state.slot == target_slot {
            return Ok(base_state);
        }

        let timer = self
            .metrics
            .as_ref()
            .map(|metrics| metrics.block_replay_times.start_timer());

        debug!(
            "replaying {} blocks from slot {} to slot {target_slot}",
            blocks.len(),
            base_state.slot,
        );

        match self.replay_unchecked(base_state, blocks, target_slot, cancel) {
            Ok(state) => {
                prometheus_metrics::stop_and_record(timer);

                if let Some(metrics) = self.metrics.as_ref() {
                    metrics.replayed_blocks.inc_by(blocks.len() as u64);
                }

                Ok(state)
            }
            Err(error) => {
                prometheus_metrics::stop_and_discard(timer);
                Err(error)
            }
        }
    }

    fn replay_unchecked(
        &self,
        mut state: Arc<BeaconState>,
        blocks: &[Arc<BeaconBlock>],
        target_slot: Slot,
        cancel: &CancellationToken,
    ) -> Result<Arc<BeaconState>> {
        let post_state = Arc::make_mut(&mut state);

        for block in blocks {
            ensure!(!cancel.is_cancelled(), Error::Cancelled);

            while post_state.slot < block.slot {
                self.transition.advance_slot(post_state)?;
            }

            self.transition.apply_block(post_state, block)?;
        }

        ensure!(!cancel.is_cancelled(), Error::Cancelled);

        while post_state.slot < target_slot {
            self.transition.advance_slot(post_state)?;
        }

        Ok(state)
    }
}

fn validate_blocks(
    base_state: &BeaconState,
    blocks: &[Arc<BeaconBlock>],
    target_slot: Slot,
) -> Result<()> {
    ensure!(
        base_state.slot <= target_slot,
        Error::BoundaryStateAfterTarget {
            state_slot: base_state.slot,
            target_slot,
        },
    );

    if let Some(first) = blocks.first() {
        ensure!(
            base_state.slot < first.slot,
            Error::BlockNotAfterBaseState {
                state_slot: base_state.slot,
                block_slot: first.slot,
            },
        );
    }

    for (previous, next) in blocks.iter().zip(blocks.iter().skip(1)) {
        ensure!(
            previous.slot < next.slot,
            Error::BlocksNotAscending {
                previous: previous.slot,
                next: next.slot,
            },
        );
    }

    let mut expected_parent_root = base_state.latest_block_root();

    for block in blocks {
        ensure!(
            block.slot <= target_slot,
            Error::BlockAfterTargetSlot {
                block_slot: block.slot,
                target_slot,
            },
        );

        ensure!(
            block.parent_root == expected_parent_root,
            Error::BlockParentMismatch {
                block_slot: block.slot,
                expected: expected_parent_root,
                in_block: block.parent_root,
            },
        );

        expected_parent_root = block.hash_tree_root();
    }

    Ok(())
}
