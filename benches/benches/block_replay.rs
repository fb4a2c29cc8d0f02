// The `unused_crate_dependencies` lint checks every crate in a package separately.
// See <https://github.com/rust-lang/rust/issues/57274>.
#![allow(unused_crate_dependencies)]

use std::sync::Arc;

use anyhow::Result;
use criterion::{BatchSize, Criterion, Throughput};
use easy_ext::ext;
use state_gen::{BlockReplayer, TrustedTransition};
use tokio_util::sync::CancellationToken;
use types::{
    phase0::{beacon_state::BeaconState, containers::BeaconBlock, primitives::Slot},
    preset::{Mainnet, Minimal, Preset},
};

fn main() -> Result<()> {
    Criterion::default()
        .configure_from_args()
        .benchmark_replay::<Minimal>("one epoch of blocks in Minimal", 1..=8)?
        .benchmark_replay::<Minimal>("every other slot in Minimal", (2..=16).step_by(2))?
        .benchmark_replay::<Mainnet>("one epoch of blocks in Mainnet", 1..=32)?
        .final_summary();

    Ok(())
}

#[ext]
impl Criterion {
    fn benchmark_replay<P: Preset>(
        &mut self,
        function_id: &str,
        slots: impl IntoIterator<Item = Slot>,
    ) -> Result<&mut Self> {
        let (base_state, blocks) = chain::<P>(slots)?;
        let target_slot = blocks.last().map_or(base_state.slot, |block| block.slot);
        let replayer = BlockReplayer::new(TrustedTransition::<P>::default(), None);
        let cancel = CancellationToken::new();

        self.benchmark_group("BlockReplayer::replay")
            .throughput(Throughput::Elements(blocks.len() as u64))
            .bench_function(function_id, |bencher| {
                bencher.iter_batched(
                    || Arc::clone(&base_state),
                    |state| {
                        replayer
                            .replay(state, &blocks, target_slot, &cancel)
                            .expect("blocks should be replayable on top of genesis state")
                    },
                    BatchSize::SmallInput,
                );
            });

        Ok(self)
    }
}

fn chain<P: Preset>(
    slots: impl IntoIterator<Item = Slot>,
) -> Result<(Arc<BeaconState>, Vec<Arc<BeaconBlock>>)> {
    let (_, genesis_state) = factory::min_genesis_state::<P>();

    let blocks = factory::blocks_at_slots::<P>(Arc::clone(&genesis_state), slots)?
        .into_iter()
        .map(|(block, _)| block)
        .collect();

    Ok((genesis_state, blocks))
}
