use core::marker::PhantomData;
use std::{collections::HashMap, sync::Arc};

use anyhow::{anyhow, bail, ensure, Context as _, Result};
use helper_functions::misc;
use log::{info, warn};
use parking_lot::Mutex;
use prometheus_metrics::Metrics;
use state_cache::{BoundaryRootCache, HotStateCache};
use tokio_util::sync::CancellationToken;
use types::{
    nonstandard::StateSummary,
    phase0::{
        beacon_state::BeaconState,
        consts::GENESIS_SLOT,
        containers::BeaconBlock,
        primitives::{Slot, H256},
    },
    preset::Preset,
};

use crate::{
    error::Error,
    replay::BlockReplayer,
    state_gen_config::StateGenConfig,
    traits::{BlockSource, StateStorage, StateTransition},
};

/// Caches shared by all [`HotStateManager`]s operating on the same storage.
#[derive(Clone)]
pub struct StateCaches {
    pub hot_states: Arc<HotStateCache>,
    pub boundary_roots: Arc<BoundaryRootCache>,
}

impl StateCaches {
    #[must_use]
    pub fn new(config: &StateGenConfig) -> Self {
        Self {
            hot_states: Arc::new(HotStateCache::new(
                config.hot_state_cache_size,
                config.try_lock_timeout,
            )),
            boundary_roots: Arc::new(BoundaryRootCache::new(config.try_lock_timeout)),
        }
    }
}

/// Saves and reconstructs states that are not finalized yet.
///
/// Full states are only written on epoch boundaries.
/// Every other state is recorded as a [`StateSummary`] and rebuilt by replaying blocks.
pub struct HotStateManager<P: Preset, S, T> {
    config: StateGenConfig,
    caches: StateCaches,
    storage: Arc<S>,
    replayer: BlockReplayer<T>,
    save_locks: Mutex<HashMap<H256, Arc<Mutex<()>>>>,
    metrics: Option<Arc<Metrics>>,
    phantom: PhantomData<P>,
}

impl<P, S, T> HotStateManager<P, S, T>
where
    P: Preset,
    S: StateStorage + BlockSource,
    T: StateTransition,
{
    #[must_use]
    pub fn new(
        config: StateGenConfig,
        caches: StateCaches,
        storage: Arc<S>,
        transition: T,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        let replayer = BlockReplayer::new(transition, metrics.clone());

        Self {
            config,
            caches,
            storage,
            replayer,
            save_locks: Mutex::default(),
            metrics,
            phantom: PhantomData,
        }
    }

    #[must_use]
    pub const fn caches(&self) -> &StateCaches {
        &self.caches
    }

    /// Records `state` as the state produced by the block with root `block_root`.
    ///
    /// Saving the same root again is a no-op as long as its state is still cached.
    pub fn save_hot_state(
        &self,
        block_root: H256,
        state: Arc<BeaconState>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        ensure_not_cancelled(cancel)?;

        let lock = self.save_lock(block_root);
        let timeout = self.config.try_lock_timeout;

        let result = match lock.try_lock_for(timeout) {
            Some(_guard) => self.save_hot_state_locked(block_root, state, cancel),
            None => {
                let error = Error::SaveLockTimeout {
                    block_root,
                    timeout,
                };

                warn!("{error:?}");

                Err(anyhow!(error))
            }
        };

        self.release_save_lock(block_root, lock);

        result
    }

    fn save_hot_state_locked(
        &self,
        block_root: H256,
        state: Arc<BeaconState>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self.caches.hot_states.contains(block_root)? {
            return Ok(());
        }

        if misc::is_epoch_start::<P>(state.slot) {
            self.storage.save_state(block_root, &state)?;

            if let Some(metrics) = self.metrics.as_ref() {
                metrics.hot_state_saved.inc();
            }

            info!(
                "saved full state on epoch boundary (slot: {}, block_root: {block_root:?})",
                state.slot,
            );
        }

        let boundary_root = self.load_epoch_boundary_root(block_root, &state, cancel)?;

        self.storage.save_state_summary(StateSummary {
            slot: state.slot,
            root: block_root,
            boundary_root,
        })?;

        if let Some(metrics) = self.metrics.as_ref() {
            metrics.state_summary_saved.inc();
        }

        self.caches.hot_states.insert(block_root, state)
    }

    /// Returns the state produced by the block with root `block_root`.
    ///
    /// The returned state is shared with the cache. Use [`Arc::make_mut`] to modify it.
    pub fn load_hot_state_by_root(
        &self,
        block_root: H256,
        cancel: &CancellationToken,
    ) -> Result<Arc<BeaconState>> {
        if let Some(state) = self.caches.hot_states.get(block_root)? {
            if let Some(metrics) = self.metrics.as_ref() {
                metrics.register_hot_state_cache_hit();
            }

            return Ok(state);
        }

        if let Some(metrics) = self.metrics.as_ref() {
            metrics.register_hot_state_cache_miss();
        }

        ensure_not_cancelled(cancel)?;

        let summary = self
            .storage
            .state_summary(block_root)?
            .ok_or(Error::UnknownHotSummary { block_root })?;

        let boundary_state = self.boundary_state(summary.boundary_root)?;
        let target_slot = summary.slot;

        ensure!(
            boundary_state.slot <= target_slot,
            Error::BoundaryStateAfterTarget {
                state_slot: boundary_state.slot,
                target_slot,
            },
        );

        let state = if boundary_state.slot == target_slot {
            boundary_state
        } else {
            let start_slot = boundary_state.slot + 1;

            let blocks = self
                .storage
                .load_blocks(start_slot, target_slot, block_root)
                .context(Error::LoadBlocksFailed {
                    start_slot,
                    end_slot: target_slot,
                    end_root: block_root,
                })?;

            self.replayer
                .replay(boundary_state, &blocks, target_slot, cancel)
                .context(Error::ReplayFailed { target_slot })?
        };

        self.caches
            .hot_states
            .insert(block_root, Arc::clone(&state))?;

        Ok(state)
    }

    /// Returns the state at `slot` on the chain that passes through the resolved epoch boundary.
    ///
    /// The result is not cached because it is not identified by a block root.
    pub fn load_hot_intermediate_state_with_slot(
        &self,
        slot: Slot,
        cancel: &CancellationToken,
    ) -> Result<Arc<BeaconState>> {
        let boundary_slot = misc::epoch_boundary_slot::<P>(slot);

        let boundary_root = self
            .caches
            .boundary_roots
            .get(boundary_slot)?
            .ok_or(Error::UnknownBoundaryRoot { boundary_slot })?;

        ensure_not_cancelled(cancel)?;

        let boundary_state = self.boundary_state(boundary_root)?;

        ensure!(
            boundary_state.slot <= slot,
            Error::BoundaryStateAfterTarget {
                state_slot: boundary_state.slot,
                target_slot: slot,
            },
        );

        let (last_block_root, last_block_slot) = self
            .storage
            .find_last_valid_block(slot)?
            .ok_or(Error::NoValidBlock { slot })?;

        let blocks = if boundary_state.slot < last_block_slot {
            let start_slot = boundary_state.slot + 1;

            self.storage
                .load_blocks(start_slot, last_block_slot, last_block_root)
                .context(Error::LoadBlocksFailed {
                    start_slot,
                    end_slot: last_block_slot,
                    end_root: last_block_root,
                })?
        } else {
            vec![]
        };

        self.replayer
            .replay(boundary_state, &blocks, slot, cancel)
            .context(Error::ReplayFailed { target_slot: slot })
    }

    /// Resolves the root of the full state to replay `state` from.
    ///
    /// The result is memoized per epoch boundary slot.
    pub fn load_epoch_boundary_root(
        &self,
        block_root: H256,
        state: &BeaconState,
        cancel: &CancellationToken,
    ) -> Result<H256> {
        let boundary_slot = misc::epoch_boundary_slot::<P>(state.slot);

        // A state on its own boundary is checked before the cache.
        // A cached root for the slot may belong to another fork.
        if state.slot == boundary_slot {
            self.caches
                .boundary_roots
                .insert_if_absent(boundary_slot, block_root)?;

            return Ok(block_root);
        }

        if let Some(boundary_root) = self.caches.boundary_roots.get(boundary_slot)? {
            return Ok(boundary_root);
        }

        ensure_not_cancelled(cancel)?;

        let boundary_root = if boundary_slot == GENESIS_SLOT {
            self.storage
                .genesis_block()?
                .ok_or(Error::GenesisBlockNotFound)?
                .hash_tree_root()
        } else {
            let block_roots = self
                .storage
                .block_roots(boundary_slot, boundary_slot)
                .context(Error::BoundaryRootLookupFailed { boundary_slot })?;

            match block_roots.as_slice() {
                [] => self.handle_last_valid_state(boundary_slot, cancel)?,
                [boundary_root] => *boundary_root,
                _ => bail!(Error::MultipleBoundaryRoots {
                    boundary_slot,
                    block_roots: block_roots.clone(),
                }),
            }
        };

        self.caches
            .boundary_roots
            .insert_if_absent(boundary_slot, boundary_root)
    }

    /// Root cached for the epoch boundary of the epoch containing `slot`.
    pub fn epoch_boundary_root(&self, slot: Slot) -> Result<Option<H256>> {
        self.caches
            .boundary_roots
            .get(misc::epoch_boundary_slot::<P>(slot))
    }

    /// Rebuilds the state of the block with root `block_root` advanced to `slot`.
    ///
    /// Walks back along parent roots until a usable base state is found.
    /// In the worst case this replays every block since genesis.
    pub fn compute_state_up_to_slot(
        &self,
        block_root: H256,
        slot: Slot,
        cancel: &CancellationToken,
    ) -> Result<Arc<BeaconState>> {
        // Collected in descending slot order.
        let mut blocks: Vec<Arc<BeaconBlock>> = vec![];
        let mut current_root = block_root;

        let base_state = loop {
            ensure_not_cancelled(cancel)?;

            let usable = |state_slot: Slot| match blocks.last() {
                Some(child) => state_slot < child.slot,
                None => state_slot <= slot,
            };

            if let Some(state) = self.base_state_candidate(current_root, usable, cancel)? {
                break state;
            }

            let block = self
                .storage
                .block_by_root(current_root)?
                .ok_or(Error::BlockNotFound {
                    block_root: current_root,
                })?;

            if let Some(child) = blocks.last() {
                ensure!(
                    block.slot < child.slot,
                    Error::ParentSlotNotEarlier {
                        block_root: child.hash_tree_root(),
                        slot: child.slot,
                        parent_slot: block.slot,
                    },
                );
            }

            ensure!(
                block.slot != GENESIS_SLOT,
                Error::GenesisStateNotFound { block_root },
            );

            current_root = block.parent_root;
            blocks.push(block);
        };

        blocks.reverse();

        self.replayer.replay(base_state, &blocks, slot, cancel)
    }

    fn handle_last_valid_state(
        &self,
        boundary_slot: Slot,
        cancel: &CancellationToken,
    ) -> Result<H256> {
        let (block_root, block_slot) = self
            .storage
            .find_last_valid_block(boundary_slot)?
            .ok_or(Error::NoValidBlock {
                slot: boundary_slot,
            })?;

        let state = self
            .compute_state_up_to_slot(block_root, boundary_slot, cancel)
            .context(Error::LastValidStateFailed { boundary_slot })?;

        if !self.storage.has_state(block_root)? {
            self.storage.save_state(block_root, &state)?;

            info!(
                "saved state for skipped epoch boundary \
                 (boundary_slot: {boundary_slot}, block_root: {block_root:?}, block_slot: {block_slot})",
            );
        }

        Ok(block_root)
    }

    fn base_state_candidate(
        &self,
        block_root: H256,
        usable: impl Fn(Slot) -> bool,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<BeaconState>>> {
        if let Some(state) = self.caches.hot_states.get(block_root)? {
            if usable(state.slot) {
                return Ok(Some(state));
            }
        }

        if let Some(state) = self.storage.state(block_root)? {
            if usable(state.slot) {
                return Ok(Some(state));
            }
        }

        if let Some(summary) = self.storage.state_summary(block_root)? {
            if usable(summary.slot) {
                return self.load_hot_state_by_root(block_root, cancel).map(Some);
            }
        }

        Ok(None)
    }

    fn boundary_state(&self, boundary_root: H256) -> Result<Arc<BeaconState>> {
        self.storage
            .state(boundary_root)?
            .ok_or_else(|| Error::UnknownBoundaryState { boundary_root }.into())
    }

    fn save_lock(&self, block_root: H256) -> Arc<Mutex<()>> {
        Arc::clone(self.save_locks.lock().entry(block_root).or_default())
    }

    fn release_save_lock(&self, block_root: H256, lock: Arc<Mutex<()>>) {
        let mut save_locks = self.save_locks.lock();

        drop(lock);

        if save_locks
            .get(&block_root)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            save_locks.remove(&block_root);
        }
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<()> {
    ensure!(!cancel.is_cancelled(), Error::Cancelled);
    Ok(())
}

#[cfg(test)]
mod tests {
    use core::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };
    use std::thread;

    use database::Database;
    use typenum::{U32, U64};
    use types::preset::{Minimal, PresetName};

    use crate::{storage::Storage, transition::TrustedTransition};

    use super::*;

    const ROOT_1: H256 = H256::repeat_byte(1);
    const ROOT_2: H256 = H256::repeat_byte(2);

    // Mainnet epochs with short historical root vectors to keep hashing cheap.
    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
    struct ShortMainnet;

    impl Preset for ShortMainnet {
        type SlotsPerEpoch = U32;
        type SlotsPerHistoricalRoot = U64;

        const NAME: PresetName = PresetName::Mainnet;
    }

    struct TestChain {
        // Genesis first, then one entry per block.
        states: Vec<(H256, Arc<BeaconState>)>,
    }

    impl TestChain {
        fn root_at(&self, slot: Slot) -> H256 {
            self.entry_at(slot).0
        }

        fn state_at(&self, slot: Slot) -> Arc<BeaconState> {
            Arc::clone(&self.entry_at(slot).1)
        }

        fn entry_at(&self, slot: Slot) -> &(H256, Arc<BeaconState>) {
            self.states
                .iter()
                .find(|(_, state)| state.slot == slot)
                .expect("test chain should contain a block at the requested slot")
        }
    }

    fn build_chain<P: Preset>(
        slots: impl IntoIterator<Item = Slot>,
    ) -> Result<(Storage, TestChain)> {
        let storage = Storage::new(Database::in_memory());
        let (genesis_block, genesis_state) = factory::min_genesis_state::<P>();
        let genesis_root = storage.initialize(&genesis_block, &genesis_state)?;
        let mut states = vec![(genesis_root, Arc::clone(&genesis_state))];

        for (block, state) in factory::blocks_at_slots::<P>(genesis_state, slots)? {
            states.push((storage.append_block(&block)?, state));
        }

        Ok((storage, TestChain { states }))
    }

    fn manager<P: Preset, S: StateStorage + BlockSource>(
        storage: Arc<S>,
    ) -> HotStateManager<P, S, TrustedTransition<P>> {
        manager_with_config(StateGenConfig::default(), storage, None)
    }

    fn manager_with_config<P: Preset, S: StateStorage + BlockSource>(
        config: StateGenConfig,
        storage: Arc<S>,
        metrics: Option<Arc<Metrics>>,
    ) -> HotStateManager<P, S, TrustedTransition<P>> {
        HotStateManager::new(
            config,
            StateCaches::new(&config),
            storage,
            TrustedTransition::default(),
            metrics,
        )
    }

    fn import<P: Preset, S: StateStorage + BlockSource>(
        manager: &HotStateManager<P, S, TrustedTransition<P>>,
        states: &[(H256, Arc<BeaconState>)],
    ) -> Result<()> {
        let cancel = CancellationToken::new();

        for (block_root, state) in states {
            manager.save_hot_state(*block_root, Arc::clone(state), &cancel)?;
        }

        Ok(())
    }

    fn advanced<P: Preset>(state: Arc<BeaconState>, slot: Slot) -> Result<Arc<BeaconState>> {
        BlockReplayer::new(TrustedTransition::<P>::default(), None).replay(
            state,
            &[],
            slot,
            &CancellationToken::new(),
        )
    }

    #[derive(Default)]
    struct Counters {
        queries: AtomicUsize,
        state_writes: AtomicUsize,
        summary_writes: AtomicUsize,
    }

    struct CountingStorage {
        storage: Storage,
        counters: Counters,
    }

    impl CountingStorage {
        fn new(storage: Storage) -> Self {
            Self {
                storage,
                counters: Counters::default(),
            }
        }

        fn queries(&self) -> usize {
            self.counters.queries.load(Ordering::SeqCst)
        }

        fn state_writes(&self) -> usize {
            self.counters.state_writes.load(Ordering::SeqCst)
        }

        fn summary_writes(&self) -> usize {
            self.counters.summary_writes.load(Ordering::SeqCst)
        }

        fn count_query(&self) {
            self.counters.queries.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl StateStorage for CountingStorage {
        fn save_state(&self, block_root: H256, state: &BeaconState) -> Result<()> {
            self.counters.state_writes.fetch_add(1, Ordering::SeqCst);
            self.storage.save_state(block_root, state)
        }

        fn state(&self, block_root: H256) -> Result<Option<Arc<BeaconState>>> {
            self.count_query();
            self.storage.state(block_root)
        }

        fn has_state(&self, block_root: H256) -> Result<bool> {
            self.count_query();
            self.storage.has_state(block_root)
        }

        fn save_state_summary(&self, summary: StateSummary) -> Result<()> {
            self.counters.summary_writes.fetch_add(1, Ordering::SeqCst);
            self.storage.save_state_summary(summary)
        }

        fn state_summary(&self, block_root: H256) -> Result<Option<StateSummary>> {
            self.count_query();
            self.storage.state_summary(block_root)
        }

        fn block_roots(&self, start_slot: Slot, end_slot: Slot) -> Result<Vec<H256>> {
            self.count_query();
            self.storage.block_roots(start_slot, end_slot)
        }

        fn genesis_block(&self) -> Result<Option<Arc<BeaconBlock>>> {
            self.count_query();
            self.storage.genesis_block()
        }
    }

    impl BlockSource for CountingStorage {
        fn block_by_root(&self, block_root: H256) -> Result<Option<Arc<BeaconBlock>>> {
            self.count_query();
            self.storage.block_by_root(block_root)
        }

        fn load_blocks(
            &self,
            start_slot: Slot,
            end_slot: Slot,
            end_root: H256,
        ) -> Result<Vec<Arc<BeaconBlock>>> {
            self.count_query();
            self.storage.load_blocks(start_slot, end_slot, end_root)
        }

        fn find_last_valid_block(&self, slot: Slot) -> Result<Option<(H256, Slot)>> {
            self.count_query();
            self.storage.find_last_valid_block(slot)
        }
    }

    #[test]
    fn test_skipped_boundary_resolves_to_last_block_before_it() -> Result<()> {
        let (storage, chain) = build_chain::<ShortMainnet>([1, 33, 61, 70])?;
        let root_61 = chain.root_at(61);
        let root_70 = chain.root_at(70);
        let storage = Arc::new(storage);
        let manager = manager::<ShortMainnet, _>(Arc::clone(&storage));

        assert!(!storage.has_state(root_61)?);

        let boundary_root = manager.load_epoch_boundary_root(
            root_70,
            &chain.states[4].1,
            &CancellationToken::new(),
        )?;

        assert_eq!(boundary_root, root_61);
        assert!(storage.has_state(root_61)?);
        assert_eq!(manager.epoch_boundary_root(70)?, Some(root_61));

        let synthesized = storage
            .state(root_61)?
            .expect("state was saved when resolving the boundary root");

        assert_eq!(synthesized.slot, 64);
        assert_eq!(synthesized.latest_block_root(), root_61);

        Ok(())
    }

    #[test]
    fn test_skipped_boundaries_during_import() -> Result<()> {
        let (storage, chain) = build_chain::<ShortMainnet>([1, 33, 61, 70, 75])?;
        let storage = Arc::new(storage);
        let importer = manager::<ShortMainnet, _>(Arc::clone(&storage));

        import(&importer, &chain.states)?;

        assert_eq!(importer.epoch_boundary_root(0)?, Some(chain.states[0].0));
        assert_eq!(importer.epoch_boundary_root(40)?, Some(chain.root_at(1)));
        assert_eq!(importer.epoch_boundary_root(64)?, Some(chain.root_at(61)));

        let summary = storage
            .state_summary(chain.root_at(75))?
            .expect("summary was saved during import");

        assert_eq!(summary.slot, 75);
        assert_eq!(summary.boundary_root, chain.root_at(61));

        let reader = manager::<ShortMainnet, _>(storage);
        let cancel = CancellationToken::new();

        assert_eq!(
            reader.load_hot_state_by_root(chain.root_at(75), &cancel)?,
            chain.state_at(75),
        );

        assert_eq!(
            reader.load_hot_state_by_root(chain.root_at(33), &cancel)?,
            chain.state_at(33),
        );

        Ok(())
    }

    #[test]
    fn test_save_is_idempotent() -> Result<()> {
        let (storage, chain) = build_chain::<Minimal>([1, 2])?;
        let storage = Arc::new(CountingStorage::new(storage));
        let manager = manager::<Minimal, _>(Arc::clone(&storage));
        let cancel = CancellationToken::new();
        let (genesis_root, genesis_state) = chain.entry_at(0);

        manager.save_hot_state(*genesis_root, Arc::clone(genesis_state), &cancel)?;
        manager.save_hot_state(*genesis_root, Arc::clone(genesis_state), &cancel)?;

        assert_eq!(storage.state_writes(), 1);
        assert_eq!(storage.summary_writes(), 1);

        manager.save_hot_state(chain.root_at(2), chain.state_at(2), &cancel)?;
        manager.save_hot_state(chain.root_at(2), chain.state_at(2), &cancel)?;

        assert_eq!(storage.state_writes(), 1);
        assert_eq!(storage.summary_writes(), 2);

        Ok(())
    }

    #[test]
    fn test_concurrent_saves_of_same_root_write_once() -> Result<()> {
        let (storage, chain) = build_chain::<Minimal>([1, 2, 3])?;
        let storage = Arc::new(CountingStorage::new(storage));
        let manager = manager::<Minimal, _>(Arc::clone(&storage));
        let cancel = CancellationToken::new();
        let block_root = chain.root_at(3);
        let state = chain.state_at(3);

        let results = thread::scope(|scope| {
            let manager = &manager;
            let state = &state;
            let cancel = &cancel;

            let handles = (0..4)
                .map(|_| {
                    scope.spawn(move || {
                        manager.save_hot_state(block_root, Arc::clone(state), cancel)
                    })
                })
                .collect::<Vec<_>>();

            handles
                .into_iter()
                .map(|handle| handle.join().expect("thread should not panic"))
                .collect::<Vec<_>>()
        });

        for result in results {
            result?;
        }

        assert_eq!(storage.summary_writes(), 1);
        assert_eq!(storage.state_writes(), 0);
        assert!(manager.save_locks.lock().is_empty());

        Ok(())
    }

    #[test]
    fn test_boundary_state_is_its_own_boundary() -> Result<()> {
        let storage = Arc::new(CountingStorage::new(Storage::new(Database::in_memory())));
        let manager = manager::<Minimal, _>(Arc::clone(&storage));

        let state = BeaconState {
            slot: 16,
            ..BeaconState::default()
        };

        let boundary_root =
            manager.load_epoch_boundary_root(ROOT_1, &state, &CancellationToken::new())?;

        assert_eq!(boundary_root, ROOT_1);
        assert_eq!(storage.queries(), 0);
        assert_eq!(manager.epoch_boundary_root(17)?, Some(ROOT_1));

        Ok(())
    }

    #[test]
    fn test_cached_boundary_root_is_used() -> Result<()> {
        let storage = Arc::new(CountingStorage::new(Storage::new(Database::in_memory())));
        let manager = manager::<Minimal, _>(Arc::clone(&storage));

        manager.caches().boundary_roots.insert(8, ROOT_2)?;

        let state = BeaconState {
            slot: 12,
            ..BeaconState::default()
        };

        let boundary_root =
            manager.load_epoch_boundary_root(ROOT_1, &state, &CancellationToken::new())?;

        assert_eq!(boundary_root, ROOT_2);
        assert_eq!(storage.queries(), 0);

        Ok(())
    }

    #[test]
    fn test_first_epoch_resolves_to_genesis_block() -> Result<()> {
        let (storage, chain) = build_chain::<Minimal>([3])?;
        let manager = manager::<Minimal, _>(Arc::new(storage));

        let boundary_root = manager.load_epoch_boundary_root(
            chain.states[1].0,
            &chain.states[1].1,
            &CancellationToken::new(),
        )?;

        assert_eq!(boundary_root, chain.states[0].0);

        Ok(())
    }

    #[test]
    fn test_missing_genesis_block() {
        let manager = manager::<Minimal, _>(Arc::new(Storage::new(Database::in_memory())));

        let state = BeaconState {
            slot: 3,
            ..BeaconState::default()
        };

        let error = manager
            .load_epoch_boundary_root(ROOT_1, &state, &CancellationToken::new())
            .expect_err("storage has no genesis block");

        let error = error
            .downcast_ref::<Error>()
            .expect("error should come from this crate");

        assert!(matches!(error, Error::GenesisBlockNotFound));
        assert!(error.is_not_found());
    }

    #[test]
    fn test_multiple_blocks_at_boundary_are_rejected() -> Result<()> {
        let (storage, chain) = build_chain::<Minimal>([1, 8])?;

        let (sibling, _) =
            factory::empty_block::<Minimal>(chain.state_at(1), 8, H256::repeat_byte(9))?;

        storage.append_block(&sibling)?;

        let manager = manager::<Minimal, _>(Arc::new(storage));

        let state = BeaconState {
            slot: 10,
            ..BeaconState::default()
        };

        let error = manager
            .load_epoch_boundary_root(ROOT_1, &state, &CancellationToken::new())
            .expect_err("two blocks are stored at slot 8");

        let error = error
            .downcast_ref::<Error>()
            .expect("error should come from this crate");

        assert!(matches!(
            error,
            Error::MultipleBoundaryRoots {
                boundary_slot: 8,
                block_roots,
            } if block_roots.len() == 2,
        ));

        assert!(error.is_invariant_violation());
        assert_eq!(manager.epoch_boundary_root(8)?, None);

        Ok(())
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let (storage, chain) = build_chain::<Minimal>([1, 2, 3, 5, 9, 10, 13])?;
        let storage = Arc::new(storage);
        let cancel = CancellationToken::new();

        let importer_metrics = Arc::new(Metrics::new()?);
        let importer = manager_with_config::<Minimal, _>(
            StateGenConfig::default(),
            Arc::clone(&storage),
            Some(Arc::clone(&importer_metrics)),
        );

        import(&importer, &chain.states)?;

        assert_eq!(importer_metrics.hot_state_saved.get(), 1);
        assert_eq!(importer_metrics.state_summary_saved.get(), 8);

        let cached = importer.load_hot_state_by_root(chain.root_at(13), &cancel)?;

        assert!(Arc::ptr_eq(&cached, &chain.state_at(13)));
        assert_eq!(importer_metrics.hot_state_cache_lookups("hit"), 1);

        let reader_metrics = Arc::new(Metrics::new()?);
        let reader = manager_with_config::<Minimal, _>(
            StateGenConfig::default(),
            storage,
            Some(Arc::clone(&reader_metrics)),
        );

        for (block_root, state) in &chain.states {
            assert_eq!(&reader.load_hot_state_by_root(*block_root, &cancel)?, state);
        }

        assert_eq!(reader_metrics.hot_state_cache_lookups("miss"), 8);

        let first = reader.load_hot_state_by_root(chain.root_at(10), &cancel)?;
        let second = reader.load_hot_state_by_root(chain.root_at(10), &cancel)?;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(reader_metrics.hot_state_cache_lookups("hit"), 2);

        Ok(())
    }

    #[test]
    fn test_loaded_state_can_be_modified_without_affecting_cache() -> Result<()> {
        let (storage, chain) = build_chain::<Minimal>([1, 2])?;
        let storage = Arc::new(storage);
        let cancel = CancellationToken::new();

        import(&manager::<Minimal, _>(Arc::clone(&storage)), &chain.states)?;

        let reader = manager::<Minimal, _>(storage);
        let mut state = reader.load_hot_state_by_root(chain.root_at(2), &cancel)?;

        Arc::make_mut(&mut state).balances.clear();

        assert_eq!(
            reader.load_hot_state_by_root(chain.root_at(2), &cancel)?,
            chain.state_at(2),
        );

        Ok(())
    }

    #[test]
    fn test_unknown_summary() {
        let manager = manager::<Minimal, _>(Arc::new(Storage::new(Database::in_memory())));

        let error = manager
            .load_hot_state_by_root(ROOT_1, &CancellationToken::new())
            .expect_err("nothing was saved");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::UnknownHotSummary { block_root }) if *block_root == ROOT_1,
        ));
    }

    #[test]
    fn test_missing_boundary_state() -> Result<()> {
        let storage = Storage::new(Database::in_memory());

        storage.save_state_summary(StateSummary {
            slot: 3,
            root: ROOT_1,
            boundary_root: ROOT_2,
        })?;

        let manager = manager::<Minimal, _>(Arc::new(storage));

        let error = manager
            .load_hot_state_by_root(ROOT_1, &CancellationToken::new())
            .expect_err("boundary state was never saved");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::UnknownBoundaryState { boundary_root }) if *boundary_root == ROOT_2,
        ));

        Ok(())
    }

    #[test]
    fn test_intermediate_state_with_slot() -> Result<()> {
        let (storage, chain) = build_chain::<Minimal>([1, 2, 5, 9, 10, 13])?;
        let manager = manager::<Minimal, _>(Arc::new(storage));
        let cancel = CancellationToken::new();

        import(&manager, &chain.states)?;

        assert_eq!(
            manager.load_hot_intermediate_state_with_slot(12, &cancel)?,
            advanced::<Minimal>(chain.state_at(10), 12)?,
        );

        assert_eq!(
            manager.load_hot_intermediate_state_with_slot(13, &cancel)?,
            chain.state_at(13),
        );

        assert_eq!(
            manager.load_hot_intermediate_state_with_slot(8, &cancel)?,
            advanced::<Minimal>(chain.state_at(5), 8)?,
        );

        Ok(())
    }

    #[test]
    fn test_intermediate_state_with_unresolved_boundary() -> Result<()> {
        let (storage, chain) = build_chain::<Minimal>([1, 2])?;
        let manager = manager::<Minimal, _>(Arc::new(storage));

        import(&manager, &chain.states)?;

        let error = manager
            .load_hot_intermediate_state_with_slot(40, &CancellationToken::new())
            .expect_err("no state was saved in epoch 5");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::UnknownBoundaryRoot { boundary_slot: 40 }),
        ));

        Ok(())
    }

    #[test]
    fn test_compute_state_up_to_slot_uses_summaries() -> Result<()> {
        let (storage, chain) = build_chain::<Minimal>([1, 4, 6, 9, 13])?;
        let storage = Arc::new(storage);
        let cancel = CancellationToken::new();

        import(&manager::<Minimal, _>(Arc::clone(&storage)), &chain.states)?;

        let reader = manager::<Minimal, _>(Arc::clone(&storage));
        let state = reader.compute_state_up_to_slot(chain.root_at(13), 15, &cancel)?;

        assert_eq!(state, advanced::<Minimal>(chain.state_at(13), 15)?);
        assert!(reader.caches().hot_states.contains(chain.root_at(13))?);

        Ok(())
    }

    #[test]
    fn test_compute_state_up_to_slot_without_genesis_state() -> Result<()> {
        let storage = Storage::new(Database::in_memory());
        let (genesis_block, genesis_state) = factory::min_genesis_state::<Minimal>();

        storage.append_block(&genesis_block)?;

        let blocks = factory::blocks_at_slots::<Minimal>(genesis_state, [1, 2])?;

        for (block, _) in &blocks {
            storage.append_block(block)?;
        }

        let manager = manager::<Minimal, _>(Arc::new(storage));

        let error = manager
            .compute_state_up_to_slot(blocks[1].0.hash_tree_root(), 2, &CancellationToken::new())
            .expect_err("genesis state was never stored");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::GenesisStateNotFound { .. }),
        ));

        Ok(())
    }

    #[test]
    fn test_cancelled_operations_leave_caches_untouched() -> Result<()> {
        let (storage, chain) = build_chain::<Minimal>([1, 2, 9])?;
        let storage = Arc::new(storage);
        let cancel = CancellationToken::new();

        import(&manager::<Minimal, _>(Arc::clone(&storage)), &chain.states)?;

        let manager = manager::<Minimal, _>(storage);

        cancel.cancel();

        let save_error = manager
            .save_hot_state(chain.root_at(2), chain.state_at(2), &cancel)
            .expect_err("token was cancelled above");

        let load_error = manager
            .load_hot_state_by_root(chain.root_at(9), &cancel)
            .expect_err("token was cancelled above");

        assert!(matches!(save_error.downcast_ref::<Error>(), Some(Error::Cancelled)));
        assert!(matches!(load_error.downcast_ref::<Error>(), Some(Error::Cancelled)));
        assert_eq!(manager.caches().hot_states.len()?, 0);

        Ok(())
    }

    #[test]
    fn test_save_lock_timeout() -> Result<()> {
        let (storage, chain) = build_chain::<Minimal>([1])?;

        let config = StateGenConfig {
            try_lock_timeout: Duration::from_millis(10),
            ..StateGenConfig::default()
        };

        let manager = manager_with_config::<Minimal, _>(config, Arc::new(storage), None);
        let lock = manager.save_lock(chain.root_at(1));
        let guard = lock.lock();

        let error = manager
            .save_hot_state(chain.root_at(1), chain.state_at(1), &CancellationToken::new())
            .expect_err("save lock is held above");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::SaveLockTimeout { .. }),
        ));

        drop(guard);

        manager.save_hot_state(chain.root_at(1), chain.state_at(1), &CancellationToken::new())?;

        assert!(manager.caches().hot_states.contains(chain.root_at(1))?);

        Ok(())
    }
}
