use core::{num::NonZeroUsize, time::Duration};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use log::warn;
use lru::LruCache;
use parking_lot::{Mutex, MutexGuard};
use tap::Pipe as _;
use types::phase0::{beacon_state::BeaconState, primitives::H256};

use crate::Error;

/// Recently produced states keyed by the root of the block that produced them.
///
/// An entry only speeds up lookups. The state it holds must already be reachable through storage.
/// States are shared, so callers that want to modify one must go through [`Arc::make_mut`],
/// which copies the state while the cache still holds it.
pub struct HotStateCache {
    cache: Mutex<LruCache<H256, Arc<BeaconState>>>,
    try_lock_timeout: Duration,
}

impl HotStateCache {
    #[must_use]
    pub fn new(capacity: NonZeroUsize, try_lock_timeout: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            try_lock_timeout,
        }
    }

    pub fn get(&self, block_root: H256) -> Result<Option<Arc<BeaconState>>> {
        self.try_lock_cache()?
            .get(&block_root)
            .cloned()
            .pipe(Ok)
    }

    /// Unlike [`HotStateCache::get`], this does not mark the entry as recently used.
    pub fn contains(&self, block_root: H256) -> Result<bool> {
        self.try_lock_cache()?.contains(&block_root).pipe(Ok)
    }

    pub fn insert(&self, block_root: H256, state: Arc<BeaconState>) -> Result<()> {
        self.try_lock_cache()?.put(block_root, state);
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        self.try_lock_cache()?.len().pipe(Ok)
    }

    fn try_lock_cache(&self) -> Result<MutexGuard<'_, LruCache<H256, Arc<BeaconState>>>> {
        let timeout = self.try_lock_timeout;

        self.cache.try_lock_for(timeout).ok_or_else(|| {
            let error = Error::CacheLockTimeout {
                cache: "hot state cache",
                timeout,
            };

            warn!("{error:?}");

            anyhow!(error)
        })
    }
}
