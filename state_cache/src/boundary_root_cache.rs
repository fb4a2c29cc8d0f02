use core::time::Duration;
use std::collections::HashMap;

use anyhow::{anyhow, Result};
use log::warn;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tap::Pipe as _;
use types::phase0::primitives::{Slot, H256};

use crate::Error;

/// Canonical block roots of epoch boundary slots.
///
/// A skipped boundary slot maps to the root of the last block before it.
/// Entries are never evicted.
pub struct BoundaryRootCache {
    roots: RwLock<HashMap<Slot, H256>>,
    try_lock_timeout: Duration,
}

impl BoundaryRootCache {
    #[must_use]
    pub fn new(try_lock_timeout: Duration) -> Self {
        Self {
            roots: RwLock::default(),
            try_lock_timeout,
        }
    }

    pub fn get(&self, boundary_slot: Slot) -> Result<Option<H256>> {
        self.try_read()?.get(&boundary_slot).copied().pipe(Ok)
    }

    pub fn insert(&self, boundary_slot: Slot, block_root: H256) -> Result<()> {
        self.try_write()?.insert(boundary_slot, block_root);
        Ok(())
    }

    /// Returns the root that ends up in the cache, which is the existing one if there was any.
    pub fn insert_if_absent(&self, boundary_slot: Slot, block_root: H256) -> Result<H256> {
        let root = *self.try_write()?.entry(boundary_slot).or_insert(block_root);
        Ok(root)
    }

    pub fn len(&self) -> Result<usize> {
        self.try_read()?.len().pipe(Ok)
    }

    fn try_read(&self) -> Result<RwLockReadGuard<'_, HashMap<Slot, H256>>> {
        let timeout = self.try_lock_timeout;

        self.roots
            .try_read_for(timeout)
            .ok_or_else(|| lock_timeout(timeout))
    }

    fn try_write(&self) -> Result<RwLockWriteGuard<'_, HashMap<Slot, H256>>> {
        let timeout = self.try_lock_timeout;

        self.roots
            .try_write_for(timeout)
            .ok_or_else(|| lock_timeout(timeout))
    }
}

fn lock_timeout(timeout: Duration) -> anyhow::Error {
    let error = Error::CacheLockTimeout {
        cache: "boundary root cache",
        timeout,
    };

    warn!("{error:?}");

    anyhow!(error)
}
