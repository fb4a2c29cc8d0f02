use std::sync::Arc;

use anyhow::{ensure, Result};
use database::{Database, PrefixableKey};
use derive_more::Display;
use serde::{de::DeserializeOwned, Serialize};
use tap::Pipe as _;
use types::{
    nonstandard::StateSummary,
    phase0::{
        beacon_state::BeaconState,
        consts::GENESIS_SLOT,
        containers::BeaconBlock,
        primitives::{Slot, H256},
    },
};

use crate::{
    error::Error,
    traits::{BlockSource, StateStorage},
};

/// [`StateStorage`] and [`BlockSource`] backed by a [`Database`].
pub struct Storage {
    database: Database,
}

impl Storage {
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }

    /// Stores the genesis block and state. Returns the genesis block root.
    pub fn initialize(
        &self,
        genesis_block: &BeaconBlock,
        genesis_state: &BeaconState,
    ) -> Result<H256> {
        let block_root = genesis_block.hash_tree_root();

        self.database.put_batch([
            serialize(BlockByRoot(block_root), genesis_block)?,
            serialize(BlockRootBySlot(genesis_block.slot, block_root), block_root)?,
            serialize(GenesisBlockRoot, block_root)?,
            serialize(StateByBlockRoot(block_root), genesis_state)?,
        ])?;

        Ok(block_root)
    }

    /// Stores a block and indexes it by slot. Returns the block root.
    pub fn append_block(&self, block: &BeaconBlock) -> Result<H256> {
        let block_root = block.hash_tree_root();

        self.database.put_batch([
            serialize(BlockByRoot(block_root), block)?,
            serialize(BlockRootBySlot(block.slot, block_root), block_root)?,
        ])?;

        Ok(block_root)
    }

    fn get<V: DeserializeOwned>(&self, key: impl core::fmt::Display) -> Result<Option<V>> {
        self.database
            .get(key.to_string())?
            .map(|bytes| bincode::deserialize(&bytes))
            .transpose()
            .map_err(Into::into)
    }

    fn save(&self, key: impl core::fmt::Display, value: impl Serialize) -> Result<()> {
        let (key, value) = serialize(key, value)?;
        self.database.put(key, value)
    }
}

impl StateStorage for Storage {
    fn save_state(&self, block_root: H256, state: &BeaconState) -> Result<()> {
        self.save(StateByBlockRoot(block_root), state)
    }

    fn state(&self, block_root: H256) -> Result<Option<Arc<BeaconState>>> {
        self.get(StateByBlockRoot(block_root))?
            .map(Arc::new)
            .pipe(Ok)
    }

    fn has_state(&self, block_root: H256) -> Result<bool> {
        self.database
            .contains_key(StateByBlockRoot(block_root).to_string())
    }

    fn save_state_summary(&self, summary: StateSummary) -> Result<()> {
        self.save(SummaryByBlockRoot(summary.root), summary)
    }

    fn state_summary(&self, block_root: H256) -> Result<Option<StateSummary>> {
        self.get(SummaryByBlockRoot(block_root))
    }

    fn block_roots(&self, start_slot: Slot, end_slot: Slot) -> Result<Vec<H256>> {
        let start_key = BlockRootBySlot(start_slot, H256::zero()).to_string();
        let mut block_roots = vec![];

        for result in self.database.iterator_ascending(start_key..)? {
            let (key_bytes, value_bytes) = result?;

            if !BlockRootBySlot::has_prefix(&key_bytes) {
                break;
            }

            if BlockRootBySlot::parse_slot(&key_bytes)? > end_slot {
                break;
            }

            block_roots.push(bincode::deserialize(&value_bytes)?);
        }

        Ok(block_roots)
    }

    fn genesis_block(&self) -> Result<Option<Arc<BeaconBlock>>> {
        let Some(genesis_block_root) = self.get(GenesisBlockRoot)? else {
            return Ok(None);
        };

        self.block_by_root(genesis_block_root)
    }
}

impl BlockSource for Storage {
    fn block_by_root(&self, block_root: H256) -> Result<Option<Arc<BeaconBlock>>> {
        self.get(BlockByRoot(block_root))?
            .map(Arc::new)
            .pipe(Ok)
    }

    fn load_blocks(
        &self,
        start_slot: Slot,
        end_slot: Slot,
        end_root: H256,
    ) -> Result<Vec<Arc<BeaconBlock>>> {
        let mut blocks: Vec<Arc<BeaconBlock>> = vec![];
        let mut block_root = end_root;

        loop {
            let block = self
                .block_by_root(block_root)?
                .ok_or(Error::BlockNotFound { block_root })?;

            if block.slot < start_slot {
                break;
            }

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

            let parent_root = block.parent_root;
            let reached_genesis = block.slot == GENESIS_SLOT;

            if block.slot <= end_slot {
                blocks.push(block);
            }

            if reached_genesis {
                break;
            }

            block_root = parent_root;
        }

        blocks.reverse();

        Ok(blocks)
    }

    fn find_last_valid_block(&self, slot: Slot) -> Result<Option<(H256, Slot)>> {
        let end_key = BlockRootBySlot(slot, H256::repeat_byte(u8::MAX)).to_string();

        let Some(result) = self.database.iterator_descending(..=end_key)?.next() else {
            return Ok(None);
        };

        let (key_bytes, value_bytes) = result?;

        if !BlockRootBySlot::has_prefix(&key_bytes) {
            return Ok(None);
        }

        let block_slot = BlockRootBySlot::parse_slot(&key_bytes)?;
        let block_root = bincode::deserialize(&value_bytes)?;

        Ok(Some((block_root, block_slot)))
    }
}

#[derive(Display)]
#[display("{}{_0:x}", Self::PREFIX)]
pub struct BlockByRoot(pub H256);

impl PrefixableKey for BlockByRoot {
    const PREFIX: &'static str = "b";
}

// Several blocks may share a slot, so the root is part of the key.
#[derive(Display)]
#[display("{}{_0:020}{_1:x}", Self::PREFIX)]
pub struct BlockRootBySlot(pub Slot, pub H256);

impl BlockRootBySlot {
    const SLOT_DIGITS: usize = 20;

    fn parse_slot(bytes: &[u8]) -> Result<Slot> {
        let malformed = || Error::MalformedStorageKey {
            bytes: bytes.to_vec(),
        };

        let digits = bytes
            .strip_prefix(Self::PREFIX.as_bytes())
            .and_then(|payload| payload.get(..Self::SLOT_DIGITS))
            .ok_or_else(malformed)?;

        core::str::from_utf8(digits)?
            .parse()
            .map_err(|_| malformed().into())
    }
}

impl PrefixableKey for BlockRootBySlot {
    const PREFIX: &'static str = "r";
}

#[derive(Display)]
#[display("{}{_0:x}", Self::PREFIX)]
pub struct StateByBlockRoot(pub H256);

impl PrefixableKey for StateByBlockRoot {
    const PREFIX: &'static str = "s";
}

#[derive(Display)]
#[display("{}{_0:x}", Self::PREFIX)]
pub struct SummaryByBlockRoot(pub H256);

impl PrefixableKey for SummaryByBlockRoot {
    const PREFIX: &'static str = "m";
}

#[derive(Display)]
#[display("{}", Self::PREFIX)]
struct GenesisBlockRoot;

impl PrefixableKey for GenesisBlockRoot {
    const PREFIX: &'static str = "g";
}

fn serialize(key: impl core::fmt::Display, value: impl Serialize) -> Result<(String, Vec<u8>)> {
    Ok((key.to_string(), bincode::serialize(&value)?))
}
