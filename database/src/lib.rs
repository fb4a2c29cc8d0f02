use core::ops::{Bound, RangeFrom, RangeToInclusive};
use std::sync::Arc;

use anyhow::Result;
use im::OrdMap;
use parking_lot::Mutex;
use snap::raw::{Decoder, Encoder};
use tap::Pipe as _;

/// Ordered key-value store with snappy-compressed values.
///
/// Writes made through [`Database::put_batch`] become visible atomically.
#[derive(Default)]
pub struct Database {
    // Keys and values are stored as `Arc<[u8]>` so that cloning the map and its entries is cheap.
    map: Mutex<InMemoryMap>,
}

impl Database {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> Result<bool> {
        Ok(self.map.lock().contains_key(key.as_ref()))
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        self.map
            .lock()
            .get(key.as_ref())
            .map(|compressed| decompress(compressed))
            .transpose()
    }

    #[expect(clippy::type_complexity)]
    pub fn iterator_ascending(
        &self,
        range: RangeFrom<impl AsRef<[u8]>>,
    ) -> Result<impl Iterator<Item = Result<(Vec<u8>, Vec<u8>)>>> {
        let start = range.start.as_ref();

        self.map
            .lock()
            .range::<_, [u8]>((Bound::Included(start), Bound::Unbounded))
            .map(clone_pair)
            .collect::<Vec<_>>()
            .into_iter()
            .map(decompress_pair)
            .pipe(Ok)
    }

    #[expect(clippy::type_complexity)]
    pub fn iterator_descending(
        &self,
        range: RangeToInclusive<impl AsRef<[u8]>>,
    ) -> Result<impl Iterator<Item = Result<(Vec<u8>, Vec<u8>)>>> {
        let end = range.end.as_ref();

        self.map
            .lock()
            .range::<_, [u8]>((Bound::Unbounded, Bound::Included(end)))
            .rev()
            .map(clone_pair)
            .collect::<Vec<_>>()
            .into_iter()
            .map(decompress_pair)
            .pipe(Ok)
    }

    pub fn put(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        self.put_batch(core::iter::once((key, value)))
    }

    pub fn put_batch(
        &self,
        pairs: impl IntoIterator<Item = (impl AsRef<[u8]>, impl AsRef<[u8]>)>,
    ) -> Result<()> {
        // Compress outside the lock. A failure leaves the map untouched.
        let compressed_pairs = pairs
            .into_iter()
            .map(|(key, value)| {
                let key = Arc::<[u8]>::from(key.as_ref());
                let compressed = Arc::<[u8]>::from(compress(value.as_ref())?);
                Ok((key, compressed))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut map = self.map.lock();

        for (key, compressed) in compressed_pairs {
            map.insert(key, compressed);
        }

        Ok(())
    }
}

/// Storage key whose string form starts with a fixed prefix.
///
/// Keys of different kinds must not have prefixes that are prefixes of each other.
pub trait PrefixableKey {
    const PREFIX: &'static str;

    #[must_use]
    fn has_prefix(bytes: &[u8]) -> bool {
        bytes.starts_with(Self::PREFIX.as_bytes())
    }
}

type InMemoryMap = OrdMap<Arc<[u8]>, Arc<[u8]>>;

fn clone_pair((key, value): (&Arc<[u8]>, &Arc<[u8]>)) -> (Arc<[u8]>, Arc<[u8]>) {
    (Arc::clone(key), Arc::clone(value))
}

fn compress(data: &[u8]) -> Result<Vec<u8>> {
    Encoder::new().compress_vec(data).map_err(Into::into)
}

fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    Decoder::new().decompress_vec(data).map_err(Into::into)
}

fn decompress_pair((key, compressed_value): (Arc<[u8]>, Arc<[u8]>)) -> Result<(Vec<u8>, Vec<u8>)> {
    let value = decompress(&compressed_value)?;
    Ok((key.to_vec(), value))
}
