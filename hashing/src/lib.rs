use ethereum_types::H256;
use sha2::{Digest as _, Sha256};

#[inline]
#[must_use]
pub fn hash_256_256(left: H256, right: H256) -> H256 {
    let digest = Sha256::new()
        .chain_update(left.as_bytes())
        .chain_update(right.as_bytes())
        .finalize();

    H256::from_slice(&digest)
}

/// Packs a `u64` into a 32 byte chunk the way SSZ packs basic values.
#[inline]
#[must_use]
pub fn chunk_64(value: u64) -> H256 {
    let mut chunk = H256::zero();
    chunk.as_bytes_mut()[..8].copy_from_slice(&value.to_le_bytes());
    chunk
}

#[inline]
#[must_use]
pub fn hash_256_64(root: H256, value: u64) -> H256 {
    hash_256_256(root, chunk_64(value))
}

/// Computes the root of a binary Merkle tree with `chunks` as leaves.
///
/// Missing leaves are filled in with zero hashes of the appropriate depth,
/// so the tree behaves as if it were padded to the next power of 2.
#[must_use]
pub fn merkleize(chunks: &[H256]) -> H256 {
    let mut layer = chunks.to_vec();
    let mut zero_hash = H256::zero();

    while layer.len() > 1 {
        if layer.len() % 2 == 1 {
            layer.push(zero_hash);
        }

        layer = layer
            .chunks_exact(2)
            .map(|pair| hash_256_256(pair[0], pair[1]))
            .collect();

        zero_hash = hash_256_256(zero_hash, zero_hash);
    }

    layer.first().copied().unwrap_or_default()
}

#[inline]
#[must_use]
pub fn mix_in_length(root: H256, length: u64) -> H256 {
    hash_256_64(root, length)
}
