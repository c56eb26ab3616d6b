//! Data blocks and leaf hash derivation.

use rayon::prelude::*;

use crate::config::Config;
use crate::{MerkleError, Result};

/// A caller-owned payload that can be placed in a tree.
pub trait DataBlock: Sync {
    /// Returns the bytes that represent this block.
    fn serialize(&self) -> anyhow::Result<Vec<u8>>;
}

impl DataBlock for [u8] {
    fn serialize(&self) -> anyhow::Result<Vec<u8>> {
        Ok(self.to_vec())
    }
}

impl DataBlock for Vec<u8> {
    fn serialize(&self) -> anyhow::Result<Vec<u8>> {
        Ok(self.clone())
    }
}

impl<const N: usize> DataBlock for [u8; N] {
    fn serialize(&self) -> anyhow::Result<Vec<u8>> {
        Ok(self.to_vec())
    }
}

impl<T: DataBlock + ?Sized> DataBlock for &T {
    fn serialize(&self) -> anyhow::Result<Vec<u8>> {
        (**self).serialize()
    }
}

/// Turns a data block into its leaf hash.
///
/// With `disable_leaf_hashing` the serialized bytes are the leaf hash,
/// otherwise the leaf hash is `hash_func(serialize(block))`.
pub fn derive_leaf<B: DataBlock + ?Sized>(block: &B, config: &Config) -> Result<Vec<u8>> {
    let bz = block
        .serialize()
        .map_err(MerkleError::DataBlockSerialize)?;
    if config.disable_leaf_hashing {
        return Ok(bz);
    }
    config.hash(&bz)
}

/// Derives the leaf hashes of `blocks` in order on the current thread.
pub(crate) fn derive_leaves<B: DataBlock>(blocks: &[B], config: &Config) -> Result<Vec<Vec<u8>>> {
    blocks.iter().map(|b| derive_leaf(b, config)).collect()
}

/// Derives the leaf hashes of `blocks` in order, one contiguous chunk per worker.
///
/// Must run inside the build's thread pool; the first failure aborts the rest.
pub(crate) fn derive_leaves_par<B: DataBlock>(
    blocks: &[B],
    config: &Config,
    workers: usize,
) -> Result<Vec<Vec<u8>>> {
    let chunk = blocks.len().div_ceil(workers.max(1)).max(1);
    let chunks: Vec<Vec<Vec<u8>>> = blocks
        .par_chunks(chunk)
        .map(|part| derive_leaves(part, config))
        .collect::<Result<_>>()?;
    Ok(chunks.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::hasher::sha256;

    struct Failing;

    impl DataBlock for Failing {
        fn serialize(&self) -> anyhow::Result<Vec<u8>> {
            anyhow::bail!("cannot serialize")
        }
    }

    #[test]
    fn test_derive_leaf_hashes() {
        let config = Config::default();
        let leaf = derive_leaf(&b"block"[..], &config).unwrap();
        assert_eq!(leaf, sha256(b"block").to_vec());
    }

    #[test]
    fn test_derive_leaf_disabled_hashing() {
        let config = Config::default().with_disable_leaf_hashing(true);
        let leaf = derive_leaf(&vec![1u8, 2, 3], &config).unwrap();
        assert_eq!(leaf, vec![1, 2, 3]);
    }

    #[test]
    fn test_derive_leaf_serialize_error() {
        let config = Config::default();
        let err = derive_leaf(&Failing, &config).unwrap_err();
        assert!(matches!(err, MerkleError::DataBlockSerialize(_)));
    }

    #[test]
    fn test_derive_leaf_hash_error() {
        let config = Config::default().with_hash_func(std::sync::Arc::new(
            |_: &[u8]| -> anyhow::Result<Vec<u8>> { anyhow::bail!("digest broken") },
        ));
        let err = derive_leaf(&[7u8; 4], &config).unwrap_err();
        assert!(matches!(err, MerkleError::HashFailure(_)));
    }

    #[test]
    fn test_derive_leaves_par_keeps_order() {
        let blocks: Vec<Vec<u8>> = (0..37u8).map(|i| vec![i; 3]).collect();
        let config = Config::default();
        let seq = derive_leaves(&blocks, &config).unwrap();
        for workers in [1, 2, 5, 64] {
            let par = derive_leaves_par(&blocks, &config, workers).unwrap();
            assert_eq!(seq, par);
        }
    }
}
