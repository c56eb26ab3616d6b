//! Merkle inclusion proofs and their verification.
//!
//! A [`Proof`] is a bit-packed path plus the sibling hash met on every level
//! from the leaf up to the root:
//!
//! ```text
//!            root
//!          /      \
//!        n10      [n11]        path bit 1 = 0 (n10 is a left child)
//!       /   \
//!    [l0]    l1  <- leaf       path bit 0 = 1 (l1 is a right child)
//!
//! siblings = [l0, n11], path = 0b01
//! ```
//!
//! Bit `L` of `path` is set when the node on the route at level `L` is the
//! right child, i.e. when its sibling has to be placed on the left.

use crate::config::Config;
use crate::def::{MAX_DEPTH, PROOF_HEADER_SIZE};
use crate::leaf::{derive_leaf, DataBlock};
use crate::utils::codec::{
    decode_le_u32, decode_le_u64, put_bytes, put_le_u32, put_le_u64, read_bytes,
};
use crate::utils::hasher::{default_hash_func, hash_pair, HashFunc};
use crate::{MerkleError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Proof {
    /// One bit per level, set when the route node is a right child
    pub path: u64,
    /// Sibling hashes, index 0 at the leaf level
    pub siblings: Vec<Vec<u8>>,
}

impl Proof {
    pub fn new(path: u64, siblings: Vec<Vec<u8>>) -> Self {
        Self { path, siblings }
    }

    /// Number of levels this proof climbs.
    pub fn len(&self) -> usize {
        self.siblings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.siblings.is_empty()
    }

    /// Whether the route node at `level` is a right child.
    pub fn is_right(&self, level: usize) -> bool {
        level < MAX_DEPTH && (self.path >> level) & 1 == 1
    }

    /// Whether every set path bit has a sibling to go with it.
    ///
    /// Only proofs of a whole tree or of a band starting at level 0 pass.
    pub fn path_fits(&self) -> bool {
        let n = self.siblings.len();
        n <= MAX_DEPTH && (n == MAX_DEPTH || self.path >> n == 0)
    }

    /// Serializes the proof as `path | count | (len | sibling)*`, little-endian.
    pub fn to_bytes(&self) -> Vec<u8> {
        let size = PROOF_HEADER_SIZE + self.siblings.iter().map(|s| 4 + s.len()).sum::<usize>();
        let mut res = Vec::with_capacity(size);
        put_le_u64(&mut res, self.path);
        put_le_u32(&mut res, self.siblings.len() as u32);
        for sib in &self.siblings {
            put_bytes(&mut res, sib);
        }
        res
    }

    /// Parses bytes produced by [`Proof::to_bytes`].
    pub fn from_bytes(bz: &[u8]) -> Result<Self> {
        if bz.len() < PROOF_HEADER_SIZE {
            return Err(MerkleError::MalformedProof(format!(
                "need {} header bytes, got {}",
                PROOF_HEADER_SIZE,
                bz.len()
            )));
        }
        let path = decode_le_u64(bz);
        let count = decode_le_u32(&bz[8..]) as usize;
        if count > MAX_DEPTH {
            return Err(MerkleError::MalformedProof(format!(
                "{} siblings exceed the maximum depth",
                count
            )));
        }
        if count < MAX_DEPTH && path >> count != 0 {
            return Err(MerkleError::MalformedProof(
                "path has bits above the sibling count".to_string(),
            ));
        }
        let mut offset = PROOF_HEADER_SIZE;
        let mut siblings = Vec::with_capacity(count);
        for i in 0..count {
            let sib = read_bytes(bz, &mut offset).ok_or_else(|| {
                MerkleError::MalformedProof(format!("sibling {} is truncated", i))
            })?;
            siblings.push(sib.to_vec());
        }
        if offset != bz.len() {
            return Err(MerkleError::MalformedProof(format!(
                "{} trailing bytes",
                bz.len() - offset
            )));
        }
        Ok(Self { path, siblings })
    }
}

/// Recomputes the root reached from `leaf` by following `proof`.
fn compute_root(
    hash_func: &dyn HashFunc,
    leaf: &[u8],
    proof: &Proof,
    sort_pairs: bool,
) -> Result<Vec<u8>> {
    let mut current = leaf.to_vec();
    for (level, sib) in proof.siblings.iter().enumerate() {
        current = if proof.is_right(level) {
            hash_pair(hash_func, sib, &current, sort_pairs)
        } else {
            hash_pair(hash_func, &current, sib, sort_pairs)
        }
        .map_err(MerkleError::HashFailure)?;
    }
    Ok(current)
}

/// Verifies that `leaf` is included under `root` according to `proof`.
///
/// # Returns
/// `Ok(false)` on mismatch, `Err` only if the hash function fails
pub fn verify_leaf(leaf: &[u8], proof: &Proof, root: &[u8], config: &Config) -> Result<bool> {
    if !proof.path_fits() {
        return Ok(false);
    }
    let computed = compute_root(
        config.hash_func.as_ref(),
        leaf,
        proof,
        config.sort_sibling_pairs,
    )?;
    Ok(computed == root)
}

/// Verifies a precomputed leaf hash without a tree or a full config.
///
/// `None` selects the default SHA-256 hash function. Pairs are not sorted.
pub fn verify_standalone(
    leaf: &[u8],
    proof: &Proof,
    root: &[u8],
    hash_func: Option<&dyn HashFunc>,
) -> Result<bool> {
    if !proof.path_fits() {
        return Ok(false);
    }
    let default;
    let hash_func = match hash_func {
        Some(f) => f,
        None => {
            default = default_hash_func();
            default.as_ref()
        }
    };
    let computed = compute_root(hash_func, leaf, proof, false)?;
    Ok(computed == root)
}

/// Derives the leaf of `block` and verifies it against `root`.
///
/// `None` selects [`Config::default`].
pub fn verify_data_block<B: DataBlock + ?Sized>(
    block: &B,
    proof: &Proof,
    root: &[u8],
    config: Option<&Config>,
) -> Result<bool> {
    let default;
    let config = match config {
        Some(c) => c,
        None => {
            default = Config::default();
            &default
        }
    };
    let leaf = derive_leaf(block, config)?;
    verify_leaf(&leaf, proof, root, config)
}
