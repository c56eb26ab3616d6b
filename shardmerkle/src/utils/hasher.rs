//! Hashing utilities for shardmerkle.
//!
//! This module provides:
//! - The [`HashFunc`] trait every digest used by the tree must implement
//! - [`Sha256Hasher`], the default SHA-256 implementation backed by a
//!   [`DigestPool`] of reusable digest states
//! - Helpers that concatenate two child hashes into a parent preimage

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;
use sha2::digest::FixedOutputReset;
use sha2::{Digest, Sha256};

use crate::def::DIGEST_POOL_CAPACITY;

/// A one-way digest over byte strings.
///
/// Implementations must be deterministic. Any internal state reuse is an
/// implementation detail and must not leak between calls.
pub trait HashFunc: Send + Sync {
    fn hash(&self, data: &[u8]) -> anyhow::Result<Vec<u8>>;
}

impl<F> HashFunc for F
where
    F: Fn(&[u8]) -> anyhow::Result<Vec<u8>> + Send + Sync,
{
    fn hash(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        self(data)
    }
}

/// A bounded pool of reusable digest states.
///
/// A state is checked out for exactly one hash call and goes back to the pool
/// when the returned guard is dropped, including on early returns.
pub struct DigestPool<D: Digest + FixedOutputReset + Default> {
    idle: Mutex<Vec<D>>,
    capacity: usize,
}

impl<D: Digest + FixedOutputReset + Default> DigestPool<D> {
    /// Creates a pool that keeps at most `capacity` idle states.
    pub fn new(capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Checks out a fresh or recycled digest state.
    pub fn checkout(&self) -> PooledDigest<'_, D> {
        let digest = self.idle.lock().pop().unwrap_or_default();
        PooledDigest { pool: self, digest }
    }

    /// Number of idle states currently held.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    fn give_back(&self, mut digest: D) {
        Digest::reset(&mut digest);
        let mut idle = self.idle.lock();
        if idle.len() < self.capacity {
            idle.push(digest);
        }
    }
}

/// Guard over a digest state borrowed from a [`DigestPool`].
///
/// On drop the state is swapped for a blank default and handed back.
pub struct PooledDigest<'a, D: Digest + FixedOutputReset + Default> {
    pool: &'a DigestPool<D>,
    digest: D,
}

impl<D: Digest + FixedOutputReset + Default> Deref for PooledDigest<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.digest
    }
}

impl<D: Digest + FixedOutputReset + Default> DerefMut for PooledDigest<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut self.digest
    }
}

impl<D: Digest + FixedOutputReset + Default> Drop for PooledDigest<'_, D> {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.digest));
    }
}

/// SHA-256 with pooled digest states. This is the default [`HashFunc`].
pub struct Sha256Hasher {
    pool: DigestPool<Sha256>,
}

impl Sha256Hasher {
    pub fn new() -> Self {
        Self {
            pool: DigestPool::new(DIGEST_POOL_CAPACITY),
        }
    }

    pub fn pool(&self) -> &DigestPool<Sha256> {
        &self.pool
    }
}

impl Default for Sha256Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Sha256Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sha256Hasher")
            .field("idle", &self.pool.idle_count())
            .finish()
    }
}

impl HashFunc for Sha256Hasher {
    fn hash(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut digest = self.pool.checkout();
        Digest::update(&mut *digest, data);
        Ok(digest.finalize_reset().to_vec())
    }
}

/// Returns a shared handle to a new default hash function.
pub fn default_hash_func() -> Arc<dyn HashFunc> {
    Arc::new(Sha256Hasher::new())
}

/// Computes the SHA-256 hash of a single value without going through a pool.
///
/// # Arguments
/// * `a` - Value to hash
///
/// # Returns
/// The 32-byte hash of the input
pub fn sha256<T: AsRef<[u8]>>(a: T) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(a);
    hasher.finalize().into()
}

/// Concatenates `a || b` into a new buffer.
pub fn concat_hash(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut res = Vec::with_capacity(a.len() + b.len());
    res.extend_from_slice(a);
    res.extend_from_slice(b);
    res
}

/// Concatenates the two hashes in lexicographic order, smaller one first.
pub fn concat_sorted_hash(a: &[u8], b: &[u8]) -> Vec<u8> {
    if a <= b {
        concat_hash(a, b)
    } else {
        concat_hash(b, a)
    }
}

/// Builds the preimage of a parent node from its `left` and `right` children.
///
/// # Arguments
/// * `left` - Hash of the left child
/// * `right` - Hash of the right child
/// * `sort_pairs` - Whether to order the pair lexicographically first
pub fn combine(left: &[u8], right: &[u8], sort_pairs: bool) -> Vec<u8> {
    if sort_pairs {
        concat_sorted_hash(left, right)
    } else {
        concat_hash(left, right)
    }
}

/// Hashes a parent node from its two children.
///
/// # Arguments
/// * `hash_func` - Digest to apply
/// * `left` - Hash of the left child
/// * `right` - Hash of the right child
/// * `sort_pairs` - Whether to order the pair lexicographically first
///
/// # Returns
/// The parent hash, or the digest's error
pub fn hash_pair(
    hash_func: &dyn HashFunc,
    left: &[u8],
    right: &[u8],
    sort_pairs: bool,
) -> anyhow::Result<Vec<u8>> {
    hash_func.hash(&combine(left, right, sort_pairs))
}
