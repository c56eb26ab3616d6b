//! Core definitions and constants for shardmerkle.
//!
//! This module collects the fixed parameters used across the crate:
//! - Tree depth limits imposed by the bit-packed proof path
//! - Digest pool sizing
//! - Level cache file header values

/// Maximum number of levels above the leaves.
/// `Proof::path` is a `u64` with one bit per level.
pub const MAX_DEPTH: usize = 64;

/// Number of idle digest states kept by a [`crate::utils::hasher::DigestPool`].
/// Extra states checked out under heavy concurrency are dropped on return.
pub const DIGEST_POOL_CAPACITY: usize = 64;

/// Magic bytes at the start of every persisted level cache.
pub const CACHE_FILE_MAGIC: [u8; 8] = *b"SMLVCACH";

/// Version of the level cache container layout.
pub const CACHE_FILE_VERSION: u32 = 1;

/// Size in bytes of the fixed header of an encoded proof (path + sibling count).
pub const PROOF_HEADER_SIZE: usize = 8 + 4;
